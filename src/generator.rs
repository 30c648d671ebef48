// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! CRUD statement generation.
//!
//! Statements addressed by primary key (insert, full-row update, delete and
//! find by key) are templates: their parameters are named after the
//! properties they read and their text never changes for a type, so they
//! are cached per `(entity, operation)`. Statements carrying a predicate are
//! compiled on every call and bind their constants as `p0`, `p1`, ...
//!
//! | Method | SQL | Cached |
//! |--------|-----|--------|
//! | [`create`](SqlGenerator::create) | `INSERT INTO t (..) VALUES (..)` + identity select | yes |
//! | [`update`](SqlGenerator::update) | `UPDATE t SET .. WHERE <key>` | yes |
//! | [`update_where`](SqlGenerator::update_where) | `UPDATE t SET <patch> WHERE <predicate>` | no |
//! | [`delete`](SqlGenerator::delete) | `DELETE FROM t WHERE <key>` | yes |
//! | [`delete_where`](SqlGenerator::delete_where) | `DELETE FROM t WHERE <predicate>` | no |
//! | [`find`](SqlGenerator::find) | `SELECT .. FROM t WHERE <key>` | yes |
//! | [`fetch`](SqlGenerator::fetch) | `SELECT .. FROM t WHERE <predicate>` | no |
//! | [`any`](SqlGenerator::any) | `SELECT 1 FROM t WHERE <predicate> LIMIT 1` | no |
//! | [`scalar`](SqlGenerator::scalar) | `SELECT MAX(col) FROM t WHERE <predicate>` | no |

pub mod cache;

use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;

pub use self::cache::TemplateCache;
use crate::{
    compiler::{ExpressionCompiler, TableScope},
    dialect::SqlHelper,
    entity::{EntityType, Property},
    error::{Error, Result},
    executor::params::object_members,
    expr::{Expr, col},
    sql::{SqlBuffer, SqlStatement},
    value::Value
};

/// Cached template kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert of every insertable column.
    Create,
    /// Full-row update by primary key.
    Update,
    /// Delete by primary key.
    Delete,
    /// Select by primary key.
    Find
}

impl Operation {
    /// Operation name used in cache keys and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Find => "Find"
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate functions for scalar statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    /// `COUNT`
    Count,
    /// `MAX`
    Max,
    /// `MIN`
    Min,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg
}

impl Aggregate {
    /// SQL function name.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Sum => "SUM",
            Self::Avg => "AVG"
        }
    }
}

/// Column assignments of a partial update.
///
/// ```rust
/// use entity_data::{expr::col, generator::Patch};
///
/// let patch = Patch::new()
///     .set("ViewCount", col("ViewCount") + 1)
///     .set("Title", "renamed");
/// assert_eq!(patch.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    assignments: Vec<(String, Expr)>
}

impl Patch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a property. A later assignment to the same property wins.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<Expr>) -> Self {
        let property = property.into();
        let value = value.into();
        match self.assignments.iter_mut().find(|(p, _)| *p == property) {
            Some(slot) => slot.1 = value,
            None => self.assignments.push((property, value))
        }
        self
    }

    /// Patch assigning every member of a serializable object.
    pub fn from_object<S: Serialize + ?Sized>(object: &S) -> Result<Self> {
        let members = object_members(object, "patch")?;
        Ok(members
            .into_iter()
            .fold(Self::new(), |patch, (name, value)| patch.set(name, value)))
    }

    /// Number of assignments.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Check if nothing is assigned.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assignments in insertion order.
    pub fn assignments(&self) -> &[(String, Expr)] {
        &self.assignments
    }
}

/// Statement generator over one dialect, with a shared template cache.
pub struct SqlGenerator {
    dialect: Arc<dyn SqlHelper>,
    cache:   TemplateCache
}

impl fmt::Debug for SqlGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlGenerator")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl SqlGenerator {
    /// Create a generator whose templates expire `expiration` after last
    /// use.
    pub fn new(dialect: Arc<dyn SqlHelper>, expiration: Duration) -> Self {
        Self {
            dialect,
            cache: TemplateCache::new(expiration)
        }
    }

    /// Dialect in use.
    pub fn dialect(&self) -> &dyn SqlHelper {
        self.dialect.as_ref()
    }

    /// Template cache.
    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Insert template.
    ///
    /// Parameters are the insertable property names. With an identity
    /// column a second statement returns the generated value.
    pub fn create(&self, ty: &'static EntityType) -> Result<Arc<SqlStatement>> {
        self.cache
            .get_or_try_insert(ty.name(), Operation::Create, || {
                let columns: Vec<&Property> = ty.mapped().filter(|p| p.is_insertable()).collect();
                if columns.is_empty() {
                    return Err(Error::argument(
                        "entity",
                        format!("`{}` has no insertable columns", ty.name())
                    ));
                }

                let h = self.dialect();
                let mut buf = SqlBuffer::new();
                buf.push("INSERT INTO ")
                    .push(&h.table(ty.table()))
                    .push(" (")
                    .push_joined(columns.iter().map(|p| h.quote(p.column())), ", ")
                    .push(") VALUES (")
                    .push_joined(columns.iter().map(|p| h.parameter(p.name())), ", ")
                    .push_char(')');
                for p in &columns {
                    buf.declare(p.name())?;
                }
                if ty.identity().is_some() {
                    buf.push(h.terminator()).line().push(h.identity());
                }
                Ok(buf.build())
            })
    }

    /// Full-row update template: every updatable non-key column, keyed by
    /// the primary key.
    pub fn update(&self, ty: &'static EntityType) -> Result<Arc<SqlStatement>> {
        self.cache
            .get_or_try_insert(ty.name(), Operation::Update, || {
                let columns: Vec<&Property> = ty
                    .mapped()
                    .filter(|p| p.is_updatable() && !p.is_key())
                    .collect();
                if columns.is_empty() {
                    return Err(Error::argument(
                        "entity",
                        format!("`{}` has no updatable columns", ty.name())
                    ));
                }

                let h = self.dialect();
                let mut buf = SqlBuffer::new();
                buf.push("UPDATE ").push(&h.table(ty.table())).push(" SET ");
                for (i, p) in columns.iter().enumerate() {
                    if i > 0 {
                        buf.push(", ");
                    }
                    buf.push(&h.quote(p.column()))
                        .push_char('=')
                        .push(&h.parameter(p.name()));
                    buf.declare(p.name())?;
                }
                self.key_filter(ty, &mut buf)?;
                Ok(buf.build())
            })
    }

    /// Partial update of the rows matching `filter`.
    ///
    /// The patch is compiled before the predicate, so its constants take
    /// the lower parameter numbers.
    pub fn update_where(
        &self,
        ty: &'static EntityType,
        filter: Option<&Expr>,
        patch: &Patch
    ) -> Result<SqlStatement> {
        if patch.is_empty() {
            return Err(Error::argument("patch", "at least one assignment is required"));
        }
        let scope = TableScope(ty);
        let compiler = ExpressionCompiler::new(self.dialect(), &scope);
        let h = self.dialect();

        let mut buf = SqlBuffer::new();
        buf.push("UPDATE ").push(&h.table(ty.table())).push(" SET ");
        for (i, (name, value)) in patch.assignments().iter().enumerate() {
            let property = ty.property(name)?;
            if property.is_identity() {
                return Err(Error::argument(
                    "patch",
                    format!("identity column `{name}` cannot be assigned")
                ));
            }
            if i > 0 {
                buf.push(", ");
            }
            buf.push(&h.quote(property.column())).push_char('=');
            compiler.value(value, &mut buf)?;
        }
        self.filter(&compiler, filter, &mut buf)?;
        Ok(buf.build())
    }

    /// Delete-by-key template.
    pub fn delete(&self, ty: &'static EntityType) -> Result<Arc<SqlStatement>> {
        self.cache
            .get_or_try_insert(ty.name(), Operation::Delete, || {
                let mut buf = SqlBuffer::new();
                buf.push("DELETE FROM ")
                    .push(&self.dialect().table(ty.table()));
                self.key_filter(ty, &mut buf)?;
                Ok(buf.build())
            })
    }

    /// Delete of the rows matching `filter`; every row without one.
    pub fn delete_where(&self, ty: &'static EntityType, filter: Option<&Expr>) -> Result<SqlStatement> {
        let scope = TableScope(ty);
        let compiler = ExpressionCompiler::new(self.dialect(), &scope);
        let mut buf = SqlBuffer::new();
        buf.push("DELETE FROM ")
            .push(&self.dialect().table(ty.table()));
        self.filter(&compiler, filter, &mut buf)?;
        Ok(buf.build())
    }

    /// Select-by-key template.
    pub fn find(&self, ty: &'static EntityType) -> Result<Arc<SqlStatement>> {
        self.cache
            .get_or_try_insert(ty.name(), Operation::Find, || {
                let mut buf = SqlBuffer::new();
                self.select_all(ty, &mut buf);
                self.key_filter(ty, &mut buf)?;
                Ok(buf.build())
            })
    }

    /// Select of every mapped column for rows matching `filter`.
    pub fn fetch(&self, ty: &'static EntityType, filter: Option<&Expr>) -> Result<SqlStatement> {
        let scope = TableScope(ty);
        let compiler = ExpressionCompiler::new(self.dialect(), &scope);
        let mut buf = SqlBuffer::new();
        self.select_all(ty, &mut buf);
        self.filter(&compiler, filter, &mut buf)?;
        Ok(buf.build())
    }

    /// Existence probe returning a constant `1` for at most one row.
    pub fn any(&self, ty: &'static EntityType, filter: Option<&Expr>) -> Result<SqlStatement> {
        let scope = TableScope(ty);
        let compiler = ExpressionCompiler::new(self.dialect(), &scope);
        let mut buf = SqlBuffer::new();
        buf.push("SELECT 1 FROM ")
            .push(&self.dialect().table(ty.table()));
        self.filter(&compiler, filter, &mut buf)?;
        buf.push_char(' ').push(&self.dialect().limit(1, None));
        Ok(buf.build())
    }

    /// Aggregate over one column, or `COUNT(1)` without a column.
    pub fn scalar(
        &self,
        ty: &'static EntityType,
        aggregate: Aggregate,
        column: Option<&Expr>,
        filter: Option<&Expr>
    ) -> Result<SqlStatement> {
        let scope = TableScope(ty);
        let compiler = ExpressionCompiler::new(self.dialect(), &scope);
        let mut buf = SqlBuffer::new();
        buf.push("SELECT ").push(aggregate.as_sql()).push_char('(');
        match column {
            Some(column) => compiler.value(column, &mut buf)?,
            None if aggregate == Aggregate::Count => {
                buf.push_char('1');
            }
            None => {
                return Err(Error::argument(
                    "column",
                    format!("{} needs a column", aggregate.as_sql())
                ));
            }
        }
        buf.push(") FROM ").push(&self.dialect().table(ty.table()));
        self.filter(&compiler, filter, &mut buf)?;
        Ok(buf.build())
    }

    fn select_all(&self, ty: &'static EntityType, buf: &mut SqlBuffer) {
        let h = self.dialect();
        buf.push("SELECT ")
            .push_joined(ty.mapped().map(|p| h.quote(p.column())), ", ")
            .push(" FROM ")
            .push(&h.table(ty.table()));
    }

    fn key_filter(&self, ty: &'static EntityType, buf: &mut SqlBuffer) -> Result<()> {
        if !ty.has_primary_key() {
            return Err(Error::argument(
                "entity",
                format!("`{}` has no primary key", ty.name())
            ));
        }
        let h = self.dialect();
        buf.push(" WHERE ");
        for (i, key) in ty.primary_key().enumerate() {
            if i > 0 {
                buf.push(" AND ");
            }
            buf.push(&h.quote(key.column()))
                .push_char('=')
                .push(&h.parameter(key.name()));
            buf.declare(key.name())?;
        }
        Ok(())
    }

    fn filter(
        &self,
        compiler: &ExpressionCompiler<'_>,
        filter: Option<&Expr>,
        buf: &mut SqlBuffer
    ) -> Result<()> {
        if let Some(filter) = filter {
            buf.push(" WHERE ");
            compiler.predicate(filter, buf)?;
        }
        Ok(())
    }
}

/// Predicate matching the primary key of `ty` against `values`, in key
/// declaration order.
pub fn key_predicate(ty: &'static EntityType, values: &[Value]) -> Result<Expr> {
    let keys: Vec<&Property> = ty.primary_key().collect();
    if keys.is_empty() {
        return Err(Error::argument(
            "entity",
            format!("`{}` has no primary key", ty.name())
        ));
    }
    if keys.len() != values.len() {
        return Err(Error::argument(
            "key",
            format!(
                "`{}` has {} key column(s), got {} value(s)",
                ty.name(),
                keys.len(),
                values.len()
            )
        ));
    }
    let mut predicate: Option<Expr> = None;
    for (key, value) in keys.iter().zip(values) {
        let term = col(key.name()).eq(value.clone());
        predicate = Some(match predicate {
            Some(p) => p.and(term),
            None => term
        });
    }
    predicate.ok_or_else(|| Error::argument("key", "empty key"))
}
