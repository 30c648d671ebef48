// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Fluent SELECT builder.
//!
//! A [`Query`] accumulates joins, projection, filters and ordering over one
//! primary type and renders SQL only when a terminal method runs. Every
//! terminal call renders again from the accumulated state, so calling two
//! terminals on one query (e.g. [`Query::page`] then [`Query::count`]) is
//! safe.
//!
//! ```rust,ignore
//! let page = db
//!     .query::<Article>()
//!     .inner_join::<Tag>(col("Id").eq(field::<Tag>("ArticleId")))
//!     .filter(field::<Tag>("Flag"))
//!     .filter(col("Name").ne(null()))
//!     .order_by_desc(col("ViewCount"))
//!     .page(Pagination::page(0, 20))
//!     .await?;
//! ```
//!
//! # Aliases
//!
//! The primary type is `a`; joined types take `b`, `c`, ... in join order.
//!
//! # Paging
//!
//! A paged render emits the page statement and a `COUNT(1)` statement over
//! the same joins and filters in one command. Without explicit ordering the
//! primary key of the primary type is used.

mod alias;

use std::marker::PhantomData;

use serde::Serialize;

pub use self::alias::{AliasMap, alias_for};
use crate::{
    compiler::ExpressionCompiler,
    entity::{Entity, EntityType},
    error::{Error, Result},
    executor::Executor,
    expr::{BinaryOp, Expr, raw},
    sql::{SqlBuffer, SqlStatement},
    value::FromValue
};

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right
}

impl JoinKind {
    /// SQL keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN"
        }
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,

    /// Descending order (Z-A, 9-0, newest first).
    Desc
}

impl SortDirection {
    /// Convert to SQL keyword.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC"
        }
    }
}

/// Pagination parameters.
///
/// # Example
///
/// ```rust
/// use entity_data::query::Pagination;
///
/// let first = Pagination::new(10, 0); // First 10 items
/// let third = Pagination::page(2, 25); // offset=50, limit=25
/// assert_eq!(third.offset, 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: usize,

    /// Number of rows to skip.
    pub offset: usize
}

impl Pagination {
    /// Create pagination parameters.
    pub const fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset
        }
    }

    /// Pagination for a zero-based page number. The offset saturates at
    /// `usize::MAX`.
    pub const fn page(page: usize, per_page: usize) -> Self {
        Self {
            limit:  per_page,
            offset: page.saturating_mul(per_page)
        }
    }

    /// Zero-based page number.
    pub const fn index(&self) -> usize {
        if self.limit == 0 { 0 } else { self.offset / self.limit }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit:  100,
            offset: 0
        }
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows of this page.
    pub items:      Vec<T>,
    /// Rows matching the query without paging.
    pub total:      u64,
    /// Zero-based page number.
    pub page_index: usize,
    /// Requested page size.
    pub page_size:  usize
}

impl<T> Page<T> {
    /// Number of pages needed for `total` rows.
    pub fn page_count(&self) -> u64 {
        match self.page_size {
            0 => 0,
            size => self.total.div_ceil(size as u64)
        }
    }

    /// Check if a page follows this one.
    pub fn has_next(&self) -> bool {
        (self.page_index as u64 + 1) < self.page_count()
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind:   JoinKind,
    target: &'static EntityType,
    on:     Expr
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Rows {
        limit: Option<usize>
    },
    Page(Pagination),
    Count,
    Any
}

/// SELECT builder over primary type `T`.
pub struct Query<'e, T: Entity> {
    executor:  &'e dyn Executor,
    aliases:   AliasMap,
    joins:     Vec<Join>,
    selection: Vec<Expr>,
    excluded:  Vec<String>,
    distinct:  bool,
    filters:   Vec<Expr>,
    orders:    Vec<(Expr, SortDirection)>,
    invalid:   Option<(&'static str, String)>,
    marker:    PhantomData<fn() -> T>
}

impl<'e, T: Entity> Query<'e, T> {
    /// Start a query over `T`.
    pub fn new(executor: &'e dyn Executor) -> Self {
        Self {
            executor,
            aliases: AliasMap::new(T::entity_type()),
            joins: Vec::new(),
            selection: Vec::new(),
            excluded: Vec::new(),
            distinct: false,
            filters: Vec::new(),
            orders: Vec::new(),
            invalid: None,
            marker: PhantomData
        }
    }

    /// Join `U` on a condition over already joined types and `U`.
    pub fn join<U: Entity>(mut self, kind: JoinKind, on: Expr) -> Self {
        let target = U::entity_type();
        if self.aliases.contains(target.name()) {
            self.reject("join", format!("`{}` is already part of the query", target.name()));
            return self;
        }
        self.aliases.register(target);
        self.joins.push(Join {
            kind,
            target,
            on
        });
        self
    }

    /// `INNER JOIN`
    pub fn inner_join<U: Entity>(self, on: Expr) -> Self {
        self.join::<U>(JoinKind::Inner, on)
    }

    /// `LEFT JOIN`
    pub fn left_join<U: Entity>(self, on: Expr) -> Self {
        self.join::<U>(JoinKind::Left, on)
    }

    /// `RIGHT JOIN`
    pub fn right_join<U: Entity>(self, on: Expr) -> Self {
        self.join::<U>(JoinKind::Right, on)
    }

    /// Replace the default projection with explicit columns or expressions.
    pub fn select<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = Expr>
    {
        let before = self.selection.len();
        self.selection.extend(columns);
        if self.selection.len() == before {
            self.reject("columns", "must not be empty");
        }
        self
    }

    /// Leave properties of `T` out of the default projection.
    pub fn exclude<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        self.excluded
            .extend(properties.into_iter().map(Into::into));
        self
    }

    /// `SELECT DISTINCT`
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a filter; filters are AND-joined.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Add a raw SQL filter, used verbatim.
    pub fn filter_raw(mut self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        if sql.trim().is_empty() {
            self.reject("sql", "must not be empty");
        } else {
            self.filters.push(raw(sql));
        }
        self
    }

    /// Order ascending by `column`.
    pub fn order_by(mut self, column: Expr) -> Self {
        self.orders.push((column, SortDirection::Asc));
        self
    }

    /// Order descending by `column`.
    pub fn order_by_desc(mut self, column: Expr) -> Self {
        self.orders.push((column, SortDirection::Desc));
        self
    }

    /// Render the plain row query.
    pub fn to_statement(&self) -> Result<SqlStatement> {
        self.render(Shape::Rows {
            limit: None
        })
    }

    /// Render the paged query: page rows, then the total count.
    pub fn to_page_statement(&self, pagination: Pagination) -> Result<SqlStatement> {
        self.render(Shape::Page(pagination))
    }

    /// Render the count query.
    pub fn to_count_statement(&self) -> Result<SqlStatement> {
        self.render(Shape::Count)
    }

    /// First matching row.
    pub async fn first(&self) -> Result<Option<T>>
    where
        T: Default
    {
        let stmt = self.render(Shape::Rows {
            limit: Some(1)
        })?;
        let reader = self
            .executor
            .reader(stmt.text(), stmt.bound().into())
            .await?;
        reader.read_first()
    }

    /// At most `size` rows.
    pub async fn take(&self, size: usize) -> Result<Vec<T>>
    where
        T: Default
    {
        if size == 0 {
            return Err(Error::argument("size", "must be greater than zero"));
        }
        self.rows(Some(size)).await
    }

    /// Every matching row.
    pub async fn to_list(&self) -> Result<Vec<T>>
    where
        T: Default
    {
        self.rows(None).await
    }

    /// One page and the total count, in one round trip.
    pub async fn page(&self, pagination: Pagination) -> Result<Page<T>>
    where
        T: Default
    {
        let stmt = self.render(Shape::Page(pagination))?;
        let mut reader = self
            .executor
            .reader(stmt.text(), stmt.bound().into())
            .await?;
        let items = reader.read()?;
        let total = if reader.next_result() {
            u64::from_nullable(reader.scalar())?
        } else {
            return Err(Error::configuration(
                "paged command returned no count result set"
            ));
        };
        Ok(Page {
            items,
            total,
            page_index: pagination.index(),
            page_size: pagination.limit
        })
    }

    /// Number of matching rows.
    pub async fn count(&self) -> Result<u64> {
        let stmt = self.render(Shape::Count)?;
        let value = self
            .executor
            .scalar(stmt.text(), stmt.bound().into())
            .await?;
        u64::from_nullable(value)
    }

    /// Check if any row matches.
    pub async fn any(&self) -> Result<bool> {
        let stmt = self.render(Shape::Any)?;
        let reader = self
            .executor
            .reader(stmt.text(), stmt.bound().into())
            .await?;
        Ok(!reader.rows().is_empty())
    }

    async fn rows(&self, limit: Option<usize>) -> Result<Vec<T>>
    where
        T: Default
    {
        let stmt = self.render(Shape::Rows {
            limit
        })?;
        let reader = self
            .executor
            .reader(stmt.text(), stmt.bound().into())
            .await?;
        reader.read()
    }

    /// Keep the first invalid builder call; it surfaces at render time.
    fn reject(&mut self, name: &'static str, message: impl Into<String>) {
        if self.invalid.is_none() {
            self.invalid = Some((name, message.into()));
        }
    }

    fn render(&self, shape: Shape) -> Result<SqlStatement> {
        if let Some((name, message)) = &self.invalid {
            return Err(Error::argument(*name, message.clone()));
        }
        if let Shape::Page(pagination) = shape
            && pagination.limit == 0
        {
            return Err(Error::argument("pagination", "page size must be greater than zero"));
        }

        let dialect = self.executor.dialect();
        let compiler = ExpressionCompiler::new(dialect, &self.aliases);
        let mut buf = SqlBuffer::new();

        let projection = match shape {
            Shape::Count if !self.distinct => None,
            Shape::Any => None,
            _ => Some(self.projection(&compiler, &mut buf)?)
        };
        let source = self.source(&compiler, &mut buf)?;
        let distinct = if self.distinct { "DISTINCT " } else { "" };

        let mut sql = String::new();
        match shape {
            Shape::Rows {
                limit
            } => {
                sql.push_str(&format!(
                    "SELECT {distinct}{} {source}",
                    projection.unwrap_or_default()
                ));
                if let Some(order) = self.ordering(&compiler, &mut buf, false)? {
                    sql.push_str(&order);
                }
                if let Some(limit) = limit {
                    sql.push(' ');
                    sql.push_str(&dialect.limit(limit, None));
                }
            }
            Shape::Page(pagination) => {
                let projection = projection.unwrap_or_default();
                sql.push_str(&format!("SELECT {distinct}{projection} {source}"));
                if let Some(order) = self.ordering(&compiler, &mut buf, true)? {
                    sql.push_str(&order);
                }
                sql.push(' ');
                sql.push_str(&dialect.limit(pagination.limit, Some(pagination.offset)));
                sql.push_str(dialect.terminator());
                sql.push('\n');
                sql.push_str(&self.count_sql(&projection, &source));
            }
            Shape::Count => {
                sql.push_str(&self.count_sql(&projection.unwrap_or_default(), &source));
            }
            Shape::Any => {
                sql.push_str(&format!("SELECT 1 {source} {}", dialect.limit(1, None)));
            }
        }

        let mut out = SqlBuffer::new();
        out.push(&sql);
        for (name, value) in buf.values() {
            out.bind(name, value.clone())?;
        }
        Ok(out.build())
    }

    fn count_sql(&self, projection: &str, source: &str) -> String {
        if self.distinct {
            format!("SELECT COUNT(1) FROM (SELECT DISTINCT {projection} {source}) AS c")
        } else {
            format!("SELECT COUNT(1) {source}")
        }
    }

    fn projection(&self, compiler: &ExpressionCompiler<'_>, buf: &mut SqlBuffer) -> Result<String> {
        let start = buf.text().len();
        if self.selection.is_empty() {
            let dialect = self.executor.dialect();
            let ty = self.aliases.primary();
            for name in &self.excluded {
                ty.property(name)?;
            }
            let alias = self.aliases.primary_alias();
            let columns: Vec<String> = ty
                .mapped()
                .filter(|p| !self.excluded.iter().any(|e| e == p.name()))
                .map(|p| dialect.qualify(p.column(), Some(alias)))
                .collect();
            if columns.is_empty() {
                return Err(Error::argument("exclude", "every column is excluded"));
            }
            buf.push_joined(columns, ", ");
        } else {
            for (i, column) in self.selection.iter().enumerate() {
                if i > 0 {
                    buf.push(", ");
                }
                compiler.value(column, buf)?;
            }
        }
        Ok(buf.text()[start..].to_string())
    }

    fn source(&self, compiler: &ExpressionCompiler<'_>, buf: &mut SqlBuffer) -> Result<String> {
        let dialect = self.executor.dialect();
        let start = buf.text().len();
        let primary = self.aliases.primary();
        buf.push("FROM ")
            .push(&dialect.table(primary.table()))
            .push(" AS ")
            .push(self.aliases.primary_alias());
        for join in &self.joins {
            let alias = self.aliases.alias(join.target.name()).ok_or_else(|| {
                Error::translation(format!("`{}` has no alias", join.target.name()))
            })?;
            buf.push_char(' ')
                .push(join.kind.as_sql())
                .push_char(' ')
                .push(&dialect.table(join.target.table()))
                .push(" AS ")
                .push(alias)
                .push(" ON ");
            compiler.predicate(&join.on, buf)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            buf.push(if i == 0 { " WHERE " } else { " AND " });
            let group = self.filters.len() > 1 && needs_group(filter);
            if group {
                buf.push_char('(');
            }
            compiler.predicate(filter, buf)?;
            if group {
                buf.push_char(')');
            }
        }
        Ok(buf.text()[start..].to_string())
    }

    /// ` ORDER BY ...`; with `required`, falls back to the primary key.
    fn ordering(
        &self,
        compiler: &ExpressionCompiler<'_>,
        buf: &mut SqlBuffer,
        required: bool
    ) -> Result<Option<String>> {
        let start = buf.text().len();
        if !self.orders.is_empty() {
            buf.push(" ORDER BY ");
            for (i, (column, direction)) in self.orders.iter().enumerate() {
                if i > 0 {
                    buf.push(", ");
                }
                compiler.value(column, buf)?;
                if *direction == SortDirection::Desc {
                    buf.push_char(' ').push(direction.as_sql());
                }
            }
        } else if required {
            let ty = self.aliases.primary();
            if !ty.has_primary_key() {
                return Err(Error::argument(
                    "order",
                    format!("paging `{}` needs an ordering or a primary key", ty.name())
                ));
            }
            let alias = self.aliases.primary_alias();
            let keys: Vec<String> = ty
                .primary_key()
                .map(|p| self.executor.dialect().qualify(p.column(), Some(alias)))
                .collect();
            buf.push(" ORDER BY ").push_joined(keys, ", ");
        } else {
            return Ok(None);
        }
        Ok(Some(buf.text()[start..].to_string()))
    }
}

/// AND-joined filters keep OR chains and raw fragments grouped.
fn needs_group(filter: &Expr) -> bool {
    matches!(
        filter,
        Expr::Binary {
            op: BinaryOp::Or,
            ..
        } | Expr::Raw(_)
    )
}
