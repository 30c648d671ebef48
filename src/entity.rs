// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Entity metadata contract.
//!
//! How metadata is produced (hand-written, derived, generated) is outside
//! this crate. Generators only consume an [`EntityType`]: a static
//! descriptor table built once per type and handed out by
//! [`Entity::entity_type`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::OnceLock;
//!
//! use entity_data::{Entity, EntityType, PropertyFlags, Result, Value, ValueKind};
//!
//! #[derive(Default)]
//! struct Article {
//!     id:    i32,
//!     title: String
//! }
//!
//! impl Entity for Article {
//!     fn entity_type() -> &'static EntityType {
//!         static TYPE: OnceLock<EntityType> = OnceLock::new();
//!         TYPE.get_or_init(|| {
//!             EntityType::builder("Article", "Articles")
//!                 .property("Id", ValueKind::I32, PropertyFlags::IDENTITY | PropertyFlags::KEY)
//!                 .property("Title", ValueKind::String, PropertyFlags::NONE)
//!                 .build()
//!         })
//!     }
//!
//!     fn get(&self, property: &str) -> Value {
//!         match property {
//!             "Id" => self.id.into(),
//!             "Title" => self.title.clone().into(),
//!             _ => Value::Null
//!         }
//!     }
//!
//!     fn set(&mut self, property: &str, value: Value) -> Result<()> {
//!         match property {
//!             "Id" => self.id = entity_data::FromValue::from_nullable(value)?,
//!             "Title" => self.title = entity_data::FromValue::from_nullable(value)?,
//!             _ => {}
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let ty = Article::entity_type();
//! assert_eq!(ty.identity().map(|p| p.name()), Some("Id"));
//! ```

use std::{fmt, ops::BitOr};

use convert_case::{Case, Casing};

use crate::{
    error::{Error, Result},
    executor::Row,
    value::{Value, ValueKind}
};

/// Per-property mapping flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyFlags(u8);

impl PropertyFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Part of the primary key.
    pub const KEY: Self = Self(1);
    /// Database-generated auto-increment value.
    pub const IDENTITY: Self = Self(1 << 1);
    /// Not stored in the table.
    pub const NOT_MAPPED: Self = Self(1 << 2);
    /// Written on insert, never by full-row update.
    pub const NOT_UPDATED: Self = Self(1 << 3);
    /// Concurrency token maintained by the database.
    pub const ROW_VERSION: Self = Self(1 << 4);

    /// Check if all flags in `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for PropertyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::KEY, "KEY"),
            (Self::IDENTITY, "IDENTITY"),
            (Self::NOT_MAPPED, "NOT_MAPPED"),
            (Self::NOT_UPDATED, "NOT_UPDATED"),
            (Self::ROW_VERSION, "ROW_VERSION")
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag) && flag.0 != 0)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "PropertyFlags({})", set.join(" | "))
    }
}

/// One mapped property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name:   String,
    column: String,
    kind:   ValueKind,
    flags:  PropertyFlags
}

impl Property {
    /// Model-side name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column name in the table.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Declared value type.
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Mapping flags.
    pub const fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Part of the primary key.
    pub const fn is_key(&self) -> bool {
        self.flags.contains(PropertyFlags::KEY)
    }

    /// Database-generated.
    pub const fn is_identity(&self) -> bool {
        self.flags.contains(PropertyFlags::IDENTITY)
    }

    /// Stored in the table.
    pub const fn is_mapped(&self) -> bool {
        !self.flags.contains(PropertyFlags::NOT_MAPPED)
    }

    /// Written by full-row UPDATE.
    pub const fn is_updatable(&self) -> bool {
        self.is_mapped()
            && !self.is_identity()
            && !self.flags.contains(PropertyFlags::NOT_UPDATED)
            && !self.flags.contains(PropertyFlags::ROW_VERSION)
    }

    /// Written by INSERT.
    pub const fn is_insertable(&self) -> bool {
        self.is_mapped() && !self.is_identity() && !self.flags.contains(PropertyFlags::ROW_VERSION)
    }
}

/// Static mapping description of one model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    name:        &'static str,
    table:       String,
    properties:  Vec<Property>,
    primary_key: Vec<usize>,
    identity:    Option<usize>
}

impl EntityType {
    /// Start building a descriptor.
    ///
    /// # Arguments
    ///
    /// * `name` — stable type identity, also used as alias-map key
    /// * `table` — table name without prefix
    pub fn builder(name: &'static str, table: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            name,
            table: table.into(),
            column_case: None,
            properties: Vec::new()
        }
    }

    /// Type identity.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Table name without prefix.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every property in declaration order, mapped or not.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Mapped properties in declaration order.
    pub fn mapped(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| p.is_mapped())
    }

    /// Primary key properties.
    pub fn primary_key(&self) -> impl Iterator<Item = &Property> {
        self.primary_key.iter().map(|&i| &self.properties[i])
    }

    /// Check if a primary key is declared.
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Identity property, if any.
    pub fn identity(&self) -> Option<&Property> {
        self.identity.map(|i| &self.properties[i])
    }

    /// Find a property by model name.
    pub fn find(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Find a mapped property or fail with a translation error.
    pub fn property(&self, name: &str) -> Result<&Property> {
        self.find(name)
            .filter(|p| p.is_mapped())
            .ok_or_else(|| {
                Error::translation(format!(
                    "`{}` has no mapped property `{name}`",
                    self.name
                ))
            })
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name:        &'static str,
    table:       String,
    column_case: Option<Case<'static>>,
    properties:  Vec<(String, Option<String>, ValueKind, PropertyFlags)>
}

impl EntityTypeBuilder {
    /// Derive column names from property names with the given case.
    pub fn column_case(mut self, case: Case<'static>) -> Self {
        self.column_case = Some(case);
        self
    }

    /// Add a property whose column name follows the property name.
    pub fn property(
        mut self,
        name: impl Into<String>,
        kind: ValueKind,
        flags: PropertyFlags
    ) -> Self {
        self.properties.push((name.into(), None, kind, flags));
        self
    }

    /// Add a property stored under an explicit column name.
    pub fn column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        kind: ValueKind,
        flags: PropertyFlags
    ) -> Self {
        self.properties
            .push((name.into(), Some(column.into()), kind, flags));
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> EntityType {
        let column_case = self.column_case;
        let properties: Vec<Property> = self
            .properties
            .into_iter()
            .map(|(name, column, kind, flags)| {
                let column = column.unwrap_or_else(|| match &column_case {
                    Some(case) => name.to_case(case.clone()),
                    None => name.clone()
                });
                Property {
                    name,
                    column,
                    kind,
                    flags
                }
            })
            .collect();
        let primary_key = properties
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_key())
            .map(|(i, _)| i)
            .collect();
        let identity = properties.iter().position(Property::is_identity);

        EntityType {
            name: self.name,
            table: self.table,
            properties,
            primary_key,
            identity
        }
    }
}

/// A model type with static table mapping.
///
/// `get`/`set` are the typed accessor table: generators read property
/// values through `get`, row materialization and identity write-back go
/// through `set`.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Static descriptor, built once.
    fn entity_type() -> &'static EntityType;

    /// Read a property value.
    fn get(&self, property: &str) -> Value;

    /// Write a property value.
    fn set(&mut self, property: &str, value: Value) -> Result<()>;

    /// Materialize an instance from a row.
    ///
    /// Columns are matched by column name; unknown columns are ignored.
    fn from_row(row: &Row) -> Result<Self>
    where
        Self: Default
    {
        let ty = Self::entity_type();
        let mut instance = Self::default();
        for property in ty.mapped() {
            if let Some(value) = row.get(property.column()) {
                instance.set(property.name(), value.clone())?;
            }
        }
        Ok(instance)
    }
}
