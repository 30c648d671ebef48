// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Convenient re-exports for common usage.
//!
//! # Usage
//!
//! ```rust,ignore
//! use entity_data::prelude::*;
//! ```

#[cfg(feature = "postgres")]
pub use crate::provider::postgres::{PgConnectionFactory, PgHelper};
pub use crate::{
    DataOptions, Database, Entity, EntityType, Error, Executor, FromValue, PropertyFlags, Result,
    SqlHelper, Value, ValueKind,
    executor::{IntoParameters, Object, Parameters},
    expr::{Expr, case, col, field, func, null, raw, val},
    generator::{Aggregate, Patch},
    query::{JoinKind, Page, Pagination, SortDirection},
    repository::{MoveDirection, Repository},
    transaction::Transaction
};
