// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! # entity-data
//!
//! Data-access core for entity types: expression-to-SQL compiler, fluent
//! query builder, cached CRUD statement generator and an execution layer
//! with transactions.
//!
//! ## Overview
//!
//! - [`Entity`] / [`EntityType`] describe how a type maps to a table
//! - [`expr`] builds predicates and values; [`compiler`] turns them into SQL
//! - [`generator::SqlGenerator`] renders and caches CRUD templates
//! - [`query::Query`] assembles joined, filtered, ordered and paged SELECTs
//! - [`Database`] and [`transaction::Transaction`] run statements through a
//!   pluggable [`provider::ConnectionFactory`]
//! - [`repository::Repository`] is the typed CRUD facade
//! - [`blocking`] mirrors the API for synchronous callers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entity_data::prelude::*;
//!
//! let db = Database::new(factory, PgHelper, DataOptions::from_env()?);
//!
//! let mut article = Article { title: "Hello".into(), ..Default::default() };
//! db.repository::<Article>().create(&mut article).await?;
//!
//! let page = db
//!     .query::<Article>()
//!     .filter(col("Published").and(col("ViewCount").gt(100)))
//!     .order_by_desc(col("CreatedAt"))
//!     .page(Pagination::page(0, 20))
//!     .await?;
//!
//! db.transaction(async |tx| {
//!     tx.repository::<Article>()
//!         .update_where(Some(col("Id").eq(article.id)), &Patch::new().set("ViewCount", 0))
//!         .await?;
//!     Ok(true)
//! })
//! .await?;
//! ```
//!
//! ## Features
//!
//! - `postgres` — [`provider::postgres`] adapter over `sqlx::PgPool`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod blocking;
pub mod compiler;
pub mod config;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod executor;
pub mod expr;
pub mod generator;
pub mod prelude;
pub mod provider;
pub mod query;
pub mod repository;
pub mod sql;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod test_support;

pub use self::{
    config::DataOptions,
    dialect::SqlHelper,
    entity::{Entity, EntityType, Property, PropertyFlags},
    error::{Error, Result, TransactionError},
    executor::{Database, Executor},
    value::{FromValue, Value, ValueKind}
};
