// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Synchronous facade.
//!
//! [`Database`] owns a current-thread tokio runtime and drives the async
//! API on it. Every method blocks the calling thread until the statement
//! completes, so it must not be used from inside an async runtime;
//! constructing one there fails with [`Error::Configuration`].
//!
//! ```rust,ignore
//! let db = blocking::Database::new(factory, PgHelper, DataOptions::from_env()?)?;
//! let titles = db
//!     .query::<Article>()
//!     .filter(col("Published"))
//!     .select([col("Title")])
//!     .to_list()?;
//! ```

use std::{fmt, future::Future};

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{error, warn};

use crate::{
    config::DataOptions,
    dialect::SqlHelper,
    entity::Entity,
    error::{Error, Result, TransactionError},
    executor::{self, DataReader, Executor, IntoParameters},
    expr::Expr,
    generator::{Aggregate, Patch},
    provider::ConnectionFactory,
    query::{self, Page, Pagination},
    repository::{self, MoveDirection},
    sql::SqlStatement,
    transaction,
    value::{FromValue, Value}
};

/// Blocking database handle.
pub struct Database {
    inner:   executor::Database,
    runtime: Runtime
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Create a blocking handle with its own runtime.
    pub fn new<F, H>(factory: F, dialect: H, options: DataOptions) -> Result<Self>
    where
        F: ConnectionFactory + 'static,
        H: SqlHelper + 'static
    {
        Self::from_async(executor::Database::new(factory, dialect, options))
    }

    /// Wrap an async handle.
    pub fn from_async(inner: executor::Database) -> Result<Self> {
        if Handle::try_current().is_ok() {
            return Err(Error::configuration(
                "blocking::Database cannot be created inside an async runtime"
            ));
        }
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::configuration(format!("cannot start runtime: {e}")))?;
        Ok(Self {
            inner,
            runtime
        })
    }

    /// Underlying async handle.
    pub fn as_async(&self) -> &executor::Database {
        &self.inner
    }

    /// Options given at construction.
    pub fn options(&self) -> &DataOptions {
        self.inner.options()
    }

    /// Drive any future of the async API to completion.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Run a statement and return the affected row count.
    pub fn execute(&self, sql: &str, parameters: impl IntoParameters) -> Result<u64> {
        let parameters = parameters.into_parameters()?;
        self.block_on(self.inner.execute(sql, parameters))
    }

    /// Run a statement and return its result sets.
    pub fn reader(&self, sql: &str, parameters: impl IntoParameters) -> Result<DataReader> {
        let parameters = parameters.into_parameters()?;
        self.block_on(self.inner.reader(sql, parameters))
    }

    /// First column of the first row, NULL when there is none.
    pub fn scalar(&self, sql: &str, parameters: impl IntoParameters) -> Result<Value> {
        let parameters = parameters.into_parameters()?;
        self.block_on(self.inner.scalar(sql, parameters))
    }

    /// Start a query over `T`.
    pub fn query<T: Entity>(&self) -> Query<'_, T> {
        Query {
            inner:   self.inner.query::<T>(),
            runtime: &self.runtime
        }
    }

    /// Typed CRUD facade over `T`.
    pub fn repository<T: Entity>(&self) -> Repository<'_, T> {
        Repository {
            inner:   self.inner.repository::<T>(),
            runtime: &self.runtime
        }
    }

    /// Open a transaction. It rolls back when dropped without commit.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let inner = self.block_on(self.inner.begin())?;
        Ok(Transaction {
            inner,
            runtime: &self.runtime
        })
    }

    /// Run `operation` inside a transaction, with the same outcome table
    /// as [`executor::Database::transaction`].
    pub fn transaction<F>(&self, operation: F) -> Result<bool>
    where
        F: FnOnce(&Transaction<'_>) -> Result<bool>
    {
        let tx = self.begin()?;
        match operation(&tx) {
            Ok(true) => {
                tx.commit()?;
                Ok(true)
            }
            Ok(false) => {
                warn!("transaction declined by operation, rolling back");
                tx.rollback()?;
                Ok(false)
            }
            Err(failure) => {
                warn!(error = %failure, "transaction operation failed, rolling back");
                if let Err(rollback) = tx.rollback() {
                    error!(error = %rollback, "rollback after failed operation also failed");
                }
                Err(TransactionError::Operation(Box::new(failure)).into())
            }
        }
    }
}

/// Blocking transaction.
pub struct Transaction<'db> {
    inner:   transaction::Transaction<'db>,
    runtime: &'db Runtime
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

impl<'db> Transaction<'db> {
    /// Make every statement of this transaction durable.
    pub fn commit(self) -> Result<()> {
        self.runtime.block_on(self.inner.commit())
    }

    /// Discard every statement of this transaction.
    pub fn rollback(self) -> Result<()> {
        self.runtime.block_on(self.inner.rollback())
    }

    /// Run a statement and return the affected row count.
    pub fn execute(&self, sql: &str, parameters: impl IntoParameters) -> Result<u64> {
        let parameters = parameters.into_parameters()?;
        self.runtime
            .block_on(self.inner.execute(sql, parameters))
    }

    /// Run a statement and return its result sets.
    pub fn reader(&self, sql: &str, parameters: impl IntoParameters) -> Result<DataReader> {
        let parameters = parameters.into_parameters()?;
        self.runtime
            .block_on(self.inner.reader(sql, parameters))
    }

    /// First column of the first row, NULL when there is none.
    pub fn scalar(&self, sql: &str, parameters: impl IntoParameters) -> Result<Value> {
        let parameters = parameters.into_parameters()?;
        self.runtime
            .block_on(self.inner.scalar(sql, parameters))
    }

    /// Start a query over `T` inside this transaction.
    pub fn query<T: Entity>(&self) -> Query<'_, T> {
        Query {
            inner:   self.inner.query::<T>(),
            runtime: self.runtime
        }
    }

    /// Typed CRUD facade over `T` inside this transaction.
    pub fn repository<T: Entity>(&self) -> Repository<'_, T> {
        Repository {
            inner:   self.inner.repository::<T>(),
            runtime: self.runtime
        }
    }
}

/// Blocking query builder; see [`query::Query`].
pub struct Query<'e, T: Entity> {
    inner:   query::Query<'e, T>,
    runtime: &'e Runtime
}

impl<'e, T: Entity> Query<'e, T> {
    fn map(self, f: impl FnOnce(query::Query<'e, T>) -> query::Query<'e, T>) -> Self {
        Self {
            inner:   f(self.inner),
            runtime: self.runtime
        }
    }

    /// `INNER JOIN`
    pub fn inner_join<U: Entity>(self, on: Expr) -> Self {
        self.map(|q| q.inner_join::<U>(on))
    }

    /// `LEFT JOIN`
    pub fn left_join<U: Entity>(self, on: Expr) -> Self {
        self.map(|q| q.left_join::<U>(on))
    }

    /// `RIGHT JOIN`
    pub fn right_join<U: Entity>(self, on: Expr) -> Self {
        self.map(|q| q.right_join::<U>(on))
    }

    /// Explicit projection.
    pub fn select<I>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = Expr>
    {
        self.map(|q| q.select(columns))
    }

    /// Leave properties out of the default projection.
    pub fn exclude<I, S>(self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        self.map(|q| q.exclude(properties))
    }

    /// `SELECT DISTINCT`
    pub fn distinct(self) -> Self {
        self.map(query::Query::distinct)
    }

    /// AND-joined filter.
    pub fn filter(self, predicate: Expr) -> Self {
        self.map(|q| q.filter(predicate))
    }

    /// Raw SQL filter.
    pub fn filter_raw(self, sql: impl Into<String>) -> Self {
        self.map(|q| q.filter_raw(sql))
    }

    /// Ascending order.
    pub fn order_by(self, column: Expr) -> Self {
        self.map(|q| q.order_by(column))
    }

    /// Descending order.
    pub fn order_by_desc(self, column: Expr) -> Self {
        self.map(|q| q.order_by_desc(column))
    }

    /// Rendered row query.
    pub fn to_statement(&self) -> Result<SqlStatement> {
        self.inner.to_statement()
    }

    /// First matching row.
    pub fn first(&self) -> Result<Option<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.first())
    }

    /// At most `size` rows.
    pub fn take(&self, size: usize) -> Result<Vec<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.take(size))
    }

    /// Every matching row.
    pub fn to_list(&self) -> Result<Vec<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.to_list())
    }

    /// One page and the total count.
    pub fn page(&self, pagination: Pagination) -> Result<Page<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.page(pagination))
    }

    /// Number of matching rows.
    pub fn count(&self) -> Result<u64> {
        self.runtime.block_on(self.inner.count())
    }

    /// Check if any row matches.
    pub fn any(&self) -> Result<bool> {
        self.runtime.block_on(self.inner.any())
    }
}

/// Blocking CRUD facade; see [`repository::Repository`].
pub struct Repository<'e, T: Entity> {
    inner:   repository::Repository<'e, T>,
    runtime: &'e Runtime
}

impl<'e, T: Entity> Repository<'e, T> {
    /// Insert `entity`, writing back a generated identity.
    pub fn create(&self, entity: &mut T) -> Result<bool> {
        self.runtime.block_on(self.inner.create(entity))
    }

    /// Full-row update by primary key.
    pub fn update(&self, entity: &T) -> Result<bool> {
        self.runtime.block_on(self.inner.update(entity))
    }

    /// Partial update of the matching rows.
    pub fn update_where(&self, filter: Option<Expr>, patch: &Patch) -> Result<u64> {
        self.runtime
            .block_on(self.inner.update_where(filter, patch))
    }

    /// Delete by primary key.
    pub fn delete(&self, entity: &T) -> Result<bool> {
        self.runtime.block_on(self.inner.delete(entity))
    }

    /// Delete by primary key values.
    pub fn delete_by_key(&self, keys: &[Value]) -> Result<bool> {
        self.runtime.block_on(self.inner.delete_by_key(keys))
    }

    /// Delete the matching rows.
    pub fn delete_where(&self, filter: Option<Expr>) -> Result<u64> {
        self.runtime.block_on(self.inner.delete_where(filter))
    }

    /// Row with a single-column primary key.
    pub fn find(&self, key: impl Into<Value>) -> Result<Option<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.find(key))
    }

    /// Row with the given primary key values.
    pub fn find_by_key(&self, keys: &[Value]) -> Result<Option<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.find_by_key(keys))
    }

    /// First row matching `filter`.
    pub fn first(&self, filter: Expr) -> Result<Option<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.first(filter))
    }

    /// Every row matching `filter`.
    pub fn fetch(&self, filter: Option<Expr>) -> Result<Vec<T>>
    where
        T: Default
    {
        self.runtime.block_on(self.inner.fetch(filter))
    }

    /// Check if any row matches `filter`.
    pub fn any(&self, filter: Option<Expr>) -> Result<bool> {
        self.runtime.block_on(self.inner.any(filter))
    }

    /// Number of rows matching `filter`.
    pub fn count(&self, filter: Option<Expr>) -> Result<u64> {
        self.runtime.block_on(self.inner.count(filter))
    }

    /// Aggregate over `column`.
    pub fn aggregate<V: FromValue>(
        &self,
        aggregate: Aggregate,
        column: Option<Expr>,
        filter: Option<Expr>
    ) -> Result<V> {
        self.runtime
            .block_on(self.inner.aggregate(aggregate, column, filter))
    }

    /// Swap the ordinal with the nearest smaller one.
    pub fn move_up(&self, entity: &T, order: &str, scope: Option<Expr>) -> Result<bool>
    where
        T: Default
    {
        self.move_to(entity, order, MoveDirection::Up, scope)
    }

    /// Swap the ordinal with the nearest larger one.
    pub fn move_down(&self, entity: &T, order: &str, scope: Option<Expr>) -> Result<bool>
    where
        T: Default
    {
        self.move_to(entity, order, MoveDirection::Down, scope)
    }

    /// Swap ordinals with the adjacent row.
    pub fn move_to(
        &self,
        entity: &T,
        order: &str,
        direction: MoveDirection,
        scope: Option<Expr>
    ) -> Result<bool>
    where
        T: Default
    {
        self.runtime
            .block_on(self.inner.move_to(entity, order, direction, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::{Parameters, ResultSet},
        expr::col,
        test_support::{Article, Category, MemoryFactory, TestDialect}
    };

    fn database(factory: &MemoryFactory) -> Database {
        Database::new(factory.clone(), TestDialect, DataOptions::default()).unwrap()
    }

    #[test]
    fn execute_and_scalar_block() {
        let factory = MemoryFactory::new();
        factory.push_result(vec![ResultSet::scalar(3_i64)]);
        let db = database(&factory);
        let rows = db
            .execute("DELETE FROM [$pre:Tags] WHERE [id]=@id", [("id", 4)])
            .unwrap();
        assert_eq!(rows, 1);
        let count = db
            .scalar("SELECT COUNT(1) FROM [$pre:Tags]", ())
            .unwrap();
        assert_eq!(count, Value::I64(3));
    }

    #[test]
    fn query_and_repository_mirror_async_api() {
        let factory = MemoryFactory::new();
        factory
            .push_result(vec![ResultSet::new(
                ["Id", "Title"],
                vec![vec![Value::I32(1), "one".into()]]
            )])
            .push_result(vec![ResultSet::scalar(1_i32)]);
        let db = database(&factory);
        let list = db
            .query::<Article>()
            .filter(col("Published"))
            .to_list()
            .unwrap();
        assert_eq!(list[0].title, "one");
        assert!(db.repository::<Article>().any(None).unwrap());
    }

    #[test]
    fn transaction_outcomes_match_async() {
        let factory = MemoryFactory::new();
        let db = database(&factory);
        let committed = db
            .transaction(|tx| {
                tx.execute("DELETE FROM [$pre:Tags]", Parameters::new())?;
                tx.repository::<Category>()
                    .delete_where(Some(col("ParentId").eq(3)))?;
                Ok(true)
            })
            .unwrap();
        assert!(committed);
        assert_eq!(factory.committed().len(), 2);

        let declined = db
            .transaction(|tx| {
                tx.execute("DELETE FROM [$pre:Articles]", ())?;
                Ok(false)
            })
            .unwrap();
        assert!(!declined);
        assert_eq!(factory.committed().len(), 2);

        factory.fail_on("Articles");
        let err = db
            .transaction(|tx| {
                tx.execute("DELETE FROM [$pre:Articles]", ())?;
                Ok(true)
            })
            .unwrap_err();
        match err {
            Error::Transaction(inner) => assert!(inner.is_operation()),
            other => panic!("unexpected {other:?}")
        }
        factory.with_state(|s| assert_eq!(s.rollbacks, 2));
    }

    #[tokio::test]
    async fn refuses_to_start_inside_a_runtime() {
        let err = Database::new(MemoryFactory::new(), TestDialect, DataOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
