// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Command execution.
//!
//! [`Database`] opens one connection per call and releases it when the call
//! returns, except for [`Executor::reader`], whose [`DataReader`] keeps the
//! connection until dropped. [`Transaction`] implements the same
//! [`Executor`] trait over a single connection, so repositories and queries
//! run unchanged inside a transaction.
//!
//! # Table prefix
//!
//! Raw SQL may carry the placeholders `$pre:$` (removed) and `$pre:`
//! (replaced by [`DataOptions::prefix`]). Generated statements always write
//! table names as `$pre:<table>`.
//!
//! # Failures
//!
//! A provider failure is logged at `error` level with the statement text,
//! parameter tokens replaced by escaped literals, and returned as
//! [`Error::Execution`]. Nothing is retried.

pub mod params;
mod reader;

use std::{borrow::Cow, fmt, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, error, warn};

pub use self::{
    params::{IntoParameters, Object, Parameters},
    reader::{DataReader, ResultSet, Row}
};
use crate::{
    config::DataOptions,
    dialect::{PREFIX_PLACEHOLDER, SqlHelper},
    entity::Entity,
    error::{Error, Result, TransactionError},
    generator::SqlGenerator,
    provider::{Command, ConnectionFactory, ProviderError},
    query::Query,
    repository::Repository,
    transaction::Transaction,
    value::Value
};

const NO_PREFIX: &str = "$pre:$";

/// Statement execution over raw SQL text.
///
/// Parameters are matched to `<prefix><name>` tokens of the dialect.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Statement generator, carrying the dialect and template cache.
    fn generator(&self) -> &SqlGenerator;

    /// Dialect in use.
    fn dialect(&self) -> &dyn SqlHelper {
        self.generator().dialect()
    }

    /// Run a statement and return the affected row count.
    async fn execute(&self, sql: &str, parameters: Parameters) -> Result<u64>;

    /// Run a statement and return its result sets.
    async fn reader(&self, sql: &str, parameters: Parameters) -> Result<DataReader>;

    /// First column of the first row, NULL when there is none.
    async fn scalar(&self, sql: &str, parameters: Parameters) -> Result<Value> {
        Ok(self.reader(sql, parameters).await?.scalar())
    }

    /// Start a query over `T`.
    fn query<T: Entity>(&self) -> Query<'_, T>
    where
        Self: Sized
    {
        Query::new(self)
    }

    /// Typed CRUD facade over `T`.
    fn repository<T: Entity>(&self) -> Repository<'_, T>
    where
        Self: Sized
    {
        Repository::new(self)
    }
}

/// Connection factory, dialect and options of one database.
pub struct Database {
    factory:   Arc<dyn ConnectionFactory>,
    generator: SqlGenerator,
    options:   DataOptions
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("generator", &self.generator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Create a database handle.
    pub fn new<F, H>(factory: F, dialect: H, options: DataOptions) -> Self
    where
        F: ConnectionFactory + 'static,
        H: SqlHelper + 'static
    {
        Self::from_shared(Arc::new(factory), Arc::new(dialect), options)
    }

    /// Create a database handle over shared collaborators.
    pub fn from_shared(
        factory: Arc<dyn ConnectionFactory>,
        dialect: Arc<dyn SqlHelper>,
        options: DataOptions
    ) -> Self {
        let generator = SqlGenerator::new(dialect, options.cache_expiration());
        Self {
            factory,
            generator,
            options
        }
    }

    /// Options given at construction.
    pub fn options(&self) -> &DataOptions {
        &self.options
    }

    /// Open a transaction. It rolls back when dropped without commit.
    pub async fn begin(&self) -> Result<Transaction<'_>> {
        Transaction::begin(self).await
    }

    /// Run `operation` inside a transaction.
    ///
    /// | Outcome | Effect | Result |
    /// |---------|--------|--------|
    /// | `Ok(true)` | commit | `Ok(true)` |
    /// | `Ok(false)` | rollback | `Ok(false)` |
    /// | `Err(e)` | rollback | [`TransactionError::Operation`] wrapping `e` |
    pub async fn transaction<'db, F>(&'db self, operation: F) -> Result<bool>
    where
        F: AsyncFnOnce(&Transaction<'db>) -> Result<bool>
    {
        let tx = self.begin().await?;
        match operation(&tx).await {
            Ok(true) => {
                tx.commit().await?;
                Ok(true)
            }
            Ok(false) => {
                warn!("transaction declined by operation, rolling back");
                tx.rollback().await?;
                Ok(false)
            }
            Err(failure) => {
                warn!(error = %failure, "transaction operation failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %rollback, "rollback after failed operation also failed");
                }
                Err(TransactionError::Operation(Box::new(failure)).into())
            }
        }
    }

    pub(crate) fn factory(&self) -> &dyn ConnectionFactory {
        self.factory.as_ref()
    }

    /// Final command: prefix applied, enumeration values widened.
    pub(crate) fn prepare(&self, sql: &str, parameters: Parameters) -> Command {
        Command::new(
            apply_prefix(sql, &self.options.prefix),
            parameters.into_bound()
        )
    }

    /// Log a provider failure and wrap it.
    pub(crate) fn failure(&self, command: &Command, source: ProviderError) -> Error {
        let sql = if self.options.log_parameters {
            substitute_parameters(&command.text, &command.parameters, self.dialect())
        } else {
            command.text.clone()
        };
        error!(sql = %sql, error = %source, "command failed");
        Error::Execution {
            sql,
            source
        }
    }
}

#[async_trait]
impl Executor for Database {
    fn generator(&self) -> &SqlGenerator {
        &self.generator
    }

    async fn execute(&self, sql: &str, parameters: Parameters) -> Result<u64> {
        let command = self.prepare(sql, parameters);
        let mut connection = self
            .factory
            .open()
            .await
            .map_err(|e| self.failure(&command, e))?;
        debug!(sql = %command.text, parameters = command.parameters.len(), "execute");
        connection
            .execute(&command)
            .await
            .map_err(|e| self.failure(&command, e))
    }

    async fn reader(&self, sql: &str, parameters: Parameters) -> Result<DataReader> {
        let command = self.prepare(sql, parameters);
        let mut connection = self
            .factory
            .open()
            .await
            .map_err(|e| self.failure(&command, e))?;
        debug!(sql = %command.text, parameters = command.parameters.len(), "reader");
        let sets = connection
            .query(&command)
            .await
            .map_err(|e| self.failure(&command, e))?;
        Ok(DataReader::new(sets, Some(connection)))
    }
}

/// Substitute the table-prefix placeholders.
pub fn apply_prefix<'a>(sql: &'a str, prefix: &str) -> Cow<'a, str> {
    if !sql.contains(PREFIX_PLACEHOLDER) {
        return Cow::Borrowed(sql);
    }
    Cow::Owned(sql.replace(NO_PREFIX, "").replace(PREFIX_PLACEHOLDER, prefix))
}

/// Statement text with every parameter token replaced by its escaped
/// literal. Longer names go first so `@p1` never clobbers `@p10`. Values
/// with no literal form are shown by their description.
pub fn substitute_parameters(
    sql: &str,
    parameters: &[(String, Value)],
    dialect: &dyn SqlHelper
) -> String {
    let mut ordered: Vec<&(String, Value)> = parameters.iter().collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    ordered
        .into_iter()
        .fold(sql.to_string(), |text, (name, value)| {
            let literal = dialect.escape(value).unwrap_or_else(|_| value.describe());
            text.replace(&dialect.parameter(name), &literal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_support::{Article, MemoryFactory, TestDialect},
        value::ValueKind
    };

    fn database(factory: &MemoryFactory, prefix: &str) -> Database {
        Database::new(factory.clone(), TestDialect, DataOptions::with_prefix(prefix))
    }

    #[test]
    fn prefix_placeholders() {
        assert_eq!(apply_prefix("SELECT 1", "x_"), "SELECT 1");
        assert_eq!(
            apply_prefix("SELECT * FROM [$pre:Articles]", "site_"),
            "SELECT * FROM [site_Articles]"
        );
        assert_eq!(
            apply_prefix("SELECT * FROM [$pre:$Shared]", "site_"),
            "SELECT * FROM [Shared]"
        );
    }

    #[test]
    fn substitution_prefers_longer_names() {
        let sql = substitute_parameters(
            "UPDATE t SET a=@p1 WHERE b=@p10",
            &[
                ("p1".to_string(), Value::I32(1)),
                ("p10".to_string(), Value::String("x'y".into()))
            ],
            &TestDialect
        );
        assert_eq!(sql, "UPDATE t SET a=1 WHERE b='x''y'");
    }

    #[tokio::test]
    async fn execute_applies_prefix_and_widens() {
        let factory = MemoryFactory::new();
        let db = database(&factory, "site_");
        let rows = db
            .execute(
                "DELETE FROM [$pre:Tags] WHERE [kind]=@kind",
                Parameters::new().with("kind", Value::enumeration(1, ValueKind::I16))
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);
        let last = factory.last();
        assert_eq!(last.text, "DELETE FROM [site_Tags] WHERE [kind]=@kind");
        assert_eq!(last.parameter("kind"), Some(&Value::I16(1)));
    }

    #[tokio::test]
    async fn reader_owns_its_connection() {
        let factory = MemoryFactory::new();
        factory.push_result(vec![ResultSet::new(
            ["Id", "Title"],
            vec![vec![Value::I32(4), "four".into()]]
        )]);
        let db = database(&factory, "");
        let reader = db
            .reader("SELECT [Id], [Title] FROM [$pre:Articles]", Parameters::new())
            .await
            .unwrap();
        assert!(reader.owns_connection());
        let articles: Vec<Article> = reader.read().unwrap();
        assert_eq!(articles[0].title, "four");
    }

    #[tokio::test]
    async fn scalar_reads_first_cell() {
        let factory = MemoryFactory::new();
        factory.push_result(vec![ResultSet::scalar(12_i64)]);
        let db = database(&factory, "");
        let value = db
            .scalar("SELECT COUNT(1) FROM [$pre:Articles]", Parameters::new())
            .await
            .unwrap();
        assert_eq!(value, Value::I64(12));
    }

    #[tokio::test]
    async fn failure_carries_literal_sql() {
        let factory = MemoryFactory::new();
        factory.fail_on("Articles");
        let db = database(&factory, "");
        let err = db
            .execute(
                "UPDATE [$pre:Articles] SET [Title]=@p0",
                Parameters::new().with("p0", "O'Hara")
            )
            .await
            .unwrap_err();
        match err {
            Error::Execution {
                sql, ..
            } => assert_eq!(sql, "UPDATE [Articles] SET [Title]='O''Hara'"),
            other => panic!("unexpected {other:?}")
        }
    }

    #[tokio::test]
    async fn failure_hides_values_when_disabled() {
        let factory = MemoryFactory::new();
        factory.fail_on("Articles");
        let options = DataOptions {
            log_parameters: false,
            ..DataOptions::default()
        };
        let db = Database::new(factory.clone(), TestDialect, options);
        let err = db
            .execute(
                "DELETE FROM [$pre:Articles] WHERE [Id]=@Id",
                Parameters::new().with("Id", 3)
            )
            .await
            .unwrap_err();
        match err {
            Error::Execution {
                sql, ..
            } => assert_eq!(sql, "DELETE FROM [Articles] WHERE [Id]=@Id"),
            other => panic!("unexpected {other:?}")
        }
    }
}
