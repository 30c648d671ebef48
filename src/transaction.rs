// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Transaction-scoped executor.
//!
//! One connection, one provider transaction and one [`Command`] reused for
//! every statement. Statements run one at a time; the command is
//! re-parameterized for each call.
//!
//! ```rust,ignore
//! let committed = db
//!     .transaction(async |tx| {
//!         let articles = tx.repository::<Article>();
//!         articles.update_where(col("Id").eq(1), Patch::new().set("ViewCount", 0)).await?;
//!         Ok(true)
//!     })
//!     .await?;
//! ```
//!
//! Dropping a [`Transaction`] without [`commit`](Transaction::commit)
//! releases the connection with the transaction still open; providers roll
//! back on release.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::{Error, Result},
    executor::{DataReader, Database, Executor, Parameters},
    generator::SqlGenerator,
    provider::{Command, Connection, ProviderError}
};

pub use crate::error::TransactionError;

struct Scope {
    connection: Box<dyn Connection>,
    command:    Command
}

/// Open transaction over one connection.
pub struct Transaction<'db> {
    db:    &'db Database,
    scope: Mutex<Scope>
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

impl<'db> Transaction<'db> {
    pub(crate) async fn begin(db: &'db Database) -> Result<Self> {
        let mut connection = db
            .factory()
            .open()
            .await
            .map_err(|e| begin_failed(db, e))?;
        connection
            .begin()
            .await
            .map_err(|e| begin_failed(db, e))?;
        debug!("transaction started");
        Ok(Self {
            db,
            scope: Mutex::new(Scope {
                connection,
                command: Command::default()
            })
        })
    }

    /// Make every statement of this transaction durable.
    pub async fn commit(self) -> Result<()> {
        let mut scope = self.scope.into_inner();
        scope.connection.commit().await.map_err(|e| {
            let failure = self.db.failure(&Command::new("COMMIT", Vec::new()), e);
            Error::from(TransactionError::Commit(Box::new(failure)))
        })?;
        debug!("transaction committed");
        Ok(())
    }

    /// Discard every statement of this transaction.
    pub async fn rollback(self) -> Result<()> {
        let mut scope = self.scope.into_inner();
        scope.connection.rollback().await.map_err(|e| {
            let failure = self.db.failure(&Command::new("ROLLBACK", Vec::new()), e);
            Error::from(TransactionError::Rollback(Box::new(failure)))
        })?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Database this transaction runs on.
    pub fn database(&self) -> &'db Database {
        self.db
    }
}

fn begin_failed(db: &Database, source: ProviderError) -> Error {
    let failure = db.failure(&Command::new("BEGIN", Vec::new()), source);
    TransactionError::Begin(Box::new(failure)).into()
}

#[async_trait]
impl Executor for Transaction<'_> {
    fn generator(&self) -> &SqlGenerator {
        self.db.generator()
    }

    async fn execute(&self, sql: &str, parameters: Parameters) -> Result<u64> {
        let prepared = self.db.prepare(sql, parameters);
        let mut scope = self.scope.lock().await;
        let Scope {
            connection,
            command
        } = &mut *scope;
        command.reset(&prepared.text, prepared.parameters);
        debug!(sql = %command.text, parameters = command.parameters.len(), "execute in transaction");
        connection
            .execute(command)
            .await
            .map_err(|e| self.db.failure(command, e))
    }

    async fn reader(&self, sql: &str, parameters: Parameters) -> Result<DataReader> {
        let prepared = self.db.prepare(sql, parameters);
        let mut scope = self.scope.lock().await;
        let Scope {
            connection,
            command
        } = &mut *scope;
        command.reset(&prepared.text, prepared.parameters);
        debug!(sql = %command.text, parameters = command.parameters.len(), "reader in transaction");
        let sets = connection
            .query(command)
            .await
            .map_err(|e| self.db.failure(command, e))?;
        Ok(DataReader::new(sets, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DataOptions,
        executor::ResultSet,
        test_support::{MemoryFactory, TestDialect},
        value::Value
    };

    fn database(factory: &MemoryFactory) -> Database {
        Database::new(factory.clone(), TestDialect, DataOptions::default())
    }

    #[tokio::test]
    async fn committed_writes_become_visible() {
        let factory = MemoryFactory::new();
        let db = database(&factory);
        let committed = db
            .transaction(async |tx| {
                tx.execute("DELETE FROM [$pre:Tags]", Parameters::new()).await?;
                tx.execute("DELETE FROM [$pre:Articles]", Parameters::new()).await?;
                Ok(true)
            })
            .await
            .unwrap();
        assert!(committed);
        assert_eq!(
            factory.committed(),
            vec!["DELETE FROM [Tags]", "DELETE FROM [Articles]"]
        );
        factory.with_state(|s| {
            assert_eq!(s.opened, 1);
            assert_eq!(s.commits, 1);
            assert_eq!(s.rollbacks, 0);
        });
    }

    #[tokio::test]
    async fn declined_operation_rolls_back() {
        let factory = MemoryFactory::new();
        let db = database(&factory);
        let committed = db
            .transaction(async |tx| {
                tx.execute("DELETE FROM [$pre:Tags]", Parameters::new()).await?;
                Ok(false)
            })
            .await
            .unwrap();
        assert!(!committed);
        assert!(factory.committed().is_empty());
        factory.with_state(|s| assert_eq!(s.rollbacks, 1));
    }

    #[tokio::test]
    async fn failed_operation_rolls_back_and_reports() {
        let factory = MemoryFactory::new();
        factory.fail_on("Articles");
        let db = database(&factory);
        let err = db
            .transaction(async |tx| {
                tx.execute("DELETE FROM [$pre:Tags]", Parameters::new()).await?;
                tx.execute("DELETE FROM [$pre:Articles]", Parameters::new()).await?;
                Ok(true)
            })
            .await
            .unwrap_err();
        match err {
            Error::Transaction(inner) => {
                assert!(inner.is_operation());
                assert!(inner.into_inner().is_execution());
            }
            other => panic!("unexpected {other:?}")
        }
        assert!(factory.committed().is_empty());
        factory.with_state(|s| {
            assert_eq!(s.rollbacks, 1);
            assert_eq!(s.commits, 0);
        });
    }

    #[tokio::test]
    async fn commit_failure_is_reported() {
        let factory = MemoryFactory::new();
        factory.fail_on("COMMIT");
        let db = database(&factory);
        let err = db
            .transaction(async |tx| {
                tx.execute("DELETE FROM [$pre:Tags]", Parameters::new()).await?;
                Ok(true)
            })
            .await
            .unwrap_err();
        match err {
            Error::Transaction(inner) => assert!(inner.is_commit()),
            other => panic!("unexpected {other:?}")
        }
        assert!(factory.committed().is_empty());
    }

    #[tokio::test]
    async fn statements_share_one_connection() {
        let factory = MemoryFactory::new();
        factory.push_result(vec![ResultSet::scalar(5_i32)]);
        let db = database(&factory);
        let tx = db.begin().await.unwrap();
        tx.execute("UPDATE [$pre:Articles] SET [ViewCount]=@v", Parameters::new().with("v", 1))
            .await
            .unwrap();
        let count = tx
            .scalar("SELECT COUNT(1) FROM [$pre:Articles]", Parameters::new())
            .await
            .unwrap();
        assert_eq!(count, Value::I32(5));
        let reader = tx
            .reader("SELECT 1", Parameters::new())
            .await
            .unwrap();
        assert!(!reader.owns_connection());
        tx.commit().await.unwrap();
        factory.with_state(|s| {
            assert_eq!(s.opened, 1);
            assert_eq!(s.log.len(), 3);
            assert_eq!(s.log[0].parameter("v"), Some(&Value::I32(1)));
            assert!(s.log[1].parameters.is_empty());
        });
    }

    #[tokio::test]
    async fn dropped_transaction_never_commits() {
        let factory = MemoryFactory::new();
        let db = database(&factory);
        {
            let tx = db.begin().await.unwrap();
            tx.execute("DELETE FROM [$pre:Tags]", Parameters::new())
                .await
                .unwrap();
        }
        assert!(factory.committed().is_empty());
    }
}
