// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Error types for the data-access core.
//!
//! | Variant | Raised by | Retried |
//! |---------|-----------|---------|
//! | [`Error::Translation`] | expression compiler | never |
//! | [`Error::Configuration`] | metadata, dialect type map, options | never |
//! | [`Error::Argument`] | any public entry point, before SQL is built | never |
//! | [`Error::Execution`] | executor, after logging the substituted SQL | never |
//! | [`Error::Transaction`] | transaction runner, after rollback | never |
//! | [`Error::Conversion`] | value converters and row materialization | never |

use std::{error::Error as StdError, fmt};

use crate::provider::ProviderError;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Crate error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Expression shape cannot be rendered as SQL.
    #[error("translation error: {0}")]
    Translation(String),

    /// Missing mapping, metadata or option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller supplied an unusable argument.
    #[error("invalid argument `{name}`: {message}")]
    Argument {
        /// Offending parameter name.
        name:    &'static str,
        /// What is wrong with it.
        message: String
    },

    /// Provider failed while opening, executing or reading.
    #[error("execution failed: {source}")]
    Execution {
        /// SQL with parameters substituted by escaped literals.
        sql:    String,
        /// Provider failure.
        #[source]
        source: ProviderError
    },

    /// Transaction could not complete; rollback has been attempted.
    #[error(transparent)]
    Transaction(#[from] TransactionError<Box<Error>>),

    /// Value could not be converted to the requested type.
    #[error("cannot convert {found} to {expected}")]
    Conversion {
        /// Requested type.
        expected: &'static str,
        /// Actual value description.
        found:    String
    }
}

impl Error {
    /// Build an argument error.
    pub fn argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::Argument {
            name,
            message: message.into()
        }
    }

    /// Build a translation error.
    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation(message.into())
    }

    /// Build a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this is a translation error.
    pub const fn is_translation(&self) -> bool {
        matches!(self, Self::Translation(_))
    }

    /// Check if this is an argument error.
    pub const fn is_argument(&self) -> bool {
        matches!(self, Self::Argument { .. })
    }

    /// Check if this is an execution error.
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }

    /// Check if this is a transaction error.
    pub const fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}

/// Error type for transaction operations.
///
/// Wraps the underlying failure and records which transaction step failed.
#[derive(Debug)]
pub enum TransactionError<E> {
    /// Failed to begin transaction.
    Begin(E),

    /// Failed to commit transaction.
    Commit(E),

    /// Failed to rollback transaction.
    Rollback(E),

    /// Operation within transaction failed.
    Operation(E)
}

impl<E: fmt::Display> fmt::Display for TransactionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin(e) => write!(f, "failed to begin transaction: {e}"),
            Self::Commit(e) => write!(f, "failed to commit transaction: {e}"),
            Self::Rollback(e) => write!(f, "failed to rollback transaction: {e}"),
            Self::Operation(e) => write!(f, "transaction operation failed: {e}")
        }
    }
}

impl<E: StdError + 'static> StdError for TransactionError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Begin(e) | Self::Commit(e) | Self::Rollback(e) | Self::Operation(e) => Some(e)
        }
    }
}

impl<E> TransactionError<E> {
    /// Check if this is a begin error.
    pub const fn is_begin(&self) -> bool {
        matches!(self, Self::Begin(_))
    }

    /// Check if this is a commit error.
    pub const fn is_commit(&self) -> bool {
        matches!(self, Self::Commit(_))
    }

    /// Check if this is a rollback error.
    pub const fn is_rollback(&self) -> bool {
        matches!(self, Self::Rollback(_))
    }

    /// Check if this is an operation error.
    pub const fn is_operation(&self) -> bool {
        matches!(self, Self::Operation(_))
    }

    /// Get the inner error.
    pub fn into_inner(self) -> E {
        match self {
            Self::Begin(e) | Self::Commit(e) | Self::Rollback(e) | Self::Operation(e) => e
        }
    }

    /// Get a reference to the inner error.
    pub const fn inner(&self) -> &E {
        match self {
            Self::Begin(e) | Self::Commit(e) | Self::Rollback(e) | Self::Operation(e) => e
        }
    }
}
