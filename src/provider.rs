// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Provider-agnostic connection contract.
//!
//! The executor never talks to a driver directly. A driver is plugged in by
//! implementing [`ConnectionFactory`] and [`Connection`]; pooling, wire
//! protocol and statement preparation stay inside the driver.
//!
//! # Contract
//!
//! - [`Connection::query`] returns every result set produced by the command
//!   text, in order. Multi-statement commands (page rows followed by a total
//!   count) must yield one [`ResultSet`] per row-returning statement; a
//!   statement returning no rows may add an empty set or none.
//! - Parameter tokens in [`Command::text`] are the dialect's tokens; the
//!   driver resolves them by name against [`Command::parameters`].
//! - `begin`/`commit`/`rollback` operate on the connection they are called
//!   on. Dropping a connection with an open transaction must roll it back.

#[cfg(feature = "postgres")]
pub mod postgres;

use std::{error::Error as StdError, fmt, sync::Arc};

use async_trait::async_trait;

use crate::{executor::ResultSet, value::Value};

/// Opaque driver failure.
#[derive(Debug, Clone)]
pub struct ProviderError {
    message: String,
    source:  Option<Arc<dyn StdError + Send + Sync>>
}

impl ProviderError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source:  None
        }
    }

    /// Wrap a driver error.
    pub fn from_source<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static
    {
        Self {
            message: error.to_string(),
            source:  Some(Arc::new(error))
        }
    }

    /// Driver message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ProviderError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Command text plus resolved parameter values.
///
/// One command object is reused for every statement of a transaction; it is
/// re-parameterized through [`Command::reset`] between calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// Final SQL text, prefix placeholders already substituted.
    pub text:       String,
    /// Parameter name (without token prefix) to value, declaration order.
    pub parameters: Vec<(String, Value)>
}

impl Command {
    /// Create a command.
    pub fn new(text: impl Into<String>, parameters: Vec<(String, Value)>) -> Self {
        Self {
            text: text.into(),
            parameters
        }
    }

    /// Replace text and parameters, keeping the allocation.
    pub fn reset(&mut self, text: &str, parameters: Vec<(String, Value)>) {
        self.text.clear();
        self.text.push_str(text);
        self.parameters = parameters;
    }

    /// Look up a parameter value by name.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// An open connection.
#[async_trait]
pub trait Connection: Send {
    /// Execute a command that returns no rows; yields affected row count.
    async fn execute(&mut self, command: &Command) -> Result<u64, ProviderError>;

    /// Execute a command and buffer every result set it produces.
    async fn query(&mut self, command: &Command) -> Result<Vec<ResultSet>, ProviderError>;

    /// Begin a transaction on this connection.
    async fn begin(&mut self) -> Result<(), ProviderError>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<(), ProviderError>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<(), ProviderError>;
}

/// Opens connections. Implementations usually wrap a driver pool.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open (or check out) a connection.
    async fn open(&self) -> Result<Box<dyn Connection>, ProviderError>;
}
