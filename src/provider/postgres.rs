// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! PostgreSQL adapter over `sqlx::PgPool`.
//!
//! Commands arrive with `@name` tokens and possibly several statements
//! separated by `;`. Each statement is sent on its own with its tokens
//! rewritten to `$1`, `$2`, ... in first-use order. Quoted literals and
//! identifiers are left untouched.
//!
//! A connection with an open transaction that is dropped is closed instead
//! of returned to the pool, so the server rolls the transaction back.
//!
//! ```rust,ignore
//! let pool = PgPool::connect(&url).await?;
//! let db = Database::new(PgConnectionFactory::new(pool), PgHelper, DataOptions::from_env()?);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sqlx::{
    Column, Encode, Postgres, Row as _, Type, TypeInfo,
    encode::IsNull,
    error::BoxDynError,
    pool::PoolConnection,
    postgres::{PgArgumentBuffer, PgArguments, PgPool, PgRow, PgTypeInfo, types::Oid},
    query::Query
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    dialect::SqlHelper,
    executor::ResultSet,
    provider::{Command, Connection, ConnectionFactory, ProviderError},
    value::{Value, ValueKind}
};

const TOKEN: char = '@';

/// PostgreSQL dialect: `"name"` quoting, `@name` tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgHelper;

impl SqlHelper for PgHelper {
    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    fn parameter_prefix(&self) -> &str {
        "@"
    }

    fn identity(&self) -> &str {
        "SELECT lastval()"
    }

    fn type_name(&self, kind: ValueKind) -> Option<&str> {
        match kind {
            ValueKind::Bool => Some("BOOLEAN"),
            ValueKind::I16 => Some("SMALLINT"),
            ValueKind::I32 => Some("INTEGER"),
            ValueKind::I64 => Some("BIGINT"),
            ValueKind::F64 => Some("DOUBLE PRECISION"),
            ValueKind::String => Some("TEXT"),
            ValueKind::Bytes => Some("BYTEA"),
            ValueKind::Uuid => Some("UUID"),
            ValueKind::DateTime => Some("TIMESTAMPTZ")
        }
    }
}

/// Connection factory checking connections out of a pool.
#[derive(Debug, Clone)]
pub struct PgConnectionFactory {
    pool: PgPool
}

impl PgConnectionFactory {
    /// Wrap a pool.
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool
        }
    }

    /// Underlying pool.
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn open(&self) -> Result<Box<dyn Connection>, ProviderError> {
        let connection = self
            .pool
            .acquire()
            .await
            .map_err(ProviderError::from_source)?;
        Ok(Box::new(PgConnection {
            connection,
            in_transaction: false
        }))
    }
}

struct PgConnection {
    connection:     PoolConnection<Postgres>,
    in_transaction: bool
}

impl PgConnection {
    async fn control(&mut self, statement: &str) -> Result<(), ProviderError> {
        debug!(statement, "postgres transaction control");
        sqlx::query(statement)
            .execute(&mut *self.connection)
            .await
            .map_err(ProviderError::from_source)?;
        Ok(())
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        if self.in_transaction {
            self.connection.close_on_drop();
        }
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn execute(&mut self, command: &Command) -> Result<u64, ProviderError> {
        let mut affected = 0;
        for statement in split_statements(&command.text) {
            let (sql, values) = positional(statement, &command.parameters)?;
            let result = bind_all(sqlx::query(&sql), values)
                .execute(&mut *self.connection)
                .await
                .map_err(ProviderError::from_source)?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn query(&mut self, command: &Command) -> Result<Vec<ResultSet>, ProviderError> {
        let mut sets = Vec::new();
        for statement in split_statements(&command.text) {
            let (sql, values) = positional(statement, &command.parameters)?;
            let query = bind_all(sqlx::query(&sql), values);
            if returns_rows(statement) {
                let rows = query
                    .fetch_all(&mut *self.connection)
                    .await
                    .map_err(ProviderError::from_source)?;
                sets.push(result_set(&rows)?);
            } else {
                query
                    .execute(&mut *self.connection)
                    .await
                    .map_err(ProviderError::from_source)?;
            }
        }
        Ok(sets)
    }

    async fn begin(&mut self) -> Result<(), ProviderError> {
        self.control("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ProviderError> {
        self.control("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ProviderError> {
        self.control("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }
}

/// Split on `;` outside quotes, dropping empty statements.
fn split_statements(text: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ';') => {
                statements.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&text[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Rewrite `@name` tokens to `$n` and collect the values in `$n` order.
fn positional(
    statement: &str,
    parameters: &[(String, Value)]
) -> Result<(String, Vec<Value>), ProviderError> {
    let mut sql = String::with_capacity(statement.len());
    let mut order: Vec<&str> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = statement.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (None, '\'' | '"') => {
                quote = Some(c);
                sql.push(c);
            }
            (Some(q), c) if c == q => {
                quote = None;
                sql.push(c);
            }
            (None, TOKEN) => {
                let begin = i + c.len_utf8();
                let mut end = begin;
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let name = &statement[begin..end];
                if name.is_empty() {
                    sql.push(c);
                    continue;
                }
                let index = match order.iter().position(|n| *n == name) {
                    Some(index) => index,
                    None => {
                        order.push(name);
                        order.len() - 1
                    }
                };
                sql.push('$');
                sql.push_str(&(index + 1).to_string());
            }
            _ => sql.push(c)
        }
    }

    let values = order
        .into_iter()
        .map(|name| {
            parameters
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone().widen())
                .ok_or_else(|| ProviderError::new(format!("no value for parameter `{name}`")))
        })
        .collect::<Result<_, _>>()?;
    Ok((sql, values))
}

fn returns_rows(statement: &str) -> bool {
    let head = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(head.as_str(), "SELECT" | "WITH" | "VALUES" | "SHOW" | "TABLE")
        || statement.to_ascii_uppercase().contains(" RETURNING ")
}

/// NULL parameter declared with OID 0, so the server infers its type from
/// the statement instead of rejecting a text NULL for a non-text column.
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: Vec<Value>
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            Value::Null => query.bind(UntypedNull),
            Value::Bool(v) => query.bind(v),
            Value::I16(v) => query.bind(v),
            Value::I32(v) => query.bind(v),
            Value::I64(v) => query.bind(v),
            Value::F64(v) => query.bind(v),
            Value::String(v) => query.bind(v),
            Value::Bytes(v) => query.bind(v),
            Value::Uuid(v) => query.bind(v),
            Value::DateTime(v) => query.bind(v),
            enumeration @ Value::Enum {
                ..
            } => match enumeration.widen() {
                Value::I16(v) => query.bind(v),
                Value::I32(v) => query.bind(v),
                other => query.bind(other.as_i64())
            }
        };
    }
    query
}

fn result_set(rows: &[PgRow]) -> Result<ResultSet, ProviderError> {
    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };
    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let values = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| cell(row, i))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResultSet::new(columns, values))
}

fn cell(row: &PgRow, index: usize) -> Result<Value, ProviderError> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();
    let decoded = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(Into::into),
        "INT2" => row.try_get::<Option<i16>, _>(index).map(Into::into),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(Into::into),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(Into::into),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(f64::from).into()),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(Into::into),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(index)
            .map(|v| v.map_or(Value::Null, numeric)),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index).map(Into::into)
        }
        "UUID" => row.try_get::<Option<Uuid>, _>(index).map(Into::into),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index).map(Into::into),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(Into::into),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|d| d.and_utc()).into()),
        other => {
            return Err(ProviderError::new(format!(
                "column `{}` has unsupported type {other}",
                column.name()
            )));
        }
    };
    decoded.map_err(ProviderError::from_source)
}

/// Whole numbers within `i64` stay integral so `SUM` over integer columns
/// reads back as an integer; the rest become floats.
fn numeric(decimal: Decimal) -> Value {
    if decimal.fract().is_zero()
        && let Some(v) = decimal.to_i64()
    {
        return Value::I64(v);
    }
    decimal
        .to_f64()
        .map_or_else(|| Value::String(decimal.to_string()), Value::F64)
}
