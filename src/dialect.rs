// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! SQL dialect contract.
//!
//! A dialect is a process-wide singleton, shared behind `Arc<dyn
//! SqlHelper>`. Only the methods without a default body are mandatory;
//! the defaults produce ANSI-style SQL.
//!
//! | Concern | Method |
//! |---------|--------|
//! | Identifier quoting | [`quote`](SqlHelper::quote), [`qualify`](SqlHelper::qualify) |
//! | Parameter tokens | [`parameter`](SqlHelper::parameter), [`parameter_prefix`](SqlHelper::parameter_prefix) |
//! | Literal escaping | [`escape`](SqlHelper::escape) |
//! | LIKE escape clause | [`like_escape`](SqlHelper::like_escape) |
//! | Statement separator | [`terminator`](SqlHelper::terminator) |
//! | Last identity | [`identity`](SqlHelper::identity) |
//! | Paging | [`limit`](SqlHelper::limit) |
//! | CAST targets | [`type_name`](SqlHelper::type_name) |

use std::fmt::Write;

use crate::{
    error::{Error, Result},
    value::{Value, ValueKind}
};

/// Prefix placeholder written in front of every generated table name.
pub const PREFIX_PLACEHOLDER: &str = "$pre:";

/// Dialect helper.
pub trait SqlHelper: Send + Sync {
    /// Quote a single identifier.
    fn quote(&self, identifier: &str) -> String;

    /// Character (or string) that starts a parameter token, e.g. `@`.
    fn parameter_prefix(&self) -> &str;

    /// Quote an identifier with an optional qualifier (schema or alias).
    fn qualify(&self, identifier: &str, qualifier: Option<&str>) -> String {
        match qualifier {
            Some(q) => format!("{q}.{}", self.quote(identifier)),
            None => self.quote(identifier)
        }
    }

    /// Quoted table name carrying the prefix placeholder.
    fn table(&self, table: &str) -> String {
        self.quote(&format!("{PREFIX_PLACEHOLDER}{table}"))
    }

    /// Parameter token for a parameter name.
    fn parameter(&self, name: &str) -> String {
        format!("{}{name}", self.parameter_prefix())
    }

    /// Statement terminator.
    fn terminator(&self) -> &str {
        ";"
    }

    /// Boolean literal.
    fn boolean(&self, value: bool) -> &'static str {
        if value { "TRUE" } else { "FALSE" }
    }

    /// Statement fragment returning the last generated identity value.
    fn identity(&self) -> &str {
        "SELECT LAST_INSERT_ID()"
    }

    /// Name of the string length function.
    fn length_function(&self) -> &str {
        "LENGTH"
    }

    /// Paging clause appended after ORDER BY.
    fn limit(&self, size: usize, offset: Option<usize>) -> String {
        match offset {
            Some(offset) => format!("LIMIT {size} OFFSET {offset}"),
            None => format!("LIMIT {size}")
        }
    }

    /// SQL type used as CAST target. `None` means the kind is not castable.
    fn type_name(&self, kind: ValueKind) -> Option<&str> {
        match kind {
            ValueKind::Bool => Some("BOOLEAN"),
            ValueKind::I16 => Some("SMALLINT"),
            ValueKind::I32 => Some("INT"),
            ValueKind::I64 => Some("BIGINT"),
            ValueKind::F64 => Some("DOUBLE PRECISION"),
            ValueKind::String => Some("VARCHAR(4000)"),
            ValueKind::DateTime => Some("TIMESTAMP"),
            ValueKind::Bytes | ValueKind::Uuid => None
        }
    }

    /// `ESCAPE` clause written after a LIKE pattern built from escaped
    /// text. Must declare the character used by [`escape_like`].
    ///
    /// [`escape_like`]: crate::compiler::escape_like
    fn like_escape(&self) -> &str {
        " ESCAPE '\\'"
    }

    /// Escape a value as an SQL literal.
    fn escape(&self, value: &Value) -> Result<String> {
        escape_literal(self, value)
    }
}

/// Default literal escaping.
///
/// Strings double embedded single quotes; binary becomes a hex literal.
/// Non-finite floats have no literal form and are rejected.
pub fn escape_literal<H: SqlHelper + ?Sized>(helper: &H, value: &Value) -> Result<String> {
    let literal = match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => helper.boolean(*b).to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F64(v) if v.is_finite() => v.to_string(),
        Value::F64(v) => {
            return Err(Error::argument(
                "value",
                format!("float {v} has no SQL literal")
            ));
        }
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
        Value::Uuid(u) => format!("'{u}'"),
        Value::DateTime(d) => format!("'{}'", d.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::Enum {
            value, ..
        } => value.to_string()
    };
    Ok(literal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDialect;

    #[test]
    fn qualify_prefixes_alias() {
        let d = TestDialect;
        assert_eq!(d.qualify("Id", Some("a")), "a.[Id]");
        assert_eq!(d.qualify("Id", None), "[Id]");
    }

    #[test]
    fn table_carries_prefix_placeholder() {
        assert_eq!(TestDialect.table("Articles"), "[$pre:Articles]");
    }

    fn literal(value: Value) -> String {
        TestDialect.escape(&value).unwrap()
    }

    #[test]
    fn escape_doubles_quotes() {
        assert_eq!(literal(Value::String("O'Hara".into())), "'O''Hara'");
        assert_eq!(literal(Value::Null), "NULL");
        assert_eq!(literal(Value::Bool(true)), "TRUE");
        assert_eq!(literal(Value::Bytes(vec![0xAB, 0x01])), "X'AB01'");
        assert_eq!(literal(Value::F64(-1.5)), "-1.5");
    }

    #[test]
    fn escape_rejects_non_finite_floats() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = TestDialect.escape(&Value::F64(v)).unwrap_err();
            assert!(err.is_argument());
        }
    }

    #[test]
    fn default_like_escape_names_backslash() {
        assert_eq!(TestDialect.like_escape(), " ESCAPE '\\'");
    }

    #[test]
    fn default_limit_clause() {
        assert_eq!(TestDialect.limit(10, Some(20)), "LIMIT 10 OFFSET 20");
        assert_eq!(TestDialect.limit(1, None), "LIMIT 1");
    }
}
