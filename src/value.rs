// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Database values and conversions.
//!
//! [`Value`] is the single currency between entities, compiled expressions,
//! bound parameters and result rows. [`ValueKind`] describes the declared
//! type of a property and drives `CAST` target lookup and identity widening.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Declared storage type of a property or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Boolean.
    Bool,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 64-bit float.
    F64,
    /// Text.
    String,
    /// Binary.
    Bytes,
    /// UUID.
    Uuid,
    /// UTC timestamp.
    DateTime
}

impl ValueKind {
    /// Rust-facing type name, used in error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::String => "String",
            Self::Bytes => "Vec<u8>",
            Self::Uuid => "Uuid",
            Self::DateTime => "DateTime<Utc>"
        }
    }

    /// Check if values of this kind are integers.
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::I16 | Self::I32 | Self::I64)
    }
}

/// A single database value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 16-bit integer.
    I16(i16),
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// Float.
    F64(f64),
    /// Text.
    String(String),
    /// Binary.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Enumeration discriminant with its declared underlying integer type.
    ///
    /// Widened to that type by [`Value::widen`] before binding.
    Enum {
        /// Discriminant.
        value:      i64,
        /// Declared underlying type.
        underlying: ValueKind
    }
}

impl Value {
    /// Build an enumeration value.
    ///
    /// ```rust
    /// use entity_data::{Value, ValueKind};
    ///
    /// #[repr(i16)]
    /// enum Status {
    ///     Draft = 0,
    ///     Published = 1
    /// }
    ///
    /// let v = Value::enumeration(Status::Published as i64, ValueKind::I16);
    /// assert_eq!(v.widen(), Value::I16(1));
    /// ```
    pub const fn enumeration(value: i64, underlying: ValueKind) -> Self {
        Self::Enum {
            value,
            underlying
        }
    }

    /// Check if this is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this is a number below zero.
    pub fn is_negative(&self) -> bool {
        match self {
            Self::I16(v) => *v < 0,
            Self::I32(v) => *v < 0,
            Self::I64(v)
            | Self::Enum {
                value: v, ..
            } => *v < 0,
            Self::F64(v) => v.is_sign_negative() && *v != 0.0,
            _ => false
        }
    }

    /// Replace enumeration values by their underlying integer.
    ///
    /// Non-integer underlying kinds fall back to `I64`.
    pub fn widen(self) -> Self {
        match self {
            Self::Enum {
                value,
                underlying
            } => match underlying {
                ValueKind::I16 => i16::try_from(value).map_or(Self::I64(value), Self::I16),
                ValueKind::I32 => i32::try_from(value).map_or(Self::I64(value), Self::I32),
                _ => Self::I64(value)
            },
            other => other
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::I16(v) => format!("i16 {v}"),
            Self::I32(v) => format!("i32 {v}"),
            Self::I64(v) => format!("i64 {v}"),
            Self::F64(v) => format!("f64 {v}"),
            Self::String(_) => "string".to_string(),
            Self::Bytes(b) => format!("{} bytes", b.len()),
            Self::Uuid(_) => "uuid".to_string(),
            Self::DateTime(_) => "timestamp".to_string(),
            Self::Enum {
                value, ..
            } => format!("enum {value}")
        }
    }

    /// Integer view of numeric values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I16(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            Self::Enum {
                value, ..
            } => Some(*value),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::String(s) => s.trim().parse().ok(),
            _ => None
        }
    }

    /// Convert into the declared kind, widening or narrowing integers.
    ///
    /// Used to write database-generated identity values back into a model.
    pub fn convert(self, kind: ValueKind) -> Result<Self> {
        if self.is_null() {
            return Ok(Self::Null);
        }
        let converted = match kind {
            ValueKind::I16 => self
                .as_i64()
                .and_then(|v| i16::try_from(v).ok())
                .map(Self::I16),
            ValueKind::I32 => self
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::I32),
            ValueKind::I64 => self.as_i64().map(Self::I64),
            ValueKind::F64 => f64::from_value(self.clone()).ok().map(Self::F64),
            ValueKind::Bool => bool::from_value(self.clone()).ok().map(Self::Bool),
            ValueKind::String => String::from_value(self.clone()).ok().map(Self::String),
            ValueKind::Uuid => Uuid::from_value(self.clone()).ok().map(Self::Uuid),
            ValueKind::DateTime => DateTime::<Utc>::from_value(self.clone())
                .ok()
                .map(Self::DateTime),
            ValueKind::Bytes => match &self {
                Self::Bytes(b) => Some(Self::Bytes(b.clone())),
                _ => None
            }
        };
        converted.ok_or_else(|| Error::Conversion {
            expected: kind.name(),
            found:    self.describe()
        })
    }

    /// Build a value from JSON, as produced by serializing a parameter
    /// object.
    ///
    /// Arrays and objects are stored as their JSON text.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::I64)
                .or_else(|| n.as_f64().map(Self::F64))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            other => Self::String(other.to_string())
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f64 => F64,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    DateTime<Utc> => DateTime
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::I16(i16::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::I32(i32::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::I64(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F64(f64::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a database value.
///
/// [`FromValue::from_null`] decides what NULL becomes. Aggregates use it to
/// default to zero or empty.
pub trait FromValue: Sized {
    /// Convert a non-NULL value.
    fn from_value(value: Value) -> Result<Self>;

    /// Value used for NULL. Errors by default.
    fn from_null() -> Result<Self> {
        Err(Error::Conversion {
            expected: std::any::type_name::<Self>(),
            found:    "NULL".to_string()
        })
    }

    /// Convert any value, routing NULL through [`FromValue::from_null`].
    fn from_nullable(value: Value) -> Result<Self> {
        if value.is_null() {
            Self::from_null()
        } else {
            Self::from_value(value)
        }
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::Conversion {
        expected: std::any::type_name::<T>(),
        found:    value.describe()
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    value
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| mismatch::<$ty>(&value))
                }

                fn from_null() -> Result<Self> {
                    Ok(0)
                }
            }
        )*
    };
}

int_from_value!(i16, i32, i64, u32, u64, usize);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::F64(v) => Ok(v),
            Value::String(ref s) => s.trim().parse().map_err(|_| mismatch::<f64>(&value)),
            ref other => other
                .as_i64()
                .map(|v| v as f64)
                .ok_or_else(|| mismatch::<f64>(&value))
        }
    }

    fn from_null() -> Result<Self> {
        Ok(0.0)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            ref other => other
                .as_i64()
                .map(|v| v != 0)
                .ok_or_else(|| mismatch::<bool>(&value))
        }
    }

    fn from_null() -> Result<Self> {
        Ok(false)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            Value::Uuid(u) => Ok(u.to_string()),
            Value::DateTime(d) => Ok(d.to_rfc3339()),
            Value::I16(v) => Ok(v.to_string()),
            Value::I32(v) => Ok(v.to_string()),
            Value::I64(v) => Ok(v.to_string()),
            Value::F64(v) => Ok(v.to_string()),
            Value::Bool(v) => Ok(v.to_string()),
            other => Err(mismatch::<String>(&other))
        }
    }

    fn from_null() -> Result<Self> {
        Ok(String::new())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch::<Vec<u8>>(&other))
        }
    }

    fn from_null() -> Result<Self> {
        Ok(Vec::new())
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::String(ref s) => Uuid::parse_str(s).map_err(|_| mismatch::<Uuid>(&value)),
            other => Err(mismatch::<Uuid>(&other))
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(d) => Ok(d),
            Value::String(ref s) => DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| mismatch::<DateTime<Utc>>(&value)),
            other => Err(mismatch::<DateTime<Utc>>(&other))
        }
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }

    fn from_null() -> Result<Self> {
        Ok(Value::Null)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Some)
    }

    fn from_null() -> Result<Self> {
        Ok(None)
    }
}
