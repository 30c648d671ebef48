// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Parameter collections for raw SQL.
//!
//! Raw statements accept parameters as key/value pairs, maps, or any
//! `serde::Serialize` object wrapped in [`Object`]; the object's public
//! members become parameters named after the members.
//!
//! ```rust
//! use entity_data::executor::{IntoParameters, Object};
//!
//! #[derive(serde::Serialize)]
//! struct Filter {
//!     site: i32,
//!     name: &'static str
//! }
//!
//! let params = Object(&Filter { site: 1, name: "home" }).into_parameters().unwrap();
//! assert_eq!(params.len(), 2);
//! ```

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    value::Value
};

/// Ordered parameter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<(String, Value)>);

impl Parameters {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing an earlier one with the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Add or replace a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value))
        }
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Take the list with enumeration values widened to their underlying
    /// integer type.
    pub fn into_bound(self) -> Vec<(String, Value)> {
        self.0
            .into_iter()
            .map(|(n, v)| (n, v.widen()))
            .collect()
    }
}

impl From<Vec<(String, Value)>> for Parameters {
    fn from(list: Vec<(String, Value)>) -> Self {
        Self(list)
    }
}

/// Conversion into a parameter list.
pub trait IntoParameters {
    /// Convert, failing when the source cannot be flattened.
    fn into_parameters(self) -> Result<Parameters>;
}

impl IntoParameters for Parameters {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(self)
    }
}

impl IntoParameters for () {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(Parameters::new())
    }
}

impl<K: Into<String>, V: Into<Value>> IntoParameters for Vec<(K, V)> {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(collect(self))
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> IntoParameters for [(K, V); N] {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(collect(self))
    }
}

impl<K: Into<String>, V: Into<Value>, S> IntoParameters for HashMap<K, V, S> {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(collect(self))
    }
}

impl<K: Into<String>, V: Into<Value>> IntoParameters for BTreeMap<K, V> {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(collect(self))
    }
}

impl<K: Into<String>, V: Into<Value>, S> IntoParameters for IndexMap<K, V, S> {
    fn into_parameters(self) -> Result<Parameters> {
        Ok(collect(self))
    }
}

fn collect<I, K, V>(pairs: I) -> Parameters
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>
{
    let mut params = Parameters::new();
    for (k, v) in pairs {
        params.set(k, v);
    }
    params
}

/// Serializable object whose members become parameters.
#[derive(Debug, Clone, Copy)]
pub struct Object<'a, S: ?Sized>(pub &'a S);

impl<S: Serialize + ?Sized> IntoParameters for Object<'_, S> {
    fn into_parameters(self) -> Result<Parameters> {
        object_members(self.0, "parameters").map(collect)
    }
}

/// Flatten a serializable object into `(member, value)` pairs.
pub(crate) fn object_members<S: Serialize + ?Sized>(
    object: &S,
    argument: &'static str
) -> Result<Vec<(String, Value)>> {
    let json = serde_json::to_value(object)
        .map_err(|e| Error::argument(argument, format!("cannot serialize: {e}")))?;
    match json {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect()),
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(Error::argument(
            argument,
            format!("expected an object with named members, got {other}")
        ))
    }
}
