// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Statement buffer shared by every generator.
//!
//! A [`SqlBuffer`] accumulates text and parameters while a statement is
//! being assembled. [`SqlBuffer::build`] freezes it into a [`SqlStatement`].
//!
//! # Parameters
//!
//! - Every parameter name is unique within one buffer; declaring a name
//!   twice is an error.
//! - Declaration order is preserved and equals the order in which
//!   parameters were added.
//! - Generated names are `p0`, `p1`, ... skipping names already declared.

use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    value::Value
};

const INDENT: &str = "    ";

/// Mutable statement under construction.
#[derive(Debug, Clone, Default)]
pub struct SqlBuffer {
    text:    String,
    indent:  usize,
    names:   Vec<String>,
    values:  IndexMap<String, Value>,
    counter: usize
}

impl SqlBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw text.
    pub fn push(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Append a single character.
    pub fn push_char(&mut self, c: char) -> &mut Self {
        self.text.push(c);
        self
    }

    /// Start a new line at the current indentation.
    pub fn line(&mut self) -> &mut Self {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        for _ in 0..self.indent {
            self.text.push_str(INDENT);
        }
        self
    }

    /// Increase indentation for following lines.
    pub fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    /// Decrease indentation for following lines.
    pub fn outdent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Append items separated by `separator`.
    pub fn push_joined<I, S>(&mut self, items: I, separator: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.text.push_str(separator);
            }
            self.text.push_str(item.as_ref());
        }
        self
    }

    /// Declare a parameter whose value is supplied at execution time.
    pub fn declare(&mut self, name: &str) -> Result<()> {
        if self.is_declared(name) {
            return Err(Error::argument(
                "name",
                format!("parameter `{name}` is already declared")
            ));
        }
        self.names.push(name.to_string());
        Ok(())
    }

    /// Declare a parameter together with its value.
    pub fn bind(&mut self, name: &str, value: Value) -> Result<()> {
        self.declare(name)?;
        self.values.insert(name.to_string(), value.widen());
        Ok(())
    }

    /// Bind a value under a generated name and return the name.
    pub fn bind_next(&mut self, value: Value) -> String {
        let name = self.next_name();
        self.names.push(name.clone());
        self.values.insert(name.clone(), value.widen());
        name
    }

    /// Next free generated name.
    pub fn next_name(&mut self) -> String {
        loop {
            let candidate = format!("p{}", self.counter);
            self.counter += 1;
            if !self.is_declared(&candidate) {
                return candidate;
            }
        }
    }

    /// Check if a parameter name is taken.
    pub fn is_declared(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Check if no text was written.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Declared parameter names in declaration order.
    pub fn parameters(&self) -> &[String] {
        &self.names
    }

    /// Bound values.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Freeze the buffer.
    pub fn build(self) -> SqlStatement {
        SqlStatement {
            text:       self.text,
            parameters: self.names,
            values:     self.values
        }
    }
}

/// Finished, immutable statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    text:       String,
    parameters: Vec<String>,
    values:     IndexMap<String, Value>
}

impl SqlStatement {
    /// Statement text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Declared parameter names in declaration order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Values bound while building.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Value bound for a parameter.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Resolve every declared parameter, in declaration order.
    ///
    /// Values bound at build time win; the rest come from `resolve`.
    pub fn resolve<F>(&self, mut resolve: F) -> Vec<(String, Value)>
    where
        F: FnMut(&str) -> Value
    {
        self.parameters
            .iter()
            .map(|name| {
                let value = match self.values.get(name) {
                    Some(v) => v.clone(),
                    None => resolve(name).widen()
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Bound values in declaration order.
    pub fn bound(&self) -> Vec<(String, Value)> {
        self.resolve(|_| Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_skip_declared() {
        let mut buf = SqlBuffer::new();
        buf.declare("p0").unwrap();
        assert_eq!(buf.bind_next(Value::I32(1)), "p1");
        assert_eq!(buf.bind_next(Value::I32(2)), "p2");
    }

    #[test]
    fn duplicate_declaration_fails() {
        let mut buf = SqlBuffer::new();
        buf.declare("Id").unwrap();
        assert!(buf.declare("Id").unwrap_err().is_argument());
    }

    #[test]
    fn declaration_order_is_preserved() {
        let mut buf = SqlBuffer::new();
        buf.declare("Title").unwrap();
        buf.bind("Id", Value::I32(3)).unwrap();
        buf.bind_next(Value::Bool(true));
        let stmt = buf.build();
        assert_eq!(stmt.parameters(), ["Title", "Id", "p0"]);
        let resolved = stmt.resolve(|name| Value::String(name.to_lowercase()));
        assert_eq!(
            resolved,
            vec![
                ("Title".to_string(), Value::String("title".into())),
                ("Id".to_string(), Value::I32(3)),
                ("p0".to_string(), Value::Bool(true))
            ]
        );
    }

    #[test]
    fn lines_follow_indentation() {
        let mut buf = SqlBuffer::new();
        buf.push("SELECT 1");
        buf.indent().line().push("FROM t");
        buf.outdent().line().push(";");
        assert_eq!(buf.text(), "SELECT 1\n    FROM t\n;");
    }

    #[test]
    fn bound_enum_is_widened() {
        let mut buf = SqlBuffer::new();
        let name = buf.bind_next(Value::enumeration(2, crate::ValueKind::I16));
        assert_eq!(buf.values()[&name], Value::I16(2));
    }
}
