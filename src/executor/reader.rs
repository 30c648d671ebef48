// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Result sets and the forward-only reader.

use std::{collections::VecDeque, sync::Arc};

use crate::{
    entity::Entity,
    error::Result,
    provider::Connection,
    value::{FromValue, Value}
};

/// One row of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values:  Vec<Value>
}

impl Row {
    /// Column names shared with the owning set.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at an ordinal.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column named `column`.
    ///
    /// Exact matches win over case-insensitive ones.
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
            })?;
        self.values.get(index)
    }

    /// Convert the value of a column.
    pub fn try_get<T: FromValue>(&self, column: &str) -> Result<T> {
        T::from_nullable(self.get(column).cloned().unwrap_or_default())
    }
}

/// Materialized result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows:    Vec<Row>
}

impl ResultSet {
    /// Build a set from column names and row values.
    ///
    /// Short rows are padded with NULL.
    pub fn new<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        let columns: Arc<[String]> = columns.into_iter().map(Into::into).collect();
        let rows = rows
            .into_iter()
            .map(|mut values| {
                values.resize(columns.len(), Value::Null);
                Row {
                    columns: Arc::clone(&columns),
                    values
                }
            })
            .collect();
        Self {
            columns,
            rows
        }
    }

    /// Single-cell set, the shape of scalar results.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::new([""], vec![vec![value.into()]])
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, NULL when absent.
    pub fn first_value(&self) -> Value {
        self.rows
            .first()
            .and_then(|r| r.value(0))
            .cloned()
            .unwrap_or_default()
    }

    /// Materialize every row as `T`.
    pub fn read<T: Entity + Default>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(T::from_row).collect()
    }
}

/// Forward-only reader over the result sets of one command.
///
/// The reader owns the connection that produced it; dropping the reader
/// releases the connection. Readers created inside a transaction borrow
/// nothing and own no connection.
pub struct DataReader {
    current:    Option<ResultSet>,
    pending:    VecDeque<ResultSet>,
    connection: Option<Box<dyn Connection>>
}

impl std::fmt::Debug for DataReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("current", &self.current)
            .field("pending", &self.pending.len())
            .field("owns_connection", &self.connection.is_some())
            .finish()
    }
}

impl DataReader {
    pub(crate) fn new(sets: Vec<ResultSet>, connection: Option<Box<dyn Connection>>) -> Self {
        let mut pending: VecDeque<ResultSet> = sets.into();
        Self {
            current: pending.pop_front(),
            pending,
            connection
        }
    }

    /// Current result set, if any.
    pub fn current(&self) -> Option<&ResultSet> {
        self.current.as_ref()
    }

    /// Rows of the current set.
    pub fn rows(&self) -> &[Row] {
        self.current.as_ref().map(ResultSet::rows).unwrap_or(&[])
    }

    /// Advance to the next result set. Returns `false` when exhausted.
    pub fn next_result(&mut self) -> bool {
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    /// Materialize the current set as `T`.
    pub fn read<T: Entity + Default>(&self) -> Result<Vec<T>> {
        match &self.current {
            Some(set) => set.read(),
            None => Ok(Vec::new())
        }
    }

    /// First row of the current set as `T`.
    pub fn read_first<T: Entity + Default>(&self) -> Result<Option<T>> {
        self.rows().first().map(T::from_row).transpose()
    }

    /// First column of the first row of the current set.
    pub fn scalar(&self) -> Value {
        self.current
            .as_ref()
            .map(ResultSet::first_value)
            .unwrap_or_default()
    }

    /// Take the current set and every set after it.
    pub fn into_sets(mut self) -> Vec<ResultSet> {
        let mut sets: Vec<ResultSet> = self.current.take().into_iter().collect();
        sets.extend(self.pending.drain(..));
        sets
    }

    /// Release the owned connection early.
    pub fn close(&mut self) {
        self.connection = None;
    }

    /// Check if this reader still owns a connection.
    pub fn owns_connection(&self) -> bool {
        self.connection.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Article;

    fn articles() -> ResultSet {
        ResultSet::new(
            ["Id", "Title", "Name"],
            vec![
                vec![Value::I32(1), "first".into(), Value::Null],
                vec![Value::I64(2), "second".into(), "bob".into()]
            ]
        )
    }

    #[test]
    fn rows_materialize_entities() {
        let list: Vec<Article> = articles().read().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "first");
        assert_eq!(list[0].name, None);
        assert_eq!(list[1].id, 2);
        assert_eq!(list[1].name.as_deref(), Some("bob"));
    }

    #[test]
    fn column_lookup_falls_back_to_case_insensitive() {
        let set = articles();
        let row = &set.rows()[0];
        assert_eq!(row.get("title"), Some(&Value::String("first".into())));
        assert_eq!(row.try_get::<i32>("ID").unwrap(), 1);
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn reader_walks_result_sets() {
        let mut reader = DataReader::new(vec![articles(), ResultSet::scalar(9_i64)], None);
        assert_eq!(reader.rows().len(), 2);
        assert_eq!(reader.read_first::<Article>().unwrap().map(|a| a.id), Some(1));
        assert!(reader.next_result());
        assert_eq!(reader.scalar(), Value::I64(9));
        assert!(!reader.next_result());
        assert_eq!(reader.scalar(), Value::Null);
        assert!(reader.read::<Article>().unwrap().is_empty());
    }

    #[test]
    fn short_rows_are_padded() {
        let set = ResultSet::new(["A", "B"], vec![vec![Value::I32(1)]]);
        assert_eq!(set.rows()[0].value(1), Some(&Value::Null));
    }
}
