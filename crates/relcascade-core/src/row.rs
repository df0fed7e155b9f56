//! Rows returned by backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A single result row: column name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Set a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    /// Value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Value of a column, NULL when absent.
    pub fn get_or_null(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Whether the row carries the column.
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Iterate columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only the given columns. Missing columns are left out.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Row {
        let values = columns
            .iter()
            .filter_map(|c| {
                self.values
                    .get_key_value(c.as_ref())
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect();
        Row { values }
    }

    /// Values for `columns` in order, NULL when absent.
    pub fn tuple<S: AsRef<str>>(&self, columns: &[S]) -> Vec<Value> {
        columns.iter().map(|c| self.get_or_null(c.as_ref())).collect()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Row {
            values: iter.into_iter().collect(),
        }
    }
}
