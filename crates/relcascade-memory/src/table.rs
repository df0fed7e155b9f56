//! One in-memory table.

use relcascade_core::{Result, Row, Schema, SqlType, StorageError, StorageErrorKind, Value};
use relcascade_query::{Delete, Insert, Select, Update};

/// Rows of one table plus its key metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MemTable {
    name: String,
    primary_key: Vec<String>,
    auto_increment: Option<String>,
    rows: Vec<Row>,
    next_id: i64,
}

impl MemTable {
    /// Empty table keyed like `schema`.
    ///
    /// A single integer primary key column is auto-incremented.
    pub fn for_schema(schema: &Schema) -> Self {
        let primary_key: Vec<String> = schema
            .primary_key_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        let auto_increment = match primary_key.as_slice() {
            [column] => schema
                .field(column)
                .filter(|f| matches!(f.sql_type, SqlType::Integer | SqlType::BigInt))
                .map(|_| column.clone()),
            _ => None,
        };
        Self {
            name: schema.table().to_string(),
            primary_key,
            auto_increment,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn select(&self, query: &Select) -> Vec<Row> {
        let matching = self.rows.iter().filter(|row| query.filter.matches(row));
        let limit = query.limit.unwrap_or(usize::MAX);
        matching
            .take(limit)
            .map(|row| {
                if query.columns.is_empty() {
                    row.clone()
                } else {
                    row.project(&query.columns)
                }
            })
            .collect()
    }

    pub(crate) fn insert(&mut self, stmt: &Insert) -> Result<Row> {
        let mut row: Row = stmt.values.iter().cloned().collect();
        if let Some(column) = &self.auto_increment {
            match row.get(column).and_then(Value::as_i64) {
                Some(id) if id != 0 => self.next_id = self.next_id.max(id + 1),
                _ => {
                    row.insert(column.clone(), Value::BigInt(self.next_id));
                    self.next_id += 1;
                }
            }
        }
        if !self.primary_key.is_empty() {
            let key = row.tuple(&self.primary_key);
            if key.iter().any(Value::is_null) {
                return Err(constraint(format!(
                    "NOT NULL constraint failed: {}.{}",
                    self.name,
                    self.primary_key.join(", ")
                )));
            }
            if self.rows.iter().any(|r| r.tuple(&self.primary_key) == key) {
                return Err(constraint(format!(
                    "UNIQUE constraint failed: {}.{}",
                    self.name,
                    self.primary_key.join(", ")
                )));
            }
        }
        self.rows.push(row.clone());
        Ok(row)
    }

    pub(crate) fn update(&mut self, stmt: &Update) -> u64 {
        if stmt.values.is_empty() {
            return 0;
        }
        let mut affected = 0;
        for row in self.rows.iter_mut().filter(|row| stmt.filter.matches(row)) {
            for (column, value) in &stmt.values {
                row.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
        affected
    }

    pub(crate) fn delete(&mut self, stmt: &Delete) -> u64 {
        let before = self.rows.len();
        self.rows.retain(|row| !stmt.filter.matches(row));
        (before - self.rows.len()) as u64
    }
}

fn constraint(message: String) -> relcascade_core::Error {
    StorageError::new(StorageErrorKind::Constraint, message).into()
}
