//! Statement builders for SELECT, INSERT, UPDATE and DELETE.
//!
//! Statements are plain data handed to a [`Transaction`](crate::Transaction).
//! SQL backends render them with `build_with_dialect`; in-process backends
//! evaluate the filter directly.

use relcascade_core::Value;

use crate::expr::{Dialect, Expr};

/// SELECT query.
///
/// # Example
///
/// ```
/// use relcascade_query::{Expr, Select};
///
/// let (sql, params) = Select::from_table("ORDER_LINES")
///     .columns(["id", "order_id"])
///     .filter(Expr::col("order_id").in_list([1i64, 2]))
///     .build();
/// assert_eq!(
///     sql,
///     "SELECT id, order_id FROM ORDER_LINES WHERE \"order_id\" IN ($1, $2)"
/// );
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Table to read.
    pub table: String,
    /// Selected columns; empty selects every column.
    pub columns: Vec<String>,
    /// Row filter.
    pub filter: Expr,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl Select {
    /// Select every row of `table`.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: Expr::True,
            limit: None,
        }
    }

    /// Restrict the selected columns.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a WHERE condition (ANDed with any existing one).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = std::mem::replace(&mut self.filter, Expr::True).and(expr);
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build the SELECT SQL and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the SELECT SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let cols = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", cols, self.table);
        let mut params = Vec::new();
        if self.filter != Expr::True {
            let (where_sql, where_params) = self.filter.build_with_dialect(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, params)
    }
}

/// INSERT of a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// Target table.
    pub table: String,
    /// Column values in insertion order.
    pub values: Vec<(String, Value)>,
}

impl Insert {
    /// Insert into `table`.
    pub fn into_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Add a column value.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Build the INSERT SQL and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the INSERT SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        if self.values.is_empty() {
            return (format!("INSERT INTO {} DEFAULT VALUES", self.table), Vec::new());
        }
        let columns: Vec<&str> = self.values.iter().map(|(c, _)| c.as_str()).collect();
        let placeholders: Vec<String> = (1..=self.values.len())
            .map(|i| dialect.placeholder(i))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, self.values.iter().map(|(_, v)| v.clone()).collect())
    }
}

/// UPDATE with explicit SET pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// Target table.
    pub table: String,
    /// Columns to set.
    pub values: Vec<(String, Value)>,
    /// Row filter.
    pub filter: Expr,
}

impl Update {
    /// Update rows of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
            filter: Expr::True,
        }
    }

    /// Set a column to a specific value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = std::mem::replace(&mut self.filter, Expr::True).and(expr);
        self
    }

    /// Build the UPDATE SQL and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the UPDATE SQL and parameters with specific dialect.
    ///
    /// Nothing to set yields empty SQL.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        if self.values.is_empty() {
            return (String::new(), Vec::new());
        }
        let mut params = Vec::new();
        let mut set_clauses = Vec::new();
        for (column, value) in &self.values {
            set_clauses.push(format!(
                "{} = {}",
                column,
                dialect.placeholder(params.len() + 1)
            ));
            params.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, set_clauses.join(", "));
        if self.filter != Expr::True {
            let (where_sql, where_params) = self.filter.build_with_dialect(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }
        (sql, params)
    }
}

/// DELETE by filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// Target table.
    pub table: String,
    /// Row filter.
    pub filter: Expr,
}

impl Delete {
    /// Delete rows of `table`.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Expr::True,
        }
    }

    /// Add a WHERE condition.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = std::mem::replace(&mut self.filter, Expr::True).and(expr);
        self
    }

    /// Build the DELETE SQL and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the DELETE SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut params = Vec::new();
        if self.filter != Expr::True {
            let (where_sql, where_params) = self.filter.build_with_dialect(dialect, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params = where_params;
        }
        (sql, params)
    }
}
