//! The database handle and its transactions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relcascade_core::{
    Error, Result, Row, Schema, SchemaRegistry, SchemaProvider, StorageError, StorageErrorKind,
};
use relcascade_query::{Connection, Delete, Dialect, Insert, Select, Transaction, Update};

use crate::table::MemTable;

/// Statement category, used for fault injection and statement counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// SELECT
    Select,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    statements: Vec<String>,
    faults: Vec<(StatementKind, String)>,
    commits: usize,
    rollbacks: usize,
}

/// Shared handle to an in-memory database. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    state: Arc<Mutex<State>>,
}

impl MemoryDb {
    /// Empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Database with a table for every schema in `registry`.
    pub fn for_registry(registry: &SchemaRegistry) -> Self {
        let db = Self::new();
        for name in registry.type_names() {
            if let Some(schema) = registry.schema(name) {
                db.create_table(schema);
            }
        }
        db
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or reset) the table backing `schema`.
    pub fn create_table(&self, schema: &Schema) {
        let table = MemTable::for_schema(schema);
        self.lock().tables.insert(table.name().to_string(), table);
    }

    /// Insert a row outside any transaction; returns it as stored.
    pub fn seed(&self, table: &str, row: Row) -> Result<Row> {
        let mut stmt = Insert::into_table(table);
        stmt.values = row.iter().map(|(c, v)| (c.to_string(), v.clone())).collect();
        let mut state = self.lock();
        let target = state.tables.get_mut(table).ok_or_else(|| no_such_table(table))?;
        target.insert(&stmt)
    }

    /// Committed rows of `table`; empty for an unknown table.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows().to_vec())
            .unwrap_or_default()
    }

    /// Number of committed rows in `table`.
    pub fn count(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, |t| t.rows().len())
    }

    /// Copy of every committed table.
    pub fn snapshot(&self) -> BTreeMap<String, MemTable> {
        self.lock().tables.clone()
    }

    /// SQL of every statement executed so far, committed or not.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Number of logged statements of `kind`.
    pub fn statement_count(&self, kind: StatementKind) -> usize {
        let prefix = kind.to_string();
        self.lock()
            .statements
            .iter()
            .filter(|sql| sql.starts_with(&prefix))
            .count()
    }

    /// Forget the statement log.
    pub fn clear_statements(&self) {
        self.lock().statements.clear();
    }

    /// Make every `kind` statement on `table` fail until cleared.
    pub fn inject_fault(&self, kind: StatementKind, table: &str) {
        self.lock().faults.push((kind, table.to_string()));
    }

    /// Remove injected faults.
    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Committed transactions.
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    /// Rolled back (or dropped) transactions.
    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }
}

impl Connection for MemoryDb {
    type Tx<'c> = MemoryTransaction<'c>;

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        let state = self.lock();
        let working = state.tables.clone();
        tracing::trace!(target: "relcascade::memory", tables = working.len(), "transaction started");
        Ok(MemoryTransaction {
            state,
            working,
            finished: false,
        })
    }
}

/// A serialized transaction over a private copy of the tables.
pub struct MemoryTransaction<'c> {
    state: MutexGuard<'c, State>,
    working: BTreeMap<String, MemTable>,
    finished: bool,
}

impl fmt::Debug for MemoryTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("tables", &self.working.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl MemoryTransaction<'_> {
    /// Log the statement, apply injected faults and find the table.
    fn prepare(&mut self, kind: StatementKind, table: &str, sql: String) -> Result<&mut MemTable> {
        tracing::trace!(target: "relcascade::memory", sql = %sql, "statement");
        self.state.statements.push(sql);
        if self
            .state
            .faults
            .iter()
            .any(|(k, t)| *k == kind && t == table)
        {
            return Err(StorageError::new(
                StorageErrorKind::Query,
                format!("injected {kind} failure"),
            )
            .on_table(table)
            .into());
        }
        self.working.get_mut(table).ok_or_else(|| no_such_table(table))
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn select(&mut self, query: &Select) -> Result<Vec<Row>> {
        let sql = query.build_with_dialect(Dialect::Sqlite).0;
        let table = self.prepare(StatementKind::Select, &query.table, sql)?;
        Ok(table.select(query))
    }

    fn insert(&mut self, stmt: &Insert) -> Result<Row> {
        let sql = stmt.build_with_dialect(Dialect::Sqlite).0;
        let table = self.prepare(StatementKind::Insert, &stmt.table, sql)?;
        table.insert(stmt)
    }

    fn update(&mut self, stmt: &Update) -> Result<u64> {
        let sql = stmt.build_with_dialect(Dialect::Sqlite).0;
        let table = self.prepare(StatementKind::Update, &stmt.table, sql)?;
        Ok(table.update(stmt))
    }

    fn delete(&mut self, stmt: &Delete) -> Result<u64> {
        let sql = stmt.build_with_dialect(Dialect::Sqlite).0;
        let table = self.prepare(StatementKind::Delete, &stmt.table, sql)?;
        Ok(table.delete(stmt))
    }

    fn commit(mut self) -> Result<()> {
        self.state.tables = std::mem::take(&mut self.working);
        self.state.commits += 1;
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self) -> Result<()> {
        self.state.rollbacks += 1;
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.rollbacks += 1;
            tracing::debug!(target: "relcascade::memory", "uncommitted transaction discarded");
        }
    }
}

fn no_such_table(table: &str) -> Error {
    StorageError::new(StorageErrorKind::Query, format!("no such table: {table}"))
        .on_table(table)
        .into()
}
