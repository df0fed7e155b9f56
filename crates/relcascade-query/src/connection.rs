//! Backend contract.
//!
//! The cascading engine only talks to storage through these two traits. All
//! work for one mutation request happens on a single [`Transaction`]; a
//! dropped transaction that was never committed must roll back.

use relcascade_core::{Result, Row};

use crate::builder::{Delete, Insert, Select, Update};

/// An open transaction.
///
/// Methods take `&mut self` so the engine can pass the transaction down the
/// cascade as `&mut dyn Transaction`.
pub trait Transaction {
    /// Run a SELECT and return the matching rows.
    fn select(&mut self, query: &Select) -> Result<Vec<Row>>;

    /// Insert one row and return it as stored, including generated keys.
    fn insert(&mut self, stmt: &Insert) -> Result<Row>;

    /// Run an UPDATE and return the number of rows affected.
    fn update(&mut self, stmt: &Update) -> Result<u64>;

    /// Run a DELETE and return the number of rows affected.
    fn delete(&mut self, stmt: &Delete) -> Result<u64>;

    /// Make every change visible.
    fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Discard every change.
    fn rollback(self) -> Result<()>
    where
        Self: Sized;
}

/// A connection able to open transactions.
pub trait Connection: Send + Sync {
    /// Transaction type handed out by [`begin`](Self::begin).
    type Tx<'c>: Transaction
    where
        Self: 'c;

    /// Open a new transaction.
    fn begin(&self) -> Result<Self::Tx<'_>>;
}
