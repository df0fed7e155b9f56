//! Transactional in-memory backend for relcascade.
//!
//! [`MemoryDb`] implements [`Connection`](relcascade_query::Connection) over
//! plain row vectors. Each transaction works on a private copy of every
//! table and holds the database lock until it ends, so transactions are
//! fully serialized; commit publishes the copy, rollback or drop discards it.
//!
//! It also keeps a log of the SQL each statement renders to and can inject
//! storage failures, which makes it the backend of choice for exercising
//! cascades and rollback paths in tests.

pub mod db;
pub mod table;

pub use db::{MemoryDb, MemoryTransaction, StatementKind};
pub use table::MemTable;
