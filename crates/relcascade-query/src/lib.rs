//! Filters, composite key sets and statements for relcascade.
//!
//! `relcascade-query` is the persistence vocabulary of the workspace:
//!
//! - [`Expr`] filter expressions, rendered per [`Dialect`] or evaluated
//!   against rows in-process.
//! - [`KeySet`] turns parent key tuples into compact child-table filters,
//!   grouping composite keys by shared prefix.
//! - [`Select`], [`Insert`], [`Update`] and [`Delete`] statements.
//! - The [`Connection`] / [`Transaction`] traits backends implement.

pub mod builder;
pub mod connection;
pub mod expr;
pub mod key_set;

pub use builder::{Delete, Insert, Select, Update};
pub use connection::{Connection, Transaction};
pub use expr::{Column, Dialect, Expr};
pub use key_set::{KeySet, KeySetError};
