//! Core types for relcascade.
//!
//! `relcascade-core` is the **foundation layer** of the workspace. It defines
//! the metadata and data types every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Metadata**: `Schema`, `FieldInfo` and `RelationshipInfo` describe model
//!   types; `SchemaRegistry` validates them once and serves them through the
//!   `SchemaProvider` trait.
//! - **Data model**: `Instance`, `Row`, `Value` and `SqlType` carry object
//!   graphs and result rows between the engine and backends.
//! - **Errors**: `Error`, `StorageError` and `SchemaError` are the single error
//!   vocabulary shared by all crates.
//!
//! # Who Uses This Crate
//!
//! - `relcascade-query` renders `Value`s into filters and statements.
//! - `relcascade-session` walks `Schema` relationships to check permissions and
//!   cascade deletes.
//! - `relcascade-memory` stores `Row`s.
//!
//! Most applications should use the `relcascade` facade.

pub mod action;
pub mod error;
pub mod field;
pub mod instance;
pub mod registry;
pub mod relationship;
pub mod row;
pub mod schema;
pub mod types;
pub mod validate;
pub mod value;

pub use action::Action;
pub use error::{Error, Result, SchemaError, StorageError, StorageErrorKind};
pub use field::FieldInfo;
pub use instance::{Instance, Related};
pub use registry::{RegistryBuilder, SchemaProvider, SchemaRegistry};
pub use relationship::{KeyReference, RelationshipInfo, RelationshipKind};
pub use row::Row;
pub use schema::{Schema, SchemaBuilder};
pub use types::SqlType;
pub use validate::{is_identifier, validate_identifier};
pub use value::Value;
