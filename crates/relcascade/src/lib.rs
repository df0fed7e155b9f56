//! Relationship-aware cascading mutations.
//!
//! `relcascade` writes nested object graphs (an order with its lines, a
//! line with its notes) through one transaction per request:
//!
//! - capability checks over embedded collections, deduplicated per type;
//! - delete-marked children removed depth-first before the parent saves;
//! - rows owned by deleted rows removed with one grouped filter per
//!   relationship and level, over single or composite keys;
//! - ordered, named hooks after commit, with panics isolated and side
//!   effects detached from the request.
//!
//! The crates behind this facade are:
//!
//! - `relcascade-core`: values, rows, schemas, instances and errors
//! - `relcascade-query`: filter expressions, key sets, statements and the
//!   backend traits
//! - `relcascade-session`: the mutation engine
//! - `relcascade-memory` (feature `memory`): a transactional in-memory backend
//!
//! # Example
//!
//! ```ignore
//! use relcascade::prelude::*;
//!
//! let registry = SchemaRegistry::builder()
//!     .register(order_schema())
//!     .register(line_schema())
//!     .build()?;
//! let mutator = Mutator::builder(db, Arc::new(registry)).build()?;
//!
//! // Keys are `{TABLE}_{GET|POST|PATCH|DELETE}`, see `Action::capability`.
//! let caller = GrantSet::new().with("ORDERS_DELETE").with("ORDER_LINES_GET");
//! let report = mutator.delete(&caller, &order)?;
//! println!("{} rows deleted", report.deleted);
//! ```

pub mod session;

pub use relcascade_core::{
    Action, Error, FieldInfo, Instance, KeyReference, RegistryBuilder, Related,
    RelationshipInfo, RelationshipKind, Result, Row, Schema, SchemaBuilder, SchemaError,
    SchemaProvider, SchemaRegistry, SqlType, StorageError, StorageErrorKind, Value,
};
pub use relcascade_query::{
    Column, Connection, Delete, Dialect, Expr, Insert, KeySet, KeySetError, Select, Transaction,
    Update,
};
pub use relcascade_session::{
    CapabilityChecker, GrantSet, HookArgs, HookEvent, HookRegistry, Notification,
    NotificationTarget, Notifier, Recovered, global_hooks, register_notification,
};
pub use session::{
    ControllerHooks, DeleteInterceptor, DeletePipeline, DeleteReport, DeleteRequest,
    DeleteTarget, EngineConfig, Mutator, MutatorBuilder, RowDeleteState, Unresolved,
};

#[cfg(feature = "memory")]
pub use relcascade_memory::{MemoryDb, MemoryTransaction, StatementKind};

/// Everything needed to describe schemas and run mutations.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        Action, CapabilityChecker, Connection, DeleteInterceptor, DeleteReport, DeleteRequest,
        EngineConfig, Error, Expr, FieldInfo, GrantSet, HookArgs, HookEvent, HookRegistry,
        Instance, Mutator, NotificationTarget, Notifier, RelationshipInfo, Result, Row, Schema,
        SchemaProvider, SchemaRegistry, SqlType, Transaction, Value,
    };
}
