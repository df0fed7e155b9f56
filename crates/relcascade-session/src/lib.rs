//! Cascading mutations for relcascade.
//!
//! This crate holds the engine behind API-level writes of nested entity
//! graphs:
//!
//! - **Permissions**: read/delete capability checks over embedded has-many
//!   collections, once per type and action ([`permissions`]).
//! - **Reconciliation**: delete-marked children inside an instance being
//!   saved are deleted depth-first and dropped from memory ([`reconcile`]).
//! - **Bulk cascades**: rows owned by deleted rows are removed with one
//!   grouped filter per relationship and level ([`relation_delete`]).
//! - **Delete pipeline**: interceptors, the skip-delete veto and the depth
//!   bound around every physical delete ([`pipeline`]).
//! - **Hooks**: ordered, named after-commit callbacks and the controller's
//!   error/recovery chains ([`hooks`]), with detached side effects
//!   ([`executor`]) and outbound notifications ([`notify`]).
//!
//! [`Mutator`] ties these together on one transaction per request.
//!
//! # Example
//!
//! ```ignore
//! let mutator = Mutator::builder(db, Arc::new(registry)).build()?;
//! let caller = GrantSet::new().with("orders_update").with("order_lines_read");
//!
//! // Delete-marked lines are removed, the rest are upserted.
//! let report = mutator.update(&caller, &mut order)?;
//! assert!(report.is_complete());
//! ```

pub mod config;
pub mod executor;
pub mod hooks;
pub mod mutation;
pub mod notify;
pub mod permissions;
pub mod pipeline;
pub mod reconcile;
pub mod relation_delete;

pub use config::EngineConfig;
pub use executor::SideEffectExecutor;
pub use hooks::{
    ControllerHooks, EntityHook, ErrorHook, HookArgs, HookChain, HookEntry, HookEvent,
    HookRegistry, RecoverHook, Recovered, global_hooks,
};
pub use mutation::{Mutator, MutatorBuilder};
pub use notify::{
    Notification, NotificationTarget, Notifier, build_notification, register_notification,
};
pub use permissions::{
    CapabilityChecker, GrantSet, PermissionCache, check_nested, check_write_permissions, require,
};
pub use pipeline::{
    Cascade, DeleteInterceptor, DeletePipeline, DeleteReport, DeleteRequest, DeleteTarget,
    RowDeleteState, Unresolved,
};
pub use reconcile::{load_foreign_keys, reconcile_children};
pub use relation_delete::delete_relations;
