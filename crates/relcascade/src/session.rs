//! Mutation engine re-exports.
//!
//! The implementation lives in the separate `relcascade-session` crate. This
//! module exists so the `relcascade` facade exposes the engine without forcing
//! users to depend on sub-crates directly.

pub use relcascade_session::{
    Cascade, ControllerHooks, DeleteInterceptor, DeletePipeline, DeleteReport, DeleteRequest,
    DeleteTarget, EngineConfig, Mutator, MutatorBuilder, RowDeleteState, SideEffectExecutor,
    Unresolved,
};
pub use relcascade_session::{config, executor, hooks, mutation, notify, permissions, pipeline};
pub use relcascade_session::{delete_relations, load_foreign_keys, reconcile_children};
