//! Ordered lifecycle hooks.
//!
//! A [`HookChain`] is an insertion-ordered list of named callbacks. Entries
//! are appended by default; `before(name)` / `after(name)` set a one-shot
//! cursor used by the next `add`. Runs iterate a snapshot of the chain, so
//! registrations made while a run is in flight only affect later runs.
//!
//! [`HookRegistry`] keys chains by (entity type, event name) and creates them
//! on first use. Event names are free-form strings; [`HookEvent`] names the
//! ones the mutator fires itself. [`ControllerHooks`] holds the process-level error and
//! panic-recovery chains.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use relcascade_core::{Error, Instance};

use crate::executor::SideEffectExecutor;

// ============================================================================
// Hook Chain
// ============================================================================

/// A named callback.
pub struct HookEntry<F: ?Sized> {
    name: String,
    callback: Arc<F>,
}

impl<F: ?Sized> HookEntry<F> {
    /// Entry name; may be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The callback.
    pub fn callback(&self) -> &F {
        &self.callback
    }
}

impl<F: ?Sized> Clone for HookEntry<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<F: ?Sized> fmt::Debug for HookEntry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
enum Cursor {
    Before(String),
    After(String),
}

struct ChainState<F: ?Sized> {
    entries: Arc<Vec<HookEntry<F>>>,
    cursor: Option<Cursor>,
}

/// A panic caught while running a hook or side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovered {
    /// Hook or task name.
    pub origin: String,
    /// Panic message.
    pub message: String,
}

/// Ordered, copy-on-write list of callbacks.
pub struct HookChain<F: ?Sized> {
    state: Mutex<ChainState<F>>,
}

impl<F: ?Sized> Default for HookChain<F> {
    fn default() -> Self {
        Self {
            state: Mutex::new(ChainState {
                entries: Arc::new(Vec::new()),
                cursor: None,
            }),
        }
    }
}

impl<F: ?Sized> fmt::Debug for HookChain<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<F: ?Sized> HookChain<F> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState<F>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert the next entry before `name`. Unknown names fall back to append.
    pub fn before(&self, name: &str) -> &Self {
        self.lock().cursor = Some(Cursor::Before(name.to_string()));
        self
    }

    /// Insert the next entry after `name`. Unknown names fall back to append.
    pub fn after(&self, name: &str) -> &Self {
        self.lock().cursor = Some(Cursor::After(name.to_string()));
        self
    }

    /// Insert a callback at the cursor (append when none is set).
    pub fn add(&self, name: impl Into<String>, callback: Arc<F>) -> &Self {
        let mut state = self.lock();
        let cursor = state.cursor.take();
        let mut entries: Vec<HookEntry<F>> = state.entries.as_ref().clone();
        let index = match cursor {
            Some(Cursor::Before(target)) => entries.iter().position(|e| e.name == target),
            Some(Cursor::After(target)) => entries
                .iter()
                .position(|e| e.name == target)
                .map(|i| i + 1),
            None => None,
        }
        .unwrap_or(entries.len());
        entries.insert(
            index,
            HookEntry {
                name: name.into(),
                callback,
            },
        );
        state.entries = Arc::new(entries);
        self
    }

    /// Remove the first entry named `name`; no-op if absent.
    pub fn remove(&self, name: &str) -> &Self {
        let mut state = self.lock();
        if let Some(pos) = state.entries.iter().position(|e| e.name == name) {
            let mut entries: Vec<HookEntry<F>> = state.entries.as_ref().clone();
            entries.remove(pos);
            state.entries = Arc::new(entries);
        }
        self
    }

    /// Entry names in run order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|e| e.name.clone()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entries as of now.
    pub fn snapshot(&self) -> Arc<Vec<HookEntry<F>>> {
        Arc::clone(&self.lock().entries)
    }

    /// Invoke every entry of the current snapshot in order.
    ///
    /// With `recover`, a panicking entry is caught, logged and returned while
    /// the run continues; otherwise the panic propagates.
    pub fn run_with(&self, recover: bool, mut call: impl FnMut(&F)) -> Vec<Recovered> {
        let entries = self.snapshot();
        let mut recovered = Vec::new();
        for entry in entries.iter() {
            if !recover {
                call(&entry.callback);
                continue;
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| call(&entry.callback))) {
                let message = panic_message(payload.as_ref());
                tracing::warn!(
                    target: "relcascade::hooks",
                    hook = %entry.name,
                    panic = %message,
                    "recovered panic in hook"
                );
                recovered.push(Recovered {
                    origin: entry.name.clone(),
                    message,
                });
            }
        }
        recovered
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Entity Hooks
// ============================================================================

/// Lifecycle events fired by the mutator.
///
/// Hooks may be registered under any other event name too; these are only
/// the well-known keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// After a committed create.
    AfterCreate,
    /// After a committed update.
    AfterUpdate,
    /// After a committed delete.
    AfterDelete,
}

impl HookEvent {
    /// Event key, e.g. `after-update`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HookEvent::AfterCreate => "after-create",
            HookEvent::AfterUpdate => "after-update",
            HookEvent::AfterDelete => "after-delete",
        }
    }
}

impl AsRef<str> for HookEvent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<HookEvent> for String {
    fn from(event: HookEvent) -> Self {
        event.as_str().to_string()
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments handed to entity hooks.
pub struct HookArgs<'a> {
    /// Entity type name.
    pub entity: &'a str,
    /// Event name being run.
    pub event: &'a str,
    /// The instance as committed.
    pub instance: &'a Instance,
    /// Executor for detached side effects.
    pub effects: &'a SideEffectExecutor,
}

/// Callback type for entity hooks.
pub type EntityHook = dyn Fn(&HookArgs<'_>) + Send + Sync;

/// Hook chains keyed by (entity type, event name).
#[derive(Default)]
pub struct HookRegistry {
    chains: RwLock<HashMap<(String, String), Arc<HookChain<EntityHook>>>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("HookRegistry")
            .field("chains", &chains.len())
            .finish()
    }
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain for (`entity`, `event`), created on first access.
    pub fn chain(&self, entity: &str, event: impl AsRef<str>) -> Arc<HookChain<EntityHook>> {
        let key = (entity.to_string(), event.as_ref().to_string());
        if let Some(chain) = self
            .chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(chain);
        }
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(chains.entry(key).or_default())
    }

    /// Existing chain for (`entity`, `event`), without creating one.
    pub fn get(&self, entity: &str, event: impl AsRef<str>) -> Option<Arc<HookChain<EntityHook>>> {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(entity.to_string(), event.as_ref().to_string()))
            .cloned()
    }

    /// Append an unnamed hook.
    pub fn add_hook<F>(&self, entity: &str, event: impl AsRef<str>, hook: F)
    where
        F: Fn(&HookArgs<'_>) + Send + Sync + 'static,
    {
        self.chain(entity, event).add("", Arc::new(hook));
    }

    /// Run the chain for `args.entity` / `args.event`, if any.
    pub fn run(&self, args: &HookArgs<'_>, recover: bool) -> Vec<Recovered> {
        match self.get(args.entity, args.event) {
            Some(chain) => chain.run_with(recover, |hook| hook(args)),
            None => Vec::new(),
        }
    }
}

/// Process-wide hook registry.
pub fn global_hooks() -> &'static HookRegistry {
    static HOOKS: OnceLock<HookRegistry> = OnceLock::new();
    HOOKS.get_or_init(HookRegistry::new)
}

// ============================================================================
// Controller Hooks
// ============================================================================

/// Callback run when a mutation fails.
pub type ErrorHook = dyn Fn(&Error) + Send + Sync;

/// Callback run when a panic is recovered.
pub type RecoverHook = dyn Fn(&Recovered) + Send + Sync;

/// Error and recovery chains, each starting with a `"default"` entry that logs.
#[derive(Debug)]
pub struct ControllerHooks {
    /// Run with every error a mutation returns.
    pub on_error: HookChain<ErrorHook>,
    /// Run with every recovered panic.
    pub on_recover: HookChain<RecoverHook>,
}

impl Default for ControllerHooks {
    fn default() -> Self {
        let on_error: HookChain<ErrorHook> = HookChain::new();
        on_error.add(
            "default",
            Arc::new(|err: &Error| {
                tracing::error!(target: "relcascade::mutation", error = %err, "mutation failed");
            }),
        );
        let on_recover: HookChain<RecoverHook> = HookChain::new();
        on_recover.add(
            "default",
            Arc::new(|r: &Recovered| {
                tracing::error!(
                    target: "relcascade::recover",
                    origin = %r.origin,
                    "recovered panic: {}",
                    r.message
                );
            }),
        );
        Self {
            on_error,
            on_recover,
        }
    }
}

impl ControllerHooks {
    /// Chains with only the default entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the error chain.
    pub fn report_error(&self, err: &Error) {
        self.on_error.run_with(true, |hook| hook(err));
    }

    /// Run the recovery chain for each recovered panic.
    pub fn report_recovered(&self, recovered: &[Recovered]) {
        for r in recovered {
            self.on_recover.run_with(true, |hook| hook(r));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tagged = dyn Fn(&mut Vec<&'static str>) + Send + Sync;

    fn tagged(tag: &'static str) -> Arc<Tagged> {
        Arc::new(move |out: &mut Vec<&'static str>| out.push(tag))
    }

    fn exploding(_: &mut Vec<&'static str>) {
        panic!("hook exploded");
    }

    fn run(chain: &HookChain<Tagged>) -> Vec<&'static str> {
        let mut out = Vec::new();
        chain.run_with(true, |f| f(&mut out));
        out
    }

    #[test]
    fn test_before_inserts_ahead() {
        let chain: HookChain<Tagged> = HookChain::new();
        chain.add("x", tagged("x"));
        chain.before("x").add("y", tagged("y"));
        assert_eq!(run(&chain), vec!["y", "x"]);
        chain.remove("x");
        assert_eq!(run(&chain), vec!["y"]);
    }

    #[test]
    fn test_after_inserts_behind() {
        let chain: HookChain<Tagged> = HookChain::new();
        chain.add("a", tagged("a")).add("c", tagged("c"));
        chain.after("a").add("b", tagged("b"));
        assert_eq!(run(&chain), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cursor_is_one_shot() {
        let chain: HookChain<Tagged> = HookChain::new();
        chain.add("a", tagged("a"));
        chain.before("a").add("b", tagged("b"));
        chain.add("c", tagged("c"));
        assert_eq!(run(&chain), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_unknown_target_appends() {
        let chain: HookChain<Tagged> = HookChain::new();
        chain.add("a", tagged("a"));
        chain.before("missing").add("b", tagged("b"));
        assert_eq!(run(&chain), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_first_match_only() {
        let chain: HookChain<Tagged> = HookChain::new();
        chain.add("", tagged("1")).add("", tagged("2"));
        chain.remove("");
        assert_eq!(run(&chain), vec!["2"]);
        chain.remove("absent");
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_panicking_hook_is_isolated() {
        let chain: HookChain<Tagged> = HookChain::new();
        chain.add("a", tagged("a"));
        chain.add("boom", Arc::new(exploding));
        chain.add("c", tagged("c"));
        let mut out = Vec::new();
        let recovered = chain.run_with(true, |f| f(&mut out));
        assert_eq!(out, vec!["a", "c"]);
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].origin, "boom");
        assert_eq!(recovered[0].message, "hook exploded");
    }

    #[test]
    fn test_registration_during_run_affects_next_run() {
        let chain: Arc<HookChain<Tagged>> = Arc::new(HookChain::new());
        let inner = Arc::clone(&chain);
        chain.add(
            "registrar",
            Arc::new(move |out: &mut Vec<&'static str>| {
                out.push("registrar");
                if inner.len() == 1 {
                    inner.add("late", tagged("late"));
                }
            }),
        );
        assert_eq!(run(&chain), vec!["registrar"]);
        assert_eq!(run(&chain), vec!["registrar", "late"]);
    }

    #[test]
    fn test_registry_creates_chains_lazily() {
        let registry = HookRegistry::new();
        assert!(registry.get("Order", HookEvent::AfterUpdate).is_none());
        let chain = registry.chain("Order", HookEvent::AfterUpdate);
        assert!(chain.is_empty());
        registry.add_hook("Order", HookEvent::AfterUpdate, |_| {});
        assert_eq!(chain.len(), 1);
        assert!(registry.get("Order", HookEvent::AfterCreate).is_none());
        assert!(registry.get("Order", "after-update").is_some());
    }

    #[test]
    fn test_custom_event_names() {
        let registry = HookRegistry::new();
        registry.add_hook("Invoice", "after-print", |_| {});
        assert_eq!(registry.chain("Invoice", "after-print").len(), 1);
        assert!(registry.get("Invoice", HookEvent::AfterUpdate).is_none());
        assert_eq!(String::from(HookEvent::AfterDelete), "after-delete");
    }

    #[test]
    fn test_controller_hooks_have_defaults() {
        let hooks = ControllerHooks::new();
        assert_eq!(hooks.on_error.names(), vec!["default".to_string()]);
        assert_eq!(hooks.on_recover.names(), vec!["default".to_string()]);
    }
}
