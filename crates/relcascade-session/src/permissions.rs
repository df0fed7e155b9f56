//! Capability checks over nested instances.
//!
//! Before any write, the nested has-many collections of the instance are
//! walked depth-first. Each distinct child type gets one read check per
//! traversal and, for delete-marked children, one delete check. The first
//! denial aborts the traversal.

use std::collections::{BTreeSet, HashSet};

use relcascade_core::{Action, Error, Instance, RelationshipKind, Result, Schema, SchemaProvider};

/// Decides whether the caller holds the capability for `action` on a type.
pub trait CapabilityChecker: Send + Sync {
    /// Whether `action` on `schema` is allowed.
    fn check(&self, schema: &Schema, action: Action) -> bool;
}

impl<F> CapabilityChecker for F
where
    F: Fn(&Schema, Action) -> bool + Send + Sync,
{
    fn check(&self, schema: &Schema, action: Action) -> bool {
        self(schema, action)
    }
}

/// Capability keys granted to a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    grants: BTreeSet<String>,
}

impl GrantSet {
    /// Empty grant set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability key.
    pub fn grant(&mut self, key: impl Into<String>) {
        self.grants.insert(key.into());
    }

    /// Builder-style [`grant`](Self::grant).
    pub fn with(mut self, key: impl Into<String>) -> Self {
        self.grant(key);
        self
    }

    /// Whether `key` is granted.
    pub fn has(&self, key: &str) -> bool {
        self.grants.contains(key)
    }

    /// Whether any of `keys` is granted.
    pub fn has_one<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().any(|k| self.has(k.as_ref()))
    }
}

impl<S: Into<String>> FromIterator<S> for GrantSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            grants: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl CapabilityChecker for GrantSet {
    fn check(&self, schema: &Schema, action: Action) -> bool {
        self.has(&schema.capability(action))
    }
}

/// Types already checked during one traversal.
#[derive(Debug, Default)]
pub struct PermissionCache {
    checked: HashSet<(String, Action)>,
}

impl PermissionCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether (`type_name`, `action`) was already allowed.
    pub fn contains(&self, type_name: &str, action: Action) -> bool {
        self.checked.contains(&(type_name.to_string(), action))
    }

    fn record(&mut self, type_name: &str, action: Action) {
        self.checked.insert((type_name.to_string(), action));
    }
}

/// Check `action` on `schema`, mapping a denial to `Error::PermissionDenied`.
pub fn require(checker: &dyn CapabilityChecker, schema: &Schema, action: Action) -> Result<()> {
    if checker.check(schema, action) {
        return Ok(());
    }
    tracing::debug!(
        target: "relcascade::permissions",
        type_name = schema.name(),
        action = %action,
        "capability denied"
    );
    Err(Error::PermissionDenied {
        type_name: schema.name().to_string(),
        action,
        capability: schema.capability(action),
    })
}

/// Walk the nested has-many collections of `instance` and check capabilities.
///
/// Read checks run for every child type; with `check_delete`, delete checks
/// run for delete-marked children. Each (type, action) is checked at most
/// once per call.
#[tracing::instrument(level = "debug", skip(provider, checker, instance), fields(type_name = instance.type_name()))]
pub fn check_write_permissions(
    provider: &dyn SchemaProvider,
    checker: &dyn CapabilityChecker,
    instance: &Instance,
    check_delete: bool,
) -> Result<()> {
    let schema = provider.require(instance.type_name())?;
    let mut cache = PermissionCache::new();
    check_nested(provider, checker, schema, instance, check_delete, &mut cache)
}

/// [`check_write_permissions`] with a caller-supplied cache.
pub fn check_nested(
    provider: &dyn SchemaProvider,
    checker: &dyn CapabilityChecker,
    schema: &Schema,
    instance: &Instance,
    check_delete: bool,
    cache: &mut PermissionCache,
) -> Result<()> {
    for rel in schema
        .relationships()
        .iter()
        .filter(|r| r.kind == RelationshipKind::HasMany)
    {
        let children = instance.many(&rel.name);
        if children.is_empty() {
            continue;
        }
        let child_schema = provider.child_of(rel)?;
        for child in children {
            if !cache.contains(child_schema.name(), Action::Read) {
                require(checker, child_schema, Action::Read)?;
                cache.record(child_schema.name(), Action::Read);
            }
            if check_delete
                && child.is_marked_for_delete()
                && !cache.contains(child_schema.name(), Action::Delete)
            {
                require(checker, child_schema, Action::Delete)?;
                cache.record(child_schema.name(), Action::Delete);
            }
            check_nested(provider, checker, child_schema, child, check_delete, cache)?;
        }
    }
    Ok(())
}
