//! The mutation facade.
//!
//! [`Mutator`] runs API-level create/update/delete requests:
//!
//! ```text
//! permissions -> begin -> reconcile / cascade -> write -> commit -> hooks
//! ```
//!
//! Everything between `begin` and `commit` happens on one transaction; any
//! error rolls it back, runs the `on_error` chain and is returned as the
//! request's single error.

use std::fmt;
use std::sync::Arc;

use relcascade_core::{Action, Error, Instance, Result, Row, Schema, SchemaProvider, Value};
use relcascade_query::{Connection, Expr, Insert, Select, Transaction, Update};

use crate::config::EngineConfig;
use crate::executor::SideEffectExecutor;
use crate::hooks::{ControllerHooks, HookArgs, HookEvent, HookRegistry, global_hooks};
use crate::permissions::{CapabilityChecker, check_write_permissions, require};
use crate::pipeline::{Cascade, DeleteInterceptor, DeletePipeline, DeleteReport, DeleteRequest};
use crate::reconcile::{load_foreign_keys, primary_key_filter, reconcile_children};

// ============================================================================
// Builder
// ============================================================================

#[derive(Clone)]
enum HookSource {
    Global,
    Owned(Arc<HookRegistry>),
}

impl HookSource {
    fn get(&self) -> &HookRegistry {
        match self {
            HookSource::Global => global_hooks(),
            HookSource::Owned(registry) => &**registry,
        }
    }
}

/// Builder for [`Mutator`].
pub struct MutatorBuilder<C: Connection> {
    connection: C,
    provider: Arc<dyn SchemaProvider>,
    interceptors: Vec<Arc<dyn DeleteInterceptor>>,
    hooks: HookSource,
    controller: Option<Arc<ControllerHooks>>,
    config: EngineConfig,
}

impl<C: Connection> MutatorBuilder<C> {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a delete interceptor.
    pub fn interceptor(mut self, interceptor: Arc<dyn DeleteInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Use a private hook registry instead of [`global_hooks`].
    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = HookSource::Owned(hooks);
        self
    }

    /// Use custom error/recovery chains.
    pub fn controller_hooks(mut self, hooks: Arc<ControllerHooks>) -> Self {
        self.controller = Some(hooks);
        self
    }

    /// Validate the configuration and start the side-effect workers.
    pub fn build(self) -> Result<Mutator<C>> {
        self.config.validate()?;
        let controller = self.controller.unwrap_or_default();
        let effects =
            SideEffectExecutor::new(self.config.side_effect_workers, Arc::clone(&controller))?;
        let mut pipeline = DeletePipeline::new(self.config.max_cascade_depth);
        for interceptor in self.interceptors {
            pipeline.register(interceptor);
        }
        Ok(Mutator {
            connection: self.connection,
            provider: self.provider,
            pipeline,
            hooks: self.hooks,
            controller,
            effects,
            config: self.config,
        })
    }
}

// ============================================================================
// Mutator
// ============================================================================

/// Runs permission-checked, cascading mutations against one connection.
pub struct Mutator<C: Connection> {
    connection: C,
    provider: Arc<dyn SchemaProvider>,
    pipeline: DeletePipeline,
    hooks: HookSource,
    controller: Arc<ControllerHooks>,
    effects: SideEffectExecutor,
    config: EngineConfig,
}

impl<C: Connection> fmt::Debug for Mutator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Mutator<C> {
    /// Start building a mutator over `connection` and `provider`.
    pub fn builder(connection: C, provider: Arc<dyn SchemaProvider>) -> MutatorBuilder<C> {
        MutatorBuilder {
            connection,
            provider,
            interceptors: Vec::new(),
            hooks: HookSource::Global,
            controller: None,
            config: EngineConfig::default(),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Schema metadata.
    pub fn provider(&self) -> &dyn SchemaProvider {
        self.provider.as_ref()
    }

    /// Entity hooks consulted after commits.
    pub fn hooks(&self) -> &HookRegistry {
        self.hooks.get()
    }

    /// Error and recovery chains.
    pub fn controller_hooks(&self) -> &ControllerHooks {
        &self.controller
    }

    /// Side-effect executor.
    pub fn effects(&self) -> &SideEffectExecutor {
        &self.effects
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn cascade(&self) -> Cascade<'_> {
        Cascade::new(self.provider.as_ref(), &self.pipeline)
    }

    /// Insert `instance` and its nested has-one/has-many children.
    ///
    /// Generated keys are written back into the instance tree.
    #[tracing::instrument(level = "debug", skip(self, caller, instance), fields(type_name = instance.type_name()))]
    pub fn create(&self, caller: &dyn CapabilityChecker, instance: &mut Instance) -> Result<()> {
        self.create_inner(caller, instance)
            .inspect_err(|e| self.controller.report_error(e))
    }

    fn create_inner(&self, caller: &dyn CapabilityChecker, instance: &mut Instance) -> Result<()> {
        let schema = self.provider.require(instance.type_name())?;
        instance.check_types(schema)?;
        if self.config.check_root_permissions {
            require(caller, schema, Action::Create)?;
        }
        check_write_permissions(self.provider.as_ref(), caller, instance, false)?;

        let cascade = self.cascade();
        self.in_transaction(|tx| {
            insert_row(tx, schema, instance)?;
            save_children(cascade, tx, schema, instance, 0)
        })?;
        self.run_hooks(HookEvent::AfterCreate, instance);
        Ok(())
    }

    /// Save `instance`: delete its delete-marked descendants, update its own
    /// row, then upsert the retained children.
    #[tracing::instrument(level = "debug", skip(self, caller, instance), fields(type_name = instance.type_name()))]
    pub fn update(
        &self,
        caller: &dyn CapabilityChecker,
        instance: &mut Instance,
    ) -> Result<DeleteReport> {
        self.update_inner(caller, instance)
            .inspect_err(|e| self.controller.report_error(e))
    }

    fn update_inner(
        &self,
        caller: &dyn CapabilityChecker,
        instance: &mut Instance,
    ) -> Result<DeleteReport> {
        let schema = self.provider.require(instance.type_name())?;
        instance.check_types(schema)?;
        require_persisted(schema, instance)?;
        if self.config.check_root_permissions {
            require(caller, schema, Action::Update)?;
        }
        check_write_permissions(self.provider.as_ref(), caller, instance, true)?;

        let cascade = self.cascade();
        let report = self.in_transaction(|tx| {
            let mut report = DeleteReport::default();
            reconcile_children(cascade, tx, instance, schema, &mut report)?;
            update_row(tx, schema, instance)?;
            save_children(cascade, tx, schema, instance, 0)?;
            Ok(report)
        })?;
        self.run_hooks(HookEvent::AfterUpdate, instance);
        Ok(report)
    }

    /// Delete `instance`'s row and everything it owns.
    #[tracing::instrument(level = "debug", skip(self, caller, instance), fields(type_name = instance.type_name()))]
    pub fn delete(&self, caller: &dyn CapabilityChecker, instance: &Instance) -> Result<DeleteReport> {
        self.delete_inner(caller, instance)
            .inspect_err(|e| self.controller.report_error(e))
    }

    fn delete_inner(
        &self,
        caller: &dyn CapabilityChecker,
        instance: &Instance,
    ) -> Result<DeleteReport> {
        let schema = self.provider.require(instance.type_name())?;
        require_persisted(schema, instance)?;
        if self.config.check_root_permissions {
            require(caller, schema, Action::Delete)?;
        }

        let cascade = self.cascade();
        let mut target = instance.clone();
        let report = self.in_transaction(|tx| {
            load_foreign_keys(tx, schema, &mut target)?;
            let row = key_row(schema, &target);
            let mut report = DeleteReport::default();
            cascade.delete(tx, DeleteRequest::rows(schema, vec![row]), &mut report)?;
            Ok(report)
        })?;
        self.run_hooks(HookEvent::AfterDelete, &target);
        Ok(report)
    }

    /// Delete every `type_name` row matching `filter`, cascading to owned
    /// rows. Entity hooks are not run.
    #[tracing::instrument(level = "debug", skip(self, caller, filter))]
    pub fn delete_where(
        &self,
        caller: &dyn CapabilityChecker,
        type_name: &str,
        filter: Expr,
    ) -> Result<DeleteReport> {
        self.delete_where_inner(caller, type_name, filter)
            .inspect_err(|e| self.controller.report_error(e))
    }

    fn delete_where_inner(
        &self,
        caller: &dyn CapabilityChecker,
        type_name: &str,
        filter: Expr,
    ) -> Result<DeleteReport> {
        let schema = self.provider.require(type_name)?;
        if self.config.check_root_permissions {
            require(caller, schema, Action::Delete)?;
        }
        let cascade = self.cascade();
        self.in_transaction(|tx| {
            let mut report = DeleteReport::default();
            cascade.delete(tx, DeleteRequest::filter(schema, filter), &mut report)?;
            Ok(report)
        })
    }

    /// Run `body` on a fresh transaction; commit on success, roll back on
    /// error.
    fn in_transaction<T>(&self, body: impl FnOnce(&mut dyn Transaction) -> Result<T>) -> Result<T> {
        let mut tx = self.connection.begin()?;
        tracing::info!(target: "relcascade::mutation", "Beginning transaction");
        match body(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                tracing::info!(target: "relcascade::mutation", "Committed transaction");
                Ok(value)
            }
            Err(err) => {
                tracing::info!(
                    target: "relcascade::mutation",
                    error = %err,
                    "Rolling back transaction"
                );
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(
                        target: "relcascade::mutation",
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    fn run_hooks(&self, event: HookEvent, instance: &Instance) {
        self.fire(event, instance);
    }

    /// Run the hooks registered for `event` on `instance`'s type.
    ///
    /// The mutator fires the [`HookEvent`] keys itself; callers use this for
    /// their own event names, e.g. `after-print`.
    pub fn fire(&self, event: impl AsRef<str>, instance: &Instance) {
        let args = HookArgs {
            entity: instance.type_name(),
            event: event.as_ref(),
            instance,
            effects: &self.effects,
        };
        let recovered = self.hooks.get().run(&args, self.config.recover_hook_panics);
        self.controller.report_recovered(&recovered);
    }
}

// ============================================================================
// Row Writes
// ============================================================================

fn require_persisted(schema: &Schema, instance: &Instance) -> Result<()> {
    let pk = schema.primary_key_columns();
    if pk.is_empty() || pk.iter().any(|c| instance.is_zero(c)) {
        return Err(Error::query(format!(
            "{} has no primary key value; it must be created first",
            schema.name()
        )));
    }
    Ok(())
}

/// Row with the primary key and relationship key columns of `instance`.
fn key_row(schema: &Schema, instance: &Instance) -> Row {
    schema
        .key_and_reference_columns()
        .into_iter()
        .map(|c| (c.to_string(), instance.get_or_null(c)))
        .collect()
}

/// Update the updatable columns set on `instance`. `None` when there is
/// nothing to set.
fn update_row(tx: &mut dyn Transaction, schema: &Schema, instance: &Instance) -> Result<Option<u64>> {
    let mut stmt = Update::table(schema.table());
    for field in schema.fields().iter().filter(|f| f.updatable && !f.primary_key) {
        if let Some(value) = instance.get(&field.column_name) {
            stmt = stmt.set(field.column_name.clone(), value.clone());
        }
    }
    if stmt.values.is_empty() {
        return Ok(None);
    }
    let stmt = stmt.filter(primary_key_filter(schema, instance));
    tx.update(&stmt).map(Some)
}

/// Insert the creatable columns set on `instance` and read back generated
/// values.
fn insert_row(tx: &mut dyn Transaction, schema: &Schema, instance: &mut Instance) -> Result<()> {
    let mut stmt = Insert::into_table(schema.table());
    for field in schema.fields().iter().filter(|f| f.creatable) {
        match instance.get(&field.column_name) {
            Some(value) if !(field.primary_key && value.is_zero()) => {
                stmt = stmt.value(field.column_name.clone(), value.clone());
            }
            _ => {}
        }
    }
    let row = tx.insert(&stmt)?;
    instance.apply_row(&row);
    tracing::debug!(target: "relcascade::mutation", table = schema.table(), "row inserted");
    Ok(())
}

fn upsert_row(tx: &mut dyn Transaction, schema: &Schema, instance: &mut Instance) -> Result<()> {
    let persisted = schema.has_primary_key()
        && schema
            .primary_key_columns()
            .iter()
            .all(|c| !instance.is_zero(c));
    if persisted {
        let exists = match update_row(tx, schema, instance)? {
            Some(affected) => affected > 0,
            None => {
                let query = Select::from_table(schema.table())
                    .columns(schema.primary_key_columns())
                    .filter(primary_key_filter(schema, instance))
                    .limit(1);
                !tx.select(&query)?.is_empty()
            }
        };
        if exists {
            return Ok(());
        }
    }
    insert_row(tx, schema, instance)
}

/// Upsert the retained children of `parent` along cascading relationships,
/// copying the parent's key values into the children's foreign keys.
fn save_children(
    cascade: Cascade<'_>,
    tx: &mut dyn Transaction,
    schema: &Schema,
    parent: &mut Instance,
    depth: usize,
) -> Result<()> {
    if depth > cascade.pipeline.max_depth() {
        return Err(Error::CascadeCycle {
            type_name: schema.name().to_string(),
            depth,
        });
    }
    for rel in schema.cascading_relationships() {
        let child_schema = cascade.provider.child_of(rel)?;
        let parent_keys: Vec<(String, Value)> = rel
            .references
            .iter()
            .map(|r| (r.remote_column.clone(), parent.get_or_null(&r.local_column)))
            .collect();
        let Some(related) = parent.related_mut(&rel.name) else {
            continue;
        };
        for child in related.iter_mut() {
            if child.is_marked_for_delete() {
                continue;
            }
            for (column, value) in &parent_keys {
                child.set(column.clone(), value.clone());
            }
            child.check_types(child_schema)?;
            upsert_row(tx, child_schema, child)?;
            save_children(cascade, tx, child_schema, child, depth + 1)?;
        }
    }
    Ok(())
}
