//! The delete pipeline.
//!
//! Every physical row deletion goes through [`Cascade::delete`]:
//!
//! 1. registered [`DeleteInterceptor`]s run in order; one returning
//!    [`Error::SkipDelete`] vetoes this step (and its cascade) as a success;
//! 2. the target is resolved to concrete rows;
//! 3. related rows are removed by the bulk relation resolver, each one as
//!    its own single-row step;
//! 4. the rows themselves are deleted.
//!
//! Children are therefore always removed before their owner. Recursion depth
//! is bounded by [`DeletePipeline::max_depth`].

use std::fmt;
use std::sync::Arc;

use relcascade_core::{Error, Result, Row, Schema, SchemaProvider};
use relcascade_query::{Delete, Expr, KeySet, KeySetError, Select, Transaction};

use crate::relation_delete::delete_relations;

// ============================================================================
// Requests and Reports
// ============================================================================

/// What a delete step removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    /// Rows identified by their key columns (primary keys plus the columns
    /// their own relationships reference).
    Rows(Vec<Row>),
    /// Every row matching a filter.
    Filter(Expr),
}

/// One delete step handed to interceptors.
#[derive(Debug, Clone)]
pub struct DeleteRequest<'a> {
    /// Schema of the table being deleted from.
    pub schema: &'a Schema,
    /// Rows to delete.
    pub target: DeleteTarget,
    /// Cascade depth; 0 for the request's root delete.
    pub depth: usize,
}

impl<'a> DeleteRequest<'a> {
    /// Delete specific rows.
    pub fn rows(schema: &'a Schema, rows: Vec<Row>) -> Self {
        Self {
            schema,
            target: DeleteTarget::Rows(rows),
            depth: 0,
        }
    }

    /// Delete every row matching `filter`.
    pub fn filter(schema: &'a Schema, filter: Expr) -> Self {
        Self {
            schema,
            target: DeleteTarget::Filter(filter),
            depth: 0,
        }
    }

    fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// A relationship that could not be cascaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Parent schema name.
    pub parent: String,
    /// Relationship name.
    pub relationship: String,
    /// Why the filter could not be built.
    pub reason: String,
}

impl Unresolved {
    /// The equivalent error value.
    pub fn to_error(&self) -> Error {
        Error::RelationUnresolvable {
            parent: self.parent.clone(),
            relationship: self.relationship.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Outcome of a delete, including cascaded rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Rows physically deleted, at every level.
    pub deleted: usize,
    /// Delete steps vetoed by an interceptor.
    pub skipped: usize,
    /// Relationships skipped because their key had a NULL component.
    pub unresolved: Vec<Unresolved>,
}

impl DeleteReport {
    /// Whether every relationship was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: DeleteReport) {
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.unresolved.extend(other.unresolved);
    }
}

/// Lifecycle of one delete step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDeleteState {
    /// Interceptors not yet run.
    Pending,
    /// Target resolved to rows.
    RelationsResolved,
    /// Related rows removed.
    ChildrenDeleted,
    /// Rows removed.
    RowDeleted,
    /// Vetoed by an interceptor.
    Skipped,
    /// Aborted by an error.
    Failed,
}

// ============================================================================
// Interceptors
// ============================================================================

/// Extension run before every delete step.
///
/// Returning [`Error::SkipDelete`] vetoes the step without failing the
/// request; any other error aborts and rolls back.
pub trait DeleteInterceptor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "interceptor"
    }

    /// Inspect (and possibly veto) a delete step.
    fn intercept(&self, tx: &mut dyn Transaction, request: &DeleteRequest<'_>) -> Result<()>;
}

impl<F> DeleteInterceptor for F
where
    F: Fn(&mut dyn Transaction, &DeleteRequest<'_>) -> Result<()> + Send + Sync,
{
    fn intercept(&self, tx: &mut dyn Transaction, request: &DeleteRequest<'_>) -> Result<()> {
        self(tx, request)
    }
}

/// Ordered interceptors plus the cascade depth bound.
#[derive(Clone)]
pub struct DeletePipeline {
    interceptors: Vec<Arc<dyn DeleteInterceptor>>,
    max_depth: usize,
}

impl fmt::Debug for DeletePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("DeletePipeline")
            .field("interceptors", &names)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Default for DeletePipeline {
    fn default() -> Self {
        Self::new(32)
    }
}

impl DeletePipeline {
    /// Pipeline with no interceptors.
    pub fn new(max_depth: usize) -> Self {
        Self {
            interceptors: Vec::new(),
            max_depth,
        }
    }

    /// Register an interceptor; interceptors run in registration order.
    pub fn register(&mut self, interceptor: Arc<dyn DeleteInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_interceptor(mut self, interceptor: Arc<dyn DeleteInterceptor>) -> Self {
        self.register(interceptor);
        self
    }

    /// Deepest cascade level allowed.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

// ============================================================================
// Cascade
// ============================================================================

/// Schema lookup plus delete pipeline: everything a cascade needs besides
/// the transaction.
#[derive(Clone, Copy)]
pub struct Cascade<'a> {
    /// Schema metadata.
    pub provider: &'a dyn SchemaProvider,
    /// Interceptors and depth bound.
    pub pipeline: &'a DeletePipeline,
}

impl fmt::Debug for Cascade<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cascade")
            .field("pipeline", self.pipeline)
            .finish_non_exhaustive()
    }
}

impl<'a> Cascade<'a> {
    /// Bundle a provider and pipeline.
    pub fn new(provider: &'a dyn SchemaProvider, pipeline: &'a DeletePipeline) -> Self {
        Self { provider, pipeline }
    }

    /// Run one delete step, cascading to related rows first.
    pub fn delete(
        &self,
        tx: &mut dyn Transaction,
        request: DeleteRequest<'_>,
        report: &mut DeleteReport,
    ) -> Result<RowDeleteState> {
        let schema = request.schema;
        match self.delete_step(tx, request, report) {
            Ok(state) => Ok(state),
            Err(err) => {
                tracing::debug!(
                    target: "relcascade::delete",
                    type_name = schema.name(),
                    state = ?RowDeleteState::Failed,
                    error = %err,
                    "delete step failed"
                );
                Err(err)
            }
        }
    }

    /// Delete step at an explicit cascade depth.
    pub(crate) fn delete_at(
        &self,
        tx: &mut dyn Transaction,
        request: DeleteRequest<'_>,
        depth: usize,
        report: &mut DeleteReport,
    ) -> Result<RowDeleteState> {
        self.delete(tx, request.at_depth(depth), report)
    }

    fn delete_step(
        &self,
        tx: &mut dyn Transaction,
        request: DeleteRequest<'_>,
        report: &mut DeleteReport,
    ) -> Result<RowDeleteState> {
        let schema = request.schema;
        if request.depth > self.pipeline.max_depth {
            return Err(Error::CascadeCycle {
                type_name: schema.name().to_string(),
                depth: request.depth,
            });
        }

        let mut state = RowDeleteState::Pending;
        for interceptor in &self.pipeline.interceptors {
            match interceptor.intercept(tx, &request) {
                Ok(()) => {}
                Err(Error::SkipDelete) => {
                    tracing::debug!(
                        target: "relcascade::delete",
                        type_name = schema.name(),
                        interceptor = interceptor.name(),
                        "delete skipped by interceptor"
                    );
                    report.skipped += 1;
                    return Ok(RowDeleteState::Skipped);
                }
                Err(err) => return Err(err),
            }
        }

        let rows = match request.target {
            DeleteTarget::Rows(rows) => rows,
            DeleteTarget::Filter(filter) => {
                let query = Select::from_table(schema.table())
                    .columns(schema.key_and_reference_columns())
                    .filter(filter)
                    .filter(scope_filter(schema));
                tx.select(&query)?
            }
        };
        advance(schema, &mut state, RowDeleteState::RelationsResolved);
        if rows.is_empty() {
            advance(schema, &mut state, RowDeleteState::RowDeleted);
            return Ok(state);
        }

        delete_relations(*self, tx, schema, &rows, request.depth + 1, report)?;
        advance(schema, &mut state, RowDeleteState::ChildrenDeleted);

        let stmt = Delete::from_table(schema.table())
            .filter(row_filter(schema, &rows)?)
            .filter(scope_filter(schema));
        let affected = tx.delete(&stmt)?;
        report.deleted += usize::try_from(affected).unwrap_or(usize::MAX);
        tracing::debug!(
            target: "relcascade::delete",
            table = schema.table(),
            rows = affected,
            depth = request.depth,
            "rows deleted"
        );
        advance(schema, &mut state, RowDeleteState::RowDeleted);
        Ok(state)
    }
}

fn advance(schema: &Schema, state: &mut RowDeleteState, next: RowDeleteState) {
    tracing::trace!(
        target: "relcascade::delete",
        type_name = schema.name(),
        from = ?*state,
        to = ?next,
        "delete state"
    );
    *state = next;
}

/// Default delete conditions of `schema` as a filter.
pub(crate) fn scope_filter(schema: &Schema) -> Expr {
    Expr::eq_all(schema.delete_scope().iter().map(|(c, v)| (c.as_str(), v)))
}

/// Filter matching exactly `rows` of `schema` by primary key, or by every
/// carried column when the schema has none.
fn row_filter(schema: &Schema, rows: &[Row]) -> Result<Expr> {
    if !schema.has_primary_key() {
        return Ok(Expr::Or(
            rows.iter()
                .map(|row| Expr::eq_all(row.iter()))
                .collect(),
        ));
    }
    let pk = schema.primary_key_columns();
    let keys = KeySet::from_rows(pk.iter().copied(), rows).map_err(|e| match e {
        KeySetError::NullComponent { column } => Error::query(format!(
            "cannot delete from {}: primary key column {} is null",
            schema.table(),
            column
        )),
        KeySetError::Arity { .. } => Error::query(e.to_string()),
    })?;
    Ok(keys.to_expr(&pk))
}
