//! Bulk relation delete resolver.
//!
//! Given the rows about to be deleted from a parent table, find and remove
//! every row owned by them through updatable has-one/has-many relationships.
//! Parent key tuples are turned into one grouped filter per relationship and
//! the matching child rows are read with a single SELECT. Each child row is
//! then deleted on its own, so interceptors see (and may veto) every row.

use relcascade_core::{RelationshipKind, Result, Row, Schema};
use relcascade_query::{KeySet, Select, Transaction};

use crate::pipeline::{Cascade, DeleteReport, DeleteRequest, Unresolved, scope_filter};

/// Delete the rows owned by `parent_rows` of `schema`.
///
/// A parent row whose key for a relationship has a NULL component is left
/// out of that relationship's filter and recorded in `report.unresolved`;
/// the other parent rows and sibling relationships still cascade. Any storage
/// error aborts.
pub fn delete_relations(
    cascade: Cascade<'_>,
    tx: &mut dyn Transaction,
    schema: &Schema,
    parent_rows: &[Row],
    depth: usize,
    report: &mut DeleteReport,
) -> Result<()> {
    if parent_rows.is_empty() {
        return Ok(());
    }
    for rel in schema.relationships() {
        if !rel.cascades() || rel.is_hidden() {
            continue;
        }
        let child = cascade.provider.child_of(rel)?;
        if !child.has_primary_key() {
            continue;
        }
        // A has-one keyed on the child's own primary key shares the parent's
        // identity rather than being owned by it.
        if rel.kind == RelationshipKind::HasOne
            && rel
                .references
                .first()
                .is_some_and(|r| child.is_primary_key(&r.remote_column))
        {
            continue;
        }

        let local: Vec<&str> = rel.local_columns().collect();
        let mut keys = KeySet::new(local.iter().copied());
        for row in parent_rows {
            if let Err(err) = keys.insert(row.tuple(&local)) {
                let reason = err.to_string();
                tracing::warn!(
                    target: "relcascade::delete",
                    parent = schema.name(),
                    relationship = %rel.name,
                    reason = %reason,
                    "relationship skipped for row: key cannot be resolved"
                );
                report.unresolved.push(Unresolved {
                    parent: schema.name().to_string(),
                    relationship: rel.name.clone(),
                    reason,
                });
            }
        }
        if keys.is_empty() {
            continue;
        }

        let remote: Vec<&str> = rel.remote_columns().collect();
        let filter = keys.to_expr(&remote);
        let query = Select::from_table(child.table())
            .columns(child.key_and_reference_columns())
            .filter(filter)
            .filter(scope_filter(child));
        let children = tx.select(&query)?;
        tracing::debug!(
            target: "relcascade::delete",
            parent = schema.name(),
            relationship = %rel.name,
            child = child.name(),
            keys = keys.len(),
            rows = children.len(),
            depth,
            "cascading delete"
        );
        for row in children {
            cascade.delete_at(tx, DeleteRequest::rows(child, vec![row]), depth, report)?;
        }
    }
    Ok(())
}
