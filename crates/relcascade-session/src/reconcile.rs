//! Cascading delete resolver for instances being saved.
//!
//! Before a parent's own update, every updatable has-one/has-many collection
//! embedded in it is walked from last to first. Children are reconciled
//! depth-first; a delete-marked child is then deleted through the delete
//! pipeline and dropped from the in-memory collection.

use relcascade_core::{Error, Instance, Related, Result, Row, Schema};
use relcascade_query::{Expr, Select, Transaction};

use crate::pipeline::{Cascade, DeleteReport, DeleteRequest, RowDeleteState};

/// Delete the delete-marked descendants of `instance`.
///
/// A child that is already gone from storage is skipped and left in memory.
/// Running this twice on the same instance deletes nothing the second time.
#[tracing::instrument(level = "debug", skip_all, fields(type_name = schema.name()))]
pub fn reconcile_children(
    cascade: Cascade<'_>,
    tx: &mut dyn Transaction,
    instance: &mut Instance,
    schema: &Schema,
    report: &mut DeleteReport,
) -> Result<()> {
    reconcile_at(cascade, tx, instance, schema, 0, report)
}

fn reconcile_at(
    cascade: Cascade<'_>,
    tx: &mut dyn Transaction,
    instance: &mut Instance,
    schema: &Schema,
    depth: usize,
    report: &mut DeleteReport,
) -> Result<()> {
    if depth > cascade.pipeline.max_depth() {
        return Err(Error::CascadeCycle {
            type_name: schema.name().to_string(),
            depth,
        });
    }
    for rel in schema.cascading_relationships() {
        let child_schema = cascade.provider.child_of(rel)?;
        let Some(related) = instance.related_mut(&rel.name) else {
            continue;
        };
        match related {
            Related::Many(children) => {
                for i in (0..children.len()).rev() {
                    let child = &mut children[i];
                    reconcile_at(cascade, tx, child, child_schema, depth + 1, report)?;
                    if child.is_marked_for_delete()
                        && delete_child(cascade, tx, child_schema, child, depth + 1, report)?
                    {
                        children.swap_remove(i);
                    }
                }
            }
            Related::One(slot) => {
                let remove = match slot.as_deref_mut() {
                    Some(child) => {
                        reconcile_at(cascade, tx, child, child_schema, depth + 1, report)?;
                        child.is_marked_for_delete()
                            && delete_child(cascade, tx, child_schema, child, depth + 1, report)?
                    }
                    None => false,
                };
                if remove {
                    *slot = None;
                }
            }
        }
    }
    Ok(())
}

/// Delete one marked child. Returns whether it should leave the collection.
fn delete_child(
    cascade: Cascade<'_>,
    tx: &mut dyn Transaction,
    schema: &Schema,
    child: &mut Instance,
    depth: usize,
    report: &mut DeleteReport,
) -> Result<bool> {
    let pk = schema.primary_key_columns();
    if pk.is_empty() || pk.iter().any(|c| child.is_zero(c)) {
        // Never persisted: nothing to remove from storage.
        return Ok(true);
    }
    let by_pk = primary_key_filter(schema, child);

    let needed = schema.cascade_key_columns();
    if !needed.is_empty() {
        let query = Select::from_table(schema.table())
            .columns(needed)
            .filter(by_pk.clone())
            .limit(1);
        let rows = tx.select(&query)?;
        let Some(row) = rows.first() else {
            tracing::debug!(
                target: "relcascade::reconcile",
                type_name = schema.name(),
                "child already deleted"
            );
            return Ok(false);
        };
        child.apply_row(row);
    }
    load_foreign_keys(tx, schema, child)?;

    let row: Row = schema
        .key_and_reference_columns()
        .into_iter()
        .map(|c| (c.to_string(), child.get_or_null(c)))
        .collect();
    let state = cascade.delete_at(tx, DeleteRequest::rows(schema, vec![row]), depth, report)?;
    Ok(state != RowDeleteState::Skipped)
}

/// `pk1 = v1 AND ...` for `instance`.
pub(crate) fn primary_key_filter(schema: &Schema, instance: &Instance) -> Expr {
    Expr::all(
        schema
            .primary_key_columns()
            .into_iter()
            .map(|c| Expr::col(c).eq(instance.get_or_null(c))),
    )
}

/// Backfill relationship key columns that are unset or zero on `instance`.
///
/// Reads the missing columns by primary key; leaves the instance untouched
/// when the row no longer exists.
pub fn load_foreign_keys(
    tx: &mut dyn Transaction,
    schema: &Schema,
    instance: &mut Instance,
) -> Result<()> {
    let missing: Vec<&str> = schema
        .reference_columns()
        .into_iter()
        .filter(|c| !schema.is_primary_key(c) && instance.is_zero(c))
        .collect();
    if missing.is_empty() || !schema.has_primary_key() {
        return Ok(());
    }
    let query = Select::from_table(schema.table())
        .columns(missing)
        .filter(primary_key_filter(schema, instance))
        .limit(1);
    if let Some(row) = tx.select(&query)?.first() {
        instance.apply_row(row);
    }
    Ok(())
}
