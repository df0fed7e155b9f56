mod common;

use std::sync::Mutex;

use relcascade::DeleteTarget;
use relcascade::prelude::*;
use relcascade_memory::StatementKind;

use common::{Fixture, admin};

#[test]
fn delete_removes_owned_rows_at_every_level() {
    let fx = Fixture::new();
    fx.seed_order(1, &[(10, "apple"), (11, "pear")]);
    fx.seed_order(2, &[(20, "plum")]);
    fx.db
        .seed("SHIPMENTS", Row::new().with("id", 5i64).with("order_id", 1i64).with("carrier", "ups"))
        .expect("seed shipment");

    let mutator = fx.mutator();
    let report = mutator
        .delete(&admin(), &Instance::new("Order").with("id", 1i64))
        .expect("delete order");

    // order + 2 lines + 2 notes + shipment
    assert_eq!(report.deleted, 6);
    assert!(report.is_complete());
    assert_eq!(fx.ids("ORDERS"), vec![2]);
    assert_eq!(fx.ids("ORDER_LINES"), vec![20]);
    assert_eq!(fx.ids("LINE_NOTES"), vec![2000]);
    assert!(fx.ids("SHIPMENTS").is_empty());
    assert_eq!(fx.db.commits(), 1);
}

#[test]
fn related_rows_are_read_once_and_deleted_one_by_one() {
    let fx = Fixture::new();
    for order in 1..=4i64 {
        let lines: Vec<(i64, String)> = (0..5).map(|i| (order * 10 + i, format!("sku-{i}"))).collect();
        let lines: Vec<(i64, &str)> = lines.iter().map(|(id, s)| (*id, s.as_str())).collect();
        fx.seed_order(order, &lines);
    }
    fx.db.clear_statements();

    let mutator = fx.mutator();
    let report = mutator
        .delete_where(&admin(), "Order", Expr::col("status").eq("open"))
        .expect("delete orders");

    assert_eq!(report.deleted, 4 + 20 + 20);
    let line_selects: Vec<String> = fx
        .db
        .statements()
        .into_iter()
        .filter(|sql| sql.starts_with("SELECT") && sql.contains("FROM ORDER_LINES"))
        .collect();
    assert_eq!(line_selects.len(), 1);
    assert!(line_selects[0].ends_with("WHERE \"order_id\" IN (?1, ?2, ?3, ?4)"));
    // orders + one per line + one per note
    assert_eq!(fx.db.statement_count(StatementKind::Delete), 1 + 20 + 20);
}

#[test]
fn interceptor_can_veto_a_single_sibling_row() {
    let fx = Fixture::new();
    fx.seed_order(1, &[(10, "apple"), (11, "pear")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let veto = move |_: &mut dyn Transaction, request: &DeleteRequest<'_>| -> Result<()> {
        if request.schema.name() != "OrderLine" {
            return Ok(());
        }
        let DeleteTarget::Rows(rows) = &request.target else {
            panic!("lines are deleted by row, got {:?}", request.target);
        };
        sink.lock().unwrap().push(rows.len());
        if rows.iter().any(|r| r.get("id") == Some(&Value::BigInt(11))) {
            return Err(Error::SkipDelete);
        }
        Ok(())
    };
    let mutator = fx
        .builder()
        .interceptor(Arc::new(veto))
        .build()
        .expect("build mutator");

    let report = mutator
        .delete(&admin(), &Instance::new("Order").with("id", 1i64))
        .expect("delete order");

    assert_eq!(*seen.lock().unwrap(), vec![1, 1]);
    assert_eq!(report.skipped, 1);
    assert!(fx.ids("ORDERS").is_empty());
    assert_eq!(fx.ids("ORDER_LINES"), vec![11]);
    assert_eq!(fx.ids("LINE_NOTES"), vec![1100]);
}

#[test]
fn composite_keys_group_by_shared_prefix() {
    let fx = Fixture::new();
    for (id, aisle, side) in [(1i64, 1i64, "a"), (2, 1, "b"), (3, 2, "a")] {
        fx.db
            .seed("SHELVES", Row::new().with("id", id).with("aisle", aisle).with("side", side))
            .expect("seed shelf");
    }
    for (id, aisle, side) in [(1i64, 1i64, "a"), (2, 1, "b"), (3, 2, "a"), (4, 2, "b")] {
        fx.db
            .seed(
                "SHELF_ITEMS",
                Row::new()
                    .with("id", id)
                    .with("aisle", aisle)
                    .with("side", side)
                    .with("label", "x"),
            )
            .expect("seed item");
    }
    fx.db.clear_statements();

    let report = fx
        .mutator()
        .delete_where(&admin(), "Shelf", Expr::True)
        .expect("delete shelves");

    assert_eq!(report.deleted, 6);
    // (2, "b") has no shelf and survives.
    assert_eq!(fx.ids("SHELF_ITEMS"), vec![4]);
    let item_select = fx
        .db
        .statements()
        .into_iter()
        .find(|sql| sql.starts_with("SELECT") && sql.contains("FROM SHELF_ITEMS"))
        .expect("items selected");
    assert!(item_select.ends_with(
        "WHERE (\"aisle\" = ?1 AND \"side\" IN (?2, ?3)) OR (\"aisle\" = ?4 AND \"side\" IN (?5))"
    ));
}

#[test]
fn null_key_component_skips_only_that_relationship() {
    let fx = Fixture::new();
    fx.db
        .seed(
            "SHELVES",
            Row::new().with("id", 9i64).with("aisle", 3i64).with("side", Value::Null),
        )
        .expect("seed shelf");
    fx.db
        .seed(
            "SHELF_ITEMS",
            Row::new().with("id", 1i64).with("aisle", 3i64).with("side", "a").with("label", "x"),
        )
        .expect("seed item");
    fx.db
        .seed(
            "SHELF_LABELS",
            Row::new().with("id", 1i64).with("shelf_id", 9i64).with("text", "top"),
        )
        .expect("seed label");

    let report = fx
        .mutator()
        .delete_where(&admin(), "Shelf", Expr::col("id").eq(9i64))
        .expect("delete shelf");

    assert_eq!(report.deleted, 2);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].parent, "Shelf");
    assert_eq!(report.unresolved[0].relationship, "items");
    assert!(matches!(
        report.unresolved[0].to_error(),
        Error::RelationUnresolvable { .. }
    ));
    assert!(fx.ids("SHELVES").is_empty());
    assert!(fx.ids("SHELF_LABELS").is_empty());
    assert_eq!(fx.ids("SHELF_ITEMS"), vec![1]);
}

#[test]
fn null_key_in_one_parent_keeps_the_other_parents_cascading() {
    let fx = Fixture::new();
    fx.db
        .seed("SHELVES", Row::new().with("id", 1i64).with("aisle", 1i64).with("side", "a"))
        .expect("seed shelf");
    fx.db
        .seed(
            "SHELVES",
            Row::new().with("id", 9i64).with("aisle", 3i64).with("side", Value::Null),
        )
        .expect("seed shelf");
    for (id, aisle, side) in [(1i64, 1i64, "a"), (2, 3, "a")] {
        fx.db
            .seed(
                "SHELF_ITEMS",
                Row::new()
                    .with("id", id)
                    .with("aisle", aisle)
                    .with("side", side)
                    .with("label", "x"),
            )
            .expect("seed item");
    }

    let report = fx
        .mutator()
        .delete_where(&admin(), "Shelf", Expr::True)
        .expect("delete shelves");

    assert!(fx.ids("SHELVES").is_empty());
    // Shelf 1's item goes; shelf 9 cannot own any item.
    assert_eq!(fx.ids("SHELF_ITEMS"), vec![2]);
    assert_eq!(report.deleted, 3);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].relationship, "items");
    assert!(report.unresolved[0].reason.contains("side"));
}

#[test]
fn delete_scope_limits_every_delete() {
    let fx = Fixture::new();
    for (id, tenant) in [(1i64, "acme"), (2, "globex"), (3, "acme")] {
        fx.db
            .seed("DOCUMENTS", Row::new().with("id", id).with("tenant", tenant).with("title", "t"))
            .expect("seed document");
    }

    let report = fx
        .mutator()
        .delete_where(&admin(), "Document", Expr::True)
        .expect("delete documents");

    assert_eq!(report.deleted, 2);
    assert_eq!(fx.ids("DOCUMENTS"), vec![2]);
}

#[test]
fn empty_filter_match_is_a_no_op() {
    let fx = Fixture::new();
    fx.seed_order(1, &[(10, "apple")]);
    let before = fx.db.snapshot();

    let report = fx
        .mutator()
        .delete_where(&admin(), "Order", Expr::col("id").eq(99i64))
        .expect("delete nothing");

    assert_eq!(report.deleted, 0);
    assert_eq!(fx.db.snapshot(), before);
}
