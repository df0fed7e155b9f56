//! Shared fixture: orders with lines, notes and a shipment; shelves keyed by
//! (aisle, side); self-referencing categories; tenant-scoped documents.

#![allow(dead_code)]

use std::sync::Arc;

use relcascade::prelude::*;
use relcascade::MutatorBuilder;
use relcascade_memory::MemoryDb;

pub fn order_schema() -> Schema {
    Schema::builder("Order", "ORDERS")
        .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
        .field(FieldInfo::new("customer", SqlType::Text))
        .field(FieldInfo::new("status", SqlType::Text))
        .relationship(RelationshipInfo::has_many("lines", "OrderLine").reference("id", "order_id"))
        .relationship(RelationshipInfo::has_one("shipment", "Shipment").reference("id", "order_id"))
        .build()
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .register(order_schema())
        .register(
            Schema::builder("OrderLine", "ORDER_LINES")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("order_id", SqlType::BigInt))
                .field(FieldInfo::new("sku", SqlType::Text))
                .field(FieldInfo::new("qty", SqlType::BigInt))
                .relationship(
                    RelationshipInfo::has_many("notes", "LineNote").reference("id", "line_id"),
                )
                .build(),
        )
        .register(
            Schema::builder("LineNote", "LINE_NOTES")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("line_id", SqlType::BigInt))
                .field(FieldInfo::new("body", SqlType::Text))
                .build(),
        )
        .register(
            Schema::builder("Shipment", "SHIPMENTS")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("order_id", SqlType::BigInt))
                .field(FieldInfo::new("carrier", SqlType::Text))
                .build(),
        )
        .register(
            Schema::builder("Shelf", "SHELVES")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("aisle", SqlType::BigInt).nullable(true))
                .field(FieldInfo::new("side", SqlType::Text).nullable(true))
                .relationship(
                    RelationshipInfo::has_many("items", "ShelfItem")
                        .reference("aisle", "aisle")
                        .reference("side", "side"),
                )
                .relationship(
                    RelationshipInfo::has_many("labels", "ShelfLabel").reference("id", "shelf_id"),
                )
                .build(),
        )
        .register(
            Schema::builder("ShelfItem", "SHELF_ITEMS")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("aisle", SqlType::BigInt))
                .field(FieldInfo::new("side", SqlType::Text))
                .field(FieldInfo::new("label", SqlType::Text))
                .build(),
        )
        .register(
            Schema::builder("ShelfLabel", "SHELF_LABELS")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("shelf_id", SqlType::BigInt))
                .field(FieldInfo::new("text", SqlType::Text))
                .build(),
        )
        .register(
            Schema::builder("Category", "CATEGORIES")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("parent_id", SqlType::BigInt).nullable(true))
                .relationship(
                    RelationshipInfo::has_many("children", "Category").reference("id", "parent_id"),
                )
                .build(),
        )
        .register(
            Schema::builder("Document", "DOCUMENTS")
                .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
                .field(FieldInfo::new("tenant", SqlType::Text))
                .field(FieldInfo::new("title", SqlType::Text))
                .delete_scope("tenant", "acme")
                .build(),
        )
        .build()
        .expect("fixture registry is valid")
}

/// Database and registry for one test.
pub struct Fixture {
    pub db: MemoryDb,
    pub registry: Arc<SchemaRegistry>,
    pub hooks: Arc<HookRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        let registry = registry();
        let db = MemoryDb::for_registry(&registry);
        Self {
            db,
            registry: Arc::new(registry),
            hooks: Arc::new(HookRegistry::new()),
        }
    }

    /// Builder over this fixture with a private hook registry.
    pub fn builder(&self) -> MutatorBuilder<MemoryDb> {
        Mutator::builder(self.db.clone(), self.registry.clone()).hooks(Arc::clone(&self.hooks))
    }

    pub fn mutator(&self) -> Mutator<MemoryDb> {
        self.builder().build().expect("build mutator")
    }

    /// Order `id` with `lines` (line id, sku); each line gets one note.
    pub fn seed_order(&self, id: i64, lines: &[(i64, &str)]) {
        self.db
            .seed("ORDERS", Row::new().with("id", id).with("customer", "c").with("status", "open"))
            .expect("seed order");
        for &(line_id, sku) in lines {
            self.db
                .seed(
                    "ORDER_LINES",
                    Row::new()
                        .with("id", line_id)
                        .with("order_id", id)
                        .with("sku", sku)
                        .with("qty", 1i64),
                )
                .expect("seed line");
            self.db
                .seed(
                    "LINE_NOTES",
                    Row::new()
                        .with("id", line_id * 100)
                        .with("line_id", line_id)
                        .with("body", format!("note for {sku}")),
                )
                .expect("seed note");
        }
    }

    pub fn ids(&self, table: &str) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .db
            .rows(table)
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Every capability on every fixture table.
pub fn admin() -> GrantSet {
    let mut grants = GrantSet::new();
    for table in [
        "ORDERS",
        "ORDER_LINES",
        "LINE_NOTES",
        "SHIPMENTS",
        "SHELVES",
        "SHELF_ITEMS",
        "SHELF_LABELS",
        "CATEGORIES",
        "DOCUMENTS",
    ] {
        for action in [Action::Read, Action::Create, Action::Update, Action::Delete] {
            grants.grant(action.capability(table));
        }
    }
    grants
}

/// Instance of order `id` as a client would send it back.
pub fn order(id: i64, lines: Vec<Instance>) -> Instance {
    Instance::new("Order")
        .with("id", id)
        .with("customer", "c")
        .with("status", "open")
        .with_many("lines", lines)
}

pub fn line(id: i64, order_id: i64, sku: &str) -> Instance {
    Instance::new("OrderLine")
        .with("id", id)
        .with("order_id", order_id)
        .with("sku", sku)
        .with("qty", 1i64)
}
