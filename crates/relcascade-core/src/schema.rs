//! Per-type schema metadata.
//!
//! A `Schema` describes one model type: its table, ordered fields and ordered
//! relationships. Schemas are built with [`SchemaBuilder`] and frozen inside a
//! [`SchemaRegistry`](crate::registry::SchemaRegistry).

use std::collections::HashMap;

use crate::action::Action;
use crate::field::FieldInfo;
use crate::relationship::RelationshipInfo;
use crate::value::Value;

/// Immutable metadata for one model type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    table: String,
    fields: Vec<FieldInfo>,
    relationships: Vec<RelationshipInfo>,
    permission_prefix: Option<String>,
    permission_overrides: HashMap<Action, String>,
    delete_scope: Vec<(String, Value)>,
}

impl Schema {
    /// Start building a schema for `name` stored in `table`.
    pub fn builder(name: impl Into<String>, table: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name, table)
    }

    /// Model type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> &[RelationshipInfo] {
        &self.relationships
    }

    /// Look up a field by column name.
    pub fn field(&self, column: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.column_name == column)
    }

    /// Whether the table has `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.field(column).is_some()
    }

    /// Look up a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipInfo> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Primary key columns in declaration order.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.column_name.as_str())
            .collect()
    }

    /// Whether the schema declares any primary key.
    pub fn has_primary_key(&self) -> bool {
        self.fields.iter().any(|f| f.primary_key)
    }

    /// Whether `column` is part of the primary key.
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.field(column).is_some_and(|f| f.primary_key)
    }

    /// Relationships that reconciliation and cascading deletes walk.
    pub fn cascading_relationships(&self) -> impl Iterator<Item = &RelationshipInfo> {
        self.relationships.iter().filter(|r| r.cascades())
    }

    /// Local columns referenced by this schema's own updatable, visible
    /// relationships (any kind), deduplicated, in declaration order.
    ///
    /// These are the columns a cascade needs loaded on a row before it can
    /// resolve the row's relations.
    pub fn reference_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for rel in self
            .relationships
            .iter()
            .filter(|r| r.updatable && !r.is_hidden())
        {
            for col in rel.local_columns() {
                if !out.contains(&col) {
                    out.push(col);
                }
            }
        }
        out
    }

    /// Columns referenced by cascading (owning, updatable) relationships that
    /// are not primary keys.
    pub fn cascade_key_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for rel in self.cascading_relationships() {
            for col in rel.local_columns() {
                if !self.is_primary_key(col) && !out.contains(&col) {
                    out.push(col);
                }
            }
        }
        out
    }

    /// Primary keys plus [`reference_columns`](Self::reference_columns).
    pub fn key_and_reference_columns(&self) -> Vec<&str> {
        let mut out = self.primary_key_columns();
        for col in self.reference_columns() {
            if !out.contains(&col) {
                out.push(col);
            }
        }
        out
    }

    /// Prefix used to build capability keys; defaults to the table name.
    pub fn permission_prefix(&self) -> &str {
        self.permission_prefix.as_deref().unwrap_or(&self.table)
    }

    /// Capability key required for `action` on this type.
    pub fn capability(&self, action: Action) -> String {
        match self.permission_overrides.get(&action) {
            Some(key) => key.clone(),
            None => action.capability(self.permission_prefix()),
        }
    }

    /// Equality conditions ANDed into every delete on this table.
    pub fn delete_scope(&self) -> &[(String, Value)] {
        &self.delete_scope
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a builder.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Schema {
                name: name.into(),
                table: table.into(),
                fields: Vec::new(),
                relationships: Vec::new(),
                permission_prefix: None,
                permission_overrides: HashMap::new(),
                delete_scope: Vec::new(),
            },
        }
    }

    /// Append a field.
    pub fn field(mut self, field: FieldInfo) -> Self {
        self.schema.fields.push(field);
        self
    }

    /// Append a relationship.
    pub fn relationship(mut self, relationship: RelationshipInfo) -> Self {
        self.schema.relationships.push(relationship);
        self
    }

    /// Set the capability prefix.
    pub fn permission_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.schema.permission_prefix = Some(prefix.into());
        self
    }

    /// Replace the capability key checked for `action`.
    pub fn permission_override(mut self, action: Action, key: impl Into<String>) -> Self {
        self.schema.permission_overrides.insert(action, key.into());
        self
    }

    /// Add an equality condition to every delete on this table.
    pub fn delete_scope(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.schema.delete_scope.push((column.into(), value.into()));
        self
    }

    /// Finish the schema. Validation happens when it is registered.
    pub fn build(self) -> Schema {
        self.schema
    }
}
