//! Schema lookup.
//!
//! The engine never derives metadata per request: every schema is validated
//! once when the registry is built and then looked up by type name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::relationship::RelationshipInfo;
use crate::schema::Schema;
use crate::validate::validate_identifier;

/// Source of schema metadata, keyed by model type name.
pub trait SchemaProvider: Send + Sync {
    /// Schema for `type_name`, if known.
    fn schema(&self, type_name: &str) -> Option<&Schema>;

    /// Schema for `type_name`, or `SchemaError::UnknownSchema`.
    fn require(&self, type_name: &str) -> Result<&Schema, SchemaError> {
        self.schema(type_name)
            .ok_or_else(|| SchemaError::UnknownSchema(type_name.to_string()))
    }

    /// Schema of the related side of `relationship`.
    fn child_of(&self, relationship: &RelationshipInfo) -> Result<&Schema, SchemaError> {
        self.require(&relationship.child)
    }
}

impl<P: SchemaProvider + ?Sized> SchemaProvider for Arc<P> {
    fn schema(&self, type_name: &str) -> Option<&Schema> {
        (**self).schema(type_name)
    }
}

/// Validated, immutable set of schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl SchemaProvider for SchemaRegistry {
    fn schema(&self, type_name: &str) -> Option<&Schema> {
        self.schemas.get(type_name)
    }
}

/// Collects schemas and validates them as a whole.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: Vec<Schema>,
}

impl RegistryBuilder {
    /// Add a schema.
    pub fn register(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Validate every schema and freeze the registry.
    ///
    /// Checks identifiers, duplicate type names, that each relationship has
    /// key references, that its target exists, and that referenced columns
    /// exist on both sides. Cyclic relationship graphs are accepted; the
    /// cascade bounds its own depth.
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut schemas: HashMap<String, Schema> = HashMap::with_capacity(self.schemas.len());
        for schema in self.schemas {
            validate_own_columns(&schema)?;
            if schemas.contains_key(schema.name()) {
                return Err(SchemaError::DuplicateSchema(schema.name().to_string()));
            }
            schemas.insert(schema.name().to_string(), schema);
        }

        for schema in schemas.values() {
            for rel in schema.relationships() {
                validate_relationship(schema, rel, &schemas)?;
            }
        }

        tracing::debug!(
            target: "relcascade::registry",
            schemas = schemas.len(),
            "schema registry built"
        );
        Ok(SchemaRegistry { schemas })
    }
}

fn validate_own_columns(schema: &Schema) -> Result<(), SchemaError> {
    validate_identifier(schema.name(), schema.table())?;
    for field in schema.fields() {
        validate_identifier(schema.name(), &field.column_name)?;
    }
    for (column, _) in schema.delete_scope() {
        if !schema.has_column(column) {
            return Err(SchemaError::UnknownColumn {
                schema: schema.name().to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

fn validate_relationship(
    schema: &Schema,
    rel: &RelationshipInfo,
    schemas: &HashMap<String, Schema>,
) -> Result<(), SchemaError> {
    if rel.references.is_empty() {
        return Err(SchemaError::EmptyReferences {
            schema: schema.name().to_string(),
            relationship: rel.name.clone(),
        });
    }
    let child = schemas
        .get(&rel.child)
        .ok_or_else(|| SchemaError::UnknownSchema(rel.child.clone()))?;
    for reference in &rel.references {
        if !schema.has_column(&reference.local_column) {
            return Err(SchemaError::UnknownColumn {
                schema: schema.name().to_string(),
                column: reference.local_column.clone(),
            });
        }
        if !child.has_column(&reference.remote_column) {
            return Err(SchemaError::UnknownColumn {
                schema: child.name().to_string(),
                column: reference.remote_column.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldInfo;
    use crate::types::SqlType;

    fn node() -> Schema {
        Schema::builder("Node", "NODES")
            .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
            .field(FieldInfo::new("parent_id", SqlType::BigInt).nullable(true))
            .relationship(RelationshipInfo::has_many("children", "Node").reference("id", "parent_id"))
            .build()
    }

    #[test]
    fn test_self_referential_schema_is_accepted() {
        let registry = SchemaRegistry::builder().register(node()).build().unwrap();
        assert_eq!(registry.len(), 1);
        let schema = registry.require("Node").unwrap();
        let rel = schema.relationship("children").unwrap();
        assert_eq!(registry.child_of(rel).unwrap().table(), "NODES");
    }

    #[test]
    fn test_duplicate_schema_rejected() {
        let err = SchemaRegistry::builder()
            .register(node())
            .register(node())
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateSchema("Node".to_string()));
    }

    #[test]
    fn test_unknown_child_rejected() {
        let schema = Schema::builder("Order", "ORDERS")
            .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
            .relationship(RelationshipInfo::has_many("lines", "OrderLine").reference("id", "order_id"))
            .build();
        let err = SchemaRegistry::builder().register(schema).build().unwrap_err();
        assert_eq!(err, SchemaError::UnknownSchema("OrderLine".to_string()));
    }

    #[test]
    fn test_missing_remote_column_rejected() {
        let parent = Schema::builder("Order", "ORDERS")
            .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
            .relationship(RelationshipInfo::has_many("lines", "OrderLine").reference("id", "order_id"))
            .build();
        let child = Schema::builder("OrderLine", "ORDER_LINES")
            .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
            .build();
        let err = SchemaRegistry::builder()
            .register(parent)
            .register(child)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { ref column, .. } if column == "order_id"));
    }

    #[test]
    fn test_empty_references_rejected() {
        let schema = Schema::builder("Node", "NODES")
            .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
            .relationship(RelationshipInfo::has_many("children", "Node"))
            .build();
        let err = SchemaRegistry::builder().register(schema).build().unwrap_err();
        assert!(matches!(err, SchemaError::EmptyReferences { .. }));
    }

    #[test]
    fn test_invalid_table_identifier_rejected() {
        let schema = Schema::builder("Bad", "BAD; DROP")
            .field(FieldInfo::new("id", SqlType::BigInt).primary_key(true))
            .build();
        let err = SchemaRegistry::builder().register(schema).build().unwrap_err();
        assert!(matches!(err, SchemaError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_unknown_schema_lookup() {
        let registry = SchemaRegistry::builder().build().unwrap();
        assert!(registry.is_empty());
        assert_eq!(
            registry.require("Ghost").unwrap_err(),
            SchemaError::UnknownSchema("Ghost".to_string())
        );
    }
}
