//! Model instances whose shape is described by a runtime `Schema`.
//!
//! An `Instance` holds column values by name plus embedded related instances
//! keyed by relationship name. It is owned by the calling request and mutated
//! in place by reconciliation (deleted children are removed from it).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;

/// Related instances embedded under one relationship name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Related {
    /// Has-many: an ordered collection.
    Many(Vec<Instance>),
    /// Has-one or belongs-to: at most one instance.
    One(Option<Box<Instance>>),
}

impl Related {
    /// Number of embedded instances.
    pub fn len(&self) -> usize {
        match self {
            Related::One(one) => usize::from(one.is_some()),
            Related::Many(many) => many.len(),
        }
    }

    /// Whether nothing is embedded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedded instances, a has-one normalized to a singleton.
    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        match self {
            Related::One(Some(one)) => std::slice::from_ref(one.as_ref()).iter(),
            Related::One(None) => <&[Instance]>::default().iter(),
            Related::Many(many) => many.iter(),
        }
    }

    /// Mutable variant of [`iter`](Self::iter).
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Instance> {
        match self {
            Related::One(Some(one)) => std::slice::from_mut(one.as_mut()).iter_mut(),
            Related::One(None) => <&mut [Instance]>::default().iter_mut(),
            Related::Many(many) => many.iter_mut(),
        }
    }
}

/// An in-memory record of a schema'd type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    values: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    relations: BTreeMap<String, Related>,
    #[serde(default, rename = "delete", skip_serializing_if = "std::ops::Not::not")]
    delete_marker: bool,
}

impl Instance {
    /// Create an empty instance of `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Create an instance populated from a row.
    pub fn from_row(type_name: impl Into<String>, row: &Row) -> Self {
        let mut instance = Self::new(type_name);
        instance.apply_row(row);
        instance
    }

    /// Model type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Builder-style column set.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Set a column value.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Get a column value, NULL when unset.
    pub fn get_or_null(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Remove a column value, returning it.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// All column values.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Whether `column` is unset or holds its type's zero value.
    pub fn is_zero(&self, column: &str) -> bool {
        self.values.get(column).is_none_or(Value::is_zero)
    }

    /// Copy every column of `row` into the instance.
    pub fn apply_row(&mut self, row: &Row) {
        for (column, value) in row.iter() {
            self.values.insert(column.to_string(), value.clone());
        }
    }

    /// Values of `columns` in order, NULL when unset.
    pub fn key_tuple<S: AsRef<str>>(&self, columns: &[S]) -> Vec<Value> {
        columns.iter().map(|c| self.get_or_null(c.as_ref())).collect()
    }

    /// Primary key values in the schema's declaration order.
    pub fn primary_key_values(&self, schema: &Schema) -> Vec<Value> {
        self.key_tuple(&schema.primary_key_columns())
    }

    /// Whether the instance is marked for deletion by its parent's save.
    pub fn is_marked_for_delete(&self) -> bool {
        self.delete_marker
    }

    /// Set or clear the delete marker.
    pub fn set_delete_marker(&mut self, marked: bool) {
        self.delete_marker = marked;
    }

    /// Builder-style delete marker.
    pub fn marked_for_delete(mut self) -> Self {
        self.delete_marker = true;
        self
    }

    /// Embed a single related instance.
    pub fn with_one(mut self, relationship: impl Into<String>, child: Instance) -> Self {
        self.relations
            .insert(relationship.into(), Related::One(Some(Box::new(child))));
        self
    }

    /// Embed a related collection.
    pub fn with_many(mut self, relationship: impl Into<String>, children: Vec<Instance>) -> Self {
        self.relations
            .insert(relationship.into(), Related::Many(children));
        self
    }

    /// Replace what is embedded under `relationship`.
    pub fn set_related(&mut self, relationship: impl Into<String>, related: Related) {
        self.relations.insert(relationship.into(), related);
    }

    /// Embedded instances under `relationship`.
    pub fn related(&self, relationship: &str) -> Option<&Related> {
        self.relations.get(relationship)
    }

    /// Mutable access to embedded instances under `relationship`.
    pub fn related_mut(&mut self, relationship: &str) -> Option<&mut Related> {
        self.relations.get_mut(relationship)
    }

    /// The has-many collection under `relationship`, empty if absent.
    pub fn many(&self, relationship: &str) -> &[Instance] {
        match self.relations.get(relationship) {
            Some(Related::Many(many)) => many,
            _ => &[],
        }
    }

    /// The has-one instance under `relationship`.
    pub fn one(&self, relationship: &str) -> Option<&Instance> {
        match self.relations.get(relationship) {
            Some(Related::One(one)) => one.as_deref(),
            _ => None,
        }
    }

    /// Check every value against the schema's declared column types.
    pub fn check_types(&self, schema: &Schema) -> Result<(), SchemaError> {
        for (column, value) in &self.values {
            let field = schema.field(column).ok_or_else(|| SchemaError::UnknownColumn {
                schema: schema.name().to_string(),
                column: column.clone(),
            })?;
            if !field.sql_type.accepts(value) {
                return Err(SchemaError::TypeMismatch {
                    schema: schema.name().to_string(),
                    column: column.clone(),
                    expected: field.sql_type.sql_name(),
                    got: value.type_name(),
                });
            }
        }
        Ok(())
    }

    /// JSON form used for notification payloads.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
