//! Field and column definitions.

use crate::types::SqlType;

/// Metadata about a model field/column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name on the model
    pub name: String,
    /// Database column name (may differ from field name)
    pub column_name: String,
    /// Storage type for this field
    pub sql_type: SqlType,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether the field is written on INSERT
    pub creatable: bool,
    /// Whether the field is written on UPDATE
    pub updatable: bool,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    ///
    /// The column name defaults to the field name; the field is creatable and
    /// updatable.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        let name = name.into();
        Self {
            column_name: name.clone(),
            name,
            sql_type,
            nullable: false,
            primary_key: false,
            creatable: true,
            updatable: true,
        }
    }

    /// Set the database column name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = name.into();
        self
    }

    /// Set nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    ///
    /// Primary keys are never rewritten by UPDATE.
    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        if value {
            self.updatable = false;
        }
        self
    }

    /// Set creatable flag.
    pub fn creatable(mut self, value: bool) -> Self {
        self.creatable = value;
        self
    }

    /// Set updatable flag.
    pub fn updatable(mut self, value: bool) -> Self {
        self.updatable = value;
        self
    }

    /// Mark the field as read-only (neither creatable nor updatable).
    pub fn read_only(self) -> Self {
        self.creatable(false).updatable(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_info_defaults() {
        let field = FieldInfo::new("name", SqlType::Text);
        assert_eq!(field.column_name, "name");
        assert!(field.creatable);
        assert!(field.updatable);
        assert!(!field.primary_key);
    }

    #[test]
    fn test_primary_key_is_not_updatable() {
        let field = FieldInfo::new("id", SqlType::BigInt)
            .column("ID")
            .primary_key(true);
        assert_eq!(field.column_name, "ID");
        assert!(field.primary_key);
        assert!(!field.updatable);
        assert!(field.creatable);
    }

    #[test]
    fn test_read_only() {
        let field = FieldInfo::new("display", SqlType::Text).read_only();
        assert!(!field.creatable);
        assert!(!field.updatable);
    }
}
