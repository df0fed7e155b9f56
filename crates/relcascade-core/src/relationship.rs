//! Relationship metadata for relcascade.
//!
//! Relationships are declared once on each `Schema` and resolved through the
//! schema registry. The cascading engine walks them to find the rows owned by
//! a parent; nothing here is derived per request.

/// The kind of relationship between two schemas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// One-to-one owned by the parent: `Order` has one `Invoice`.
    HasOne,
    /// One-to-many owned by the parent: `Order` has many `OrderLine`s.
    #[default]
    HasMany,
    /// Many-to-one: `OrderLine` belongs to a `Product`.
    BelongsTo,
}

impl RelationshipKind {
    /// Whether the declaring schema owns the related rows.
    pub const fn is_owning(&self) -> bool {
        matches!(self, RelationshipKind::HasOne | RelationshipKind::HasMany)
    }

    /// Short name used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::HasOne => "has_one",
            RelationshipKind::HasMany => "has_many",
            RelationshipKind::BelongsTo => "belongs_to",
        }
    }
}

/// One column pair of a relationship's key mapping.
///
/// For has-one/has-many, `local_column` is on the declaring (parent) table and
/// `remote_column` is the child's foreign-key column. For belongs-to,
/// `local_column` is the declaring table's foreign key and `remote_column` the
/// referenced key of the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyReference {
    /// Column on the declaring table.
    pub local_column: String,
    /// Column on the related table.
    pub remote_column: String,
}

impl KeyReference {
    /// Create a new key reference.
    pub fn new(local_column: impl Into<String>, remote_column: impl Into<String>) -> Self {
        Self {
            local_column: local_column.into(),
            remote_column: remote_column.into(),
        }
    }

    /// The column holding the foreign key, given the relationship kind.
    pub fn foreign_key_column(&self, kind: RelationshipKind) -> &str {
        if kind.is_owning() {
            &self.remote_column
        } else {
            &self.local_column
        }
    }
}

/// Metadata about a relationship between schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipInfo {
    /// Name of the relationship field.
    pub name: String,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Type name of the related schema.
    pub child: String,

    /// Ordered key mapping; more than one entry is a composite key.
    pub references: Vec<KeyReference>,

    /// Whether cascading logic may write through this relationship.
    /// `false` marks a read-only join.
    pub updatable: bool,
}

impl RelationshipInfo {
    /// Create a new relationship with required fields.
    pub fn new(name: impl Into<String>, kind: RelationshipKind, child: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            child: child.into(),
            references: Vec::new(),
            updatable: true,
        }
    }

    /// Shorthand for a has-one relationship.
    pub fn has_one(name: impl Into<String>, child: impl Into<String>) -> Self {
        Self::new(name, RelationshipKind::HasOne, child)
    }

    /// Shorthand for a has-many relationship.
    pub fn has_many(name: impl Into<String>, child: impl Into<String>) -> Self {
        Self::new(name, RelationshipKind::HasMany, child)
    }

    /// Shorthand for a belongs-to relationship.
    pub fn belongs_to(name: impl Into<String>, child: impl Into<String>) -> Self {
        Self::new(name, RelationshipKind::BelongsTo, child)
    }

    /// Append a key column pair.
    pub fn reference(
        mut self,
        local_column: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        self.references
            .push(KeyReference::new(local_column, remote_column));
        self
    }

    /// Enable/disable cascading writes.
    pub fn updatable(mut self, value: bool) -> Self {
        self.updatable = value;
        self
    }

    /// Whether the key mapping spans more than one column.
    pub fn is_composite(&self) -> bool {
        self.references.len() > 1
    }

    /// Read-only joins are named with a leading underscore.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('_')
    }

    /// Whether cascading deletes and reconciliation walk this relationship.
    pub fn cascades(&self) -> bool {
        self.updatable && self.kind.is_owning()
    }

    /// Columns on the declaring table that this relationship reads.
    pub fn local_columns(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|r| r.local_column.as_str())
    }

    /// Columns on the related table that this relationship reads.
    pub fn remote_columns(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|r| r.remote_column.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_kind_default() {
        assert_eq!(RelationshipKind::default(), RelationshipKind::HasMany);
        assert!(RelationshipKind::HasOne.is_owning());
        assert!(!RelationshipKind::BelongsTo.is_owning());
    }

    #[test]
    fn test_relationship_info_builder_chain() {
        let info = RelationshipInfo::has_many("lines", "OrderLine")
            .reference("id", "order_id")
            .reference("region", "order_region")
            .updatable(true);

        assert_eq!(info.name, "lines");
        assert_eq!(info.child, "OrderLine");
        assert_eq!(info.kind, RelationshipKind::HasMany);
        assert!(info.is_composite());
        assert!(info.cascades());
        assert_eq!(
            info.remote_columns().collect::<Vec<_>>(),
            vec!["order_id", "order_region"]
        );
    }

    #[test]
    fn test_read_only_join() {
        let info = RelationshipInfo::has_many("_history", "Audit")
            .reference("id", "order_id")
            .updatable(false);
        assert!(info.is_hidden());
        assert!(!info.cascades());
    }

    #[test]
    fn test_foreign_key_column_side() {
        let owning = KeyReference::new("id", "order_id");
        assert_eq!(owning.foreign_key_column(RelationshipKind::HasMany), "order_id");
        let belongs = KeyReference::new("product_id", "id");
        assert_eq!(
            belongs.foreign_key_column(RelationshipKind::BelongsTo),
            "product_id"
        );
    }
}
