//! Error types.
//!
//! A mutation either succeeds completely or fails with exactly one `Error`.
//! Two conditions are recovered locally and never reach callers: a child that
//! is already gone from storage, and [`Error::SkipDelete`] raised by a delete
//! extension.

use std::fmt;

use thiserror::Error;

use crate::action::Action;

/// Result alias used across relcascade crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller lacks a capability; the first denial found aborts the request.
    #[error("insufficient permissions: {action} on {type_name} requires {capability}")]
    PermissionDenied {
        /// Type the check was made for.
        type_name: String,
        /// Denied action.
        action: Action,
        /// Capability key that was missing.
        capability: String,
    },

    /// A relationship filter could not be built (null key component).
    ///
    /// Bulk relation deletes record this per relationship and continue with
    /// sibling relationships instead of returning it.
    #[error("cannot resolve relationship {relationship} of {parent}: {reason}")]
    RelationUnresolvable {
        /// Parent schema name.
        parent: String,
        /// Relationship name.
        relationship: String,
        /// What went wrong.
        reason: String,
    },

    /// Underlying storage failure; always rolls back the enclosing transaction.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Raised by a delete extension to veto one delete step.
    ///
    /// The delete pipeline turns this into a successful no-op.
    #[error("delete skipped")]
    SkipDelete,

    /// The cascade went deeper than the configured bound.
    #[error("cascade depth {depth} exceeded at {type_name}; check for cyclic relationships")]
    CascadeCycle {
        /// Schema being processed when the bound was hit.
        type_name: String,
        /// Depth reached.
        depth: usize,
    },

    /// Schema metadata problem.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this is the delete-veto sentinel.
    pub const fn is_skip_delete(&self) -> bool {
        matches!(self, Error::SkipDelete)
    }

    /// Whether this error is storage-class (aborts and rolls back).
    pub const fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::CascadeCycle { .. })
    }

    /// Shorthand for a query failure.
    pub fn query(message: impl Into<String>) -> Self {
        Error::Storage(StorageError::new(StorageErrorKind::Query, message))
    }
}

/// Category of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Connection lost or unavailable.
    Connection,
    /// Statement failed to execute.
    Query,
    /// Constraint violated (unique, foreign key, not-null).
    Constraint,
    /// Transaction could not begin, commit or roll back.
    Transaction,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageErrorKind::Connection => "connection",
            StorageErrorKind::Query => "query",
            StorageErrorKind::Constraint => "constraint",
            StorageErrorKind::Transaction => "transaction",
        };
        f.write_str(s)
    }
}

/// Storage failure reported by a backend.
#[derive(Debug, Clone)]
pub struct StorageError {
    /// Category.
    pub kind: StorageErrorKind,
    /// Table involved, if known.
    pub table: Option<String>,
    /// Backend message.
    pub message: String,
}

impl StorageError {
    /// Create a storage error without table context.
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            message: message.into(),
        }
    }

    /// Attach the table the failure happened on.
    pub fn on_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{} error on {}: {}", self.kind, table, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for StorageError {}

/// Schema metadata problems, detected at registry build or lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No schema registered under this type name.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// A schema was registered twice.
    #[error("schema '{0}' registered twice")]
    DuplicateSchema(String),

    /// Relationship not declared on the schema.
    #[error("schema '{schema}' has no relationship '{relationship}'")]
    UnknownRelationship {
        /// Schema name.
        schema: String,
        /// Relationship name.
        relationship: String,
    },

    /// Column not declared on the schema.
    #[error("schema '{schema}' has no column '{column}'")]
    UnknownColumn {
        /// Schema name.
        schema: String,
        /// Column name.
        column: String,
    },

    /// Table or column name is not a plain identifier.
    #[error("'{name}' in '{owner}' is not a valid identifier")]
    InvalidIdentifier {
        /// Schema the name belongs to.
        owner: String,
        /// The rejected name.
        name: String,
    },

    /// Relationship declared without any key columns.
    #[error("relationship '{relationship}' of '{schema}' has no key references")]
    EmptyReferences {
        /// Schema name.
        schema: String,
        /// Relationship name.
        relationship: String,
    },

    /// Instance carries a value of the wrong storage type.
    #[error("column '{column}' of '{schema}' expects {expected}, got {got}")]
    TypeMismatch {
        /// Schema name.
        schema: String,
        /// Column name.
        column: String,
        /// Declared storage type.
        expected: &'static str,
        /// Type of the offending value.
        got: &'static str,
    },
}
