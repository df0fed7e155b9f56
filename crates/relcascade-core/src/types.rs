//! Storage types of schema fields.

use crate::value::Value;

/// The storage type a field is persisted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlType {
    /// BOOLEAN
    Boolean,
    /// INTEGER (32-bit)
    Integer,
    /// BIGINT (64-bit)
    #[default]
    BigInt,
    /// DOUBLE PRECISION
    Double,
    /// TEXT / VARCHAR
    Text,
    /// BLOB / BYTEA
    Blob,
}

impl SqlType {
    /// SQL name of the type.
    #[must_use]
    pub const fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
        }
    }

    /// Whether a value may be stored in a column of this type.
    ///
    /// NULL is accepted by every type; nullability is a schema concern.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (SqlType::Boolean, Value::Bool(_))
                | (SqlType::Integer, Value::Int(_))
                | (SqlType::BigInt, Value::Int(_) | Value::BigInt(_))
                | (SqlType::Double, Value::Double(_) | Value::Int(_) | Value::BigInt(_))
                | (SqlType::Text, Value::Text(_))
                | (SqlType::Blob, Value::Bytes(_))
        )
    }

    /// The zero value of this type.
    pub fn zero(&self) -> Value {
        match self {
            SqlType::Boolean => Value::Bool(false),
            SqlType::Integer => Value::Int(0),
            SqlType::BigInt => Value::BigInt(0),
            SqlType::Double => Value::Double(0.0),
            SqlType::Text => Value::Text(String::new()),
            SqlType::Blob => Value::Bytes(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_widening() {
        assert!(SqlType::BigInt.accepts(&Value::Int(1)));
        assert!(!SqlType::Integer.accepts(&Value::BigInt(1)));
        assert!(SqlType::Text.accepts(&Value::Null));
        assert!(!SqlType::Text.accepts(&Value::Bool(true)));
    }

    #[test]
    fn test_zero_is_zero() {
        for ty in [
            SqlType::Boolean,
            SqlType::Integer,
            SqlType::BigInt,
            SqlType::Double,
            SqlType::Text,
            SqlType::Blob,
        ] {
            assert!(ty.zero().is_zero(), "{}", ty.sql_name());
        }
    }
}
