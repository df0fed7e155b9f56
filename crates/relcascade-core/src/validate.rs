//! Identifier validation for schema metadata.
//!
//! Table and column names end up inside rendered SQL, so the registry rejects
//! anything that is not a plain identifier when it is built.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::SchemaError;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Compiled identifier pattern, built on first use.
fn identifier_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| match Regex::new(IDENTIFIER_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!(
                    target: "relcascade::validate",
                    error = %e,
                    "identifier pattern failed to compile"
                );
                None
            }
        })
        .as_ref()
}

/// Check whether `name` is a plain SQL identifier.
pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(name))
}

/// Validate a table or column name.
pub fn validate_identifier(owner: &str, name: &str) -> Result<(), SchemaError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}
