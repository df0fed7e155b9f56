//! Actions that capability checks are made for.

use std::fmt;

/// An action the caller wants to perform on a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Read rows of the type.
    Read,
    /// Insert rows of the type.
    Create,
    /// Update rows of the type.
    Update,
    /// Delete rows of the type.
    Delete,
}

impl Action {
    /// Suffix appended to a permission prefix to form a capability key.
    pub const fn capability_suffix(&self) -> &'static str {
        match self {
            Action::Read => "GET",
            Action::Create => "POST",
            Action::Update => "PATCH",
            Action::Delete => "DELETE",
        }
    }

    /// Capability key for `prefix`, e.g. `ORDERS_DELETE`.
    pub fn capability(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.capability_suffix())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_keys() {
        assert_eq!(Action::Read.capability("ORDERS"), "ORDERS_GET");
        assert_eq!(Action::Create.capability("ORDERS"), "ORDERS_POST");
        assert_eq!(Action::Update.capability("ORDERS"), "ORDERS_PATCH");
        assert_eq!(Action::Delete.capability("ORDERS"), "ORDERS_DELETE");
    }
}
