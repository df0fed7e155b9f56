//! Engine configuration.

use relcascade_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for [`Mutator`](crate::Mutator) behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deepest relationship level a cascade may reach before it is treated as
    /// a cycle.
    pub max_cascade_depth: usize,
    /// Worker threads running post-commit side effects.
    pub side_effect_workers: usize,
    /// Whether a panicking hook is recovered and the run continues.
    pub recover_hook_panics: bool,
    /// Whether create/update/delete check the root type's own capability
    /// before walking nested collections.
    pub check_root_permissions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: 32,
            side_effect_workers: 2,
            recover_hook_panics: true,
            check_root_permissions: true,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_cascade_depth == 0 {
            return Err(Error::Config("max_cascade_depth must be at least 1".to_string()));
        }
        if self.side_effect_workers == 0 {
            return Err(Error::Config("side_effect_workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Set the cascade depth bound.
    pub fn max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Set the side-effect worker count.
    pub fn side_effect_workers(mut self, workers: usize) -> Self {
        self.side_effect_workers = workers;
        self
    }

    /// Enable/disable hook panic recovery.
    pub fn recover_hook_panics(mut self, value: bool) -> Self {
        self.recover_hook_panics = value;
        self
    }

    /// Enable/disable root capability checks.
    pub fn check_root_permissions(mut self, value: bool) -> Self {
        self.check_root_permissions = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_cascade_depth, 32);
        assert_eq!(config.side_effect_workers, 2);
        assert!(config.recover_hook_panics);
        assert!(config.check_root_permissions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"max_cascade_depth": 4}"#).unwrap();
        assert_eq!(config.max_cascade_depth, 4);
        assert_eq!(config.side_effect_workers, 2);
    }

    #[test]
    fn test_from_json_rejects_zero_depth() {
        let err = EngineConfig::from_json(r#"{"max_cascade_depth": 0}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_builder_zero_workers_invalid() {
        let config = EngineConfig::default().side_effect_workers(0);
        assert!(config.validate().is_err());
    }
}
