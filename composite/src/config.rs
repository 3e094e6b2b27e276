//! Configuration types for the runtime

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Errors that can occur while loading or saving a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings shared by state machines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Warnings kept per machine before the oldest are dropped
    pub max_recorded_warnings: usize,
    /// Deferred commands executed per tick; the rest wait for the next tick
    pub max_commands_per_tick: usize,
    /// Log every state change at info level instead of debug
    pub trace_transitions: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_recorded_warnings: 64,
            max_commands_per_tick: 64,
            trace_transitions: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON, missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        debug!(?config, "Parsed runtime config");
        Ok(config.sanitized())
    }

    /// Load a configuration file, falling back to defaults when it does not exist
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = ?path, "No runtime config found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!(path = ?path, "Loaded runtime config");
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = ?path, "Saved runtime config");
        Ok(())
    }

    /// Replace values that would stall a machine with the nearest usable ones
    pub fn sanitized(mut self) -> Self {
        if self.max_commands_per_tick == 0 {
            warn!("max_commands_per_tick of 0 would stall deferred transitions, using 1");
            self.max_commands_per_tick = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_recorded_warnings, 64);
        assert_eq!(config.max_commands_per_tick, 64);
        assert!(!config.trace_transitions);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RuntimeConfig::from_json_str(r#"{"trace_transitions": true}"#).unwrap();
        assert!(config.trace_transitions);
        assert_eq!(config.max_commands_per_tick, 64);
    }

    #[test]
    fn test_zero_commands_per_tick_is_raised() {
        let config = RuntimeConfig::from_json_str(r#"{"max_commands_per_tick": 0}"#).unwrap();
        assert_eq!(config.max_commands_per_tick, 1);
    }

    #[test]
    fn test_invalid_json() {
        let result = RuntimeConfig::from_json_str("{not json");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.json");

        let config = RuntimeConfig {
            max_recorded_warnings: 8,
            max_commands_per_tick: 4,
            trace_transitions: true,
        };
        config.save_to_file(&path).unwrap();

        let loaded = RuntimeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RuntimeConfig::load_from_file(dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, RuntimeConfig::default());
    }
}
