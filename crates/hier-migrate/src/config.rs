//! Migration engine configuration

use hier_model::WorkItemType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Type whose nearest ancestor scopes the candidate-parent search
    pub anchor_type: WorkItemType,
    /// Persist job progress every N moves (0: only when the job ends)
    pub progress_every: usize,
    /// Switch the tenant's active preset after a successful APPLY run
    pub activate_preset_on_apply: bool,
}

impl MigratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML; missing keys take their defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed input.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError` if the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// With anchor type
    #[inline]
    #[must_use]
    pub fn with_anchor_type(mut self, anchor: WorkItemType) -> Self {
        self.anchor_type = anchor;
        self
    }

    /// With progress interval
    #[inline]
    #[must_use]
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    /// With preset activation on apply
    #[inline]
    #[must_use]
    pub fn with_preset_activation(mut self, enabled: bool) -> Self {
        self.activate_preset_on_apply = enabled;
        self
    }
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            anchor_type: WorkItemType::Product,
            progress_every: 25,
            activate_preset_on_apply: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = MigratorConfig::new();
        assert_eq!(config.anchor_type, WorkItemType::Product);
        assert_eq!(config.progress_every, 25);
        assert!(config.activate_preset_on_apply);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MigratorConfig::from_toml_str("anchor_type = \"company\"\n").unwrap();
        assert_eq!(config.anchor_type, WorkItemType::Company);
        assert_eq!(config.progress_every, 25);
    }

    #[test]
    fn rejects_unknown_anchor() {
        let err = MigratorConfig::from_toml_str("anchor_type = \"portfolio\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "progress_every = 0").unwrap();
        writeln!(file, "activate_preset_on_apply = false").unwrap();

        let config = MigratorConfig::load(file.path()).unwrap();
        assert_eq!(config.progress_every, 0);
        assert!(!config.activate_preset_on_apply);
    }
}
