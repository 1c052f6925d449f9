//! Loader configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default capacity of a loader's local cache.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Configuration for a [`crate::CacheLoader`].
///
/// Missing fields fall back to their defaults when deserializing, so a partial document such
/// as `{"max_entries": 64}` is valid.
///
/// # Example
///
/// ```
/// use flight_cache::LoaderConfig;
///
/// let config = LoaderConfig::default()
///     .with_name("profiles")
///     .with_max_entries(10_000);
///
/// assert_eq!(config.name, "profiles");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Name used in log lines to tell loaders apart.
    pub name: String,

    /// Capacity of the local LRU cache. 0 means unbounded.
    pub max_entries: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            name: "default".to_string(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl LoaderConfig {
    /// Set the loader name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the local cache capacity (0 = unbounded).
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the document is malformed or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LoaderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ConfigError(
                "loader name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LoaderConfig::default();
        assert_eq!(config.name, "default");
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LoaderConfig::default().with_name("users").with_max_entries(0);
        assert_eq!(config.name, "users");
        assert_eq!(config.max_entries, 0);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = LoaderConfig::from_json(r#"{"max_entries": 64}"#).expect("valid config");
        assert_eq!(config.name, "default");
        assert_eq!(config.max_entries, 64);
    }

    #[test]
    fn test_config_rejects_empty_name() {
        let err = LoaderConfig::from_json(r#"{"name": "  "}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        let err = LoaderConfig::from_json(r#"{"max_entries": -1}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
