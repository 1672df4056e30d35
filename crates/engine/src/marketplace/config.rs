//! Marketplace configuration via `oddjobz.toml`
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Values are validated eagerly when loaded.

use oddjobz_core::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name placed in the service data directory.
pub const CONFIG_FILE_NAME: &str = "oddjobz.toml";

/// Store connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreSection {
    /// Bound on every wait for a key lock, in milliseconds (default: 500)
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    500
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FanoutSection {
    /// Follower timelines updated per script (default: 64)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    64
}

impl Default for FanoutSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

/// Timeline retention settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimelineSection {
    /// Keep at most this many entries per timeline (default: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

/// Timeline read settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReaderSection {
    /// Page size used when the caller does not pick one (default: 10)
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Upper bound on any requested page size (default: 100)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_page_size() -> usize {
    10
}

fn default_max_page_size() -> usize {
    100
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Marketplace configuration loaded from `oddjobz.toml`.
///
/// # Example
///
/// ```toml
/// [store]
/// lock_timeout_ms = 500
///
/// [fanout]
/// batch_size = 64
///
/// [timeline]
/// max_len = 1000
///
/// [reader]
/// default_page_size = 10
/// max_page_size = 100
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketConfig {
    /// Store settings
    #[serde(default)]
    pub store: StoreSection,
    /// Fan-out settings
    #[serde(default)]
    pub fanout: FanoutSection,
    /// Retention settings
    #[serde(default)]
    pub timeline: TimelineSection,
    /// Read settings
    #[serde(default)]
    pub reader: ReaderSection,
}

impl MarketConfig {
    /// Lock timeout as a `Duration`
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.store.lock_timeout_ms)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Config` if any value is out of range.
    pub fn validate(&self) -> MarketResult<()> {
        if self.store.lock_timeout_ms == 0 {
            return Err(MarketError::config("store.lock_timeout_ms must be positive"));
        }
        if self.fanout.batch_size == 0 {
            return Err(MarketError::config("fanout.batch_size must be positive"));
        }
        if self.timeline.max_len == Some(0) {
            return Err(MarketError::config(
                "timeline.max_len must be positive when set",
            ));
        }
        if self.reader.max_page_size == 0 {
            return Err(MarketError::config("reader.max_page_size must be positive"));
        }
        if self.reader.default_page_size == 0
            || self.reader.default_page_size > self.reader.max_page_size
        {
            return Err(MarketError::config(format!(
                "reader.default_page_size must be in 1..={}",
                self.reader.max_page_size
            )));
        }
        Ok(())
    }

    /// Parse config from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> MarketResult<Self> {
        let config: MarketConfig = toml::from_str(content)
            .map_err(|e| MarketError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# oddjobz marketplace core configuration

[store]
# Bound on every wait for a key lock, in milliseconds.
# A script that cannot lock a key in time fails with StoreTimeout.
lock_timeout_ms = 500

[fanout]
# Follower timelines updated per script when publishing.
batch_size = 64

[timeline]
# Keep at most this many entries per timeline. Unbounded when unset.
# max_len = 1000

[reader]
default_page_size = 10
max_page_size = 100
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> MarketResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MarketError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            MarketError::config(format!("{} ({})", e, path.display()))
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> MarketResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                MarketError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> MarketResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MarketError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            MarketError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = MarketConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(500));
        assert_eq!(config.fanout.batch_size, 64);
        assert_eq!(config.timeline.max_len, None);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = MarketConfig::from_toml_str("").unwrap();
        assert_eq!(config, MarketConfig::default());
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config = MarketConfig::from_toml_str(MarketConfig::default_toml()).unwrap();
        assert_eq!(config, MarketConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = MarketConfig::from_toml_str("[timeline]\nmax_len = 3\n").unwrap();
        assert_eq!(config.timeline.max_len, Some(3));
        assert_eq!(config.reader.max_page_size, 100);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = MarketConfig::from_toml_str("[fanout]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }

    #[test]
    fn page_size_above_max_is_rejected() {
        let err = MarketConfig::from_toml_str(
            "[reader]\ndefault_page_size = 50\nmax_page_size = 20\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_page_size"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = MarketConfig::from_toml_str("[store\n").unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        MarketConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        assert_eq!(MarketConfig::from_file(&path).unwrap(), MarketConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[fanout]\nbatch_size = 8\n").unwrap();

        MarketConfig::write_default_if_missing(&path).unwrap();

        let config = MarketConfig::from_file(&path).unwrap();
        assert_eq!(config.fanout.batch_size, 8);
    }

    #[test]
    fn write_to_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = MarketConfig::default();
        config.timeline.max_len = Some(250);
        config.store.lock_timeout_ms = 75;

        config.write_to_file(&path).unwrap();
        assert_eq!(MarketConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = MarketConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }
}
