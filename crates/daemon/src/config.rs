//! Configuration for the StreamDrain reference daemon.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Top-level daemon config
// ---------------------------------------------------------------------------

/// Configuration for the consumer daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Daemon process settings.
    #[serde(default)]
    pub daemon: DaemonSection,

    /// Topic the consumer subscribes to.
    #[serde(default)]
    pub topic: TopicConfig,

    /// Synthetic record feed driving the in-process topic.
    #[serde(default)]
    pub feed: FeedConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonSection::default(),
            topic: TopicConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon section
// ---------------------------------------------------------------------------

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSection {
    /// Timeout handed to each blocking poll call, in milliseconds.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for runtime data (PID file, background-mode logs).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".into()
}

fn default_data_dir() -> PathBuf {
    // Platform-appropriate location, falling back to the working directory.
    dirs::data_local_dir()
        .map(|dir| dir.join("streamdrain"))
        .unwrap_or_else(|| PathBuf::from(".streamdrain"))
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// The subscribed topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic name.
    #[serde(default = "default_topic_name")]
    pub name: String,

    /// Maximum records returned by a single poll.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: default_topic_name(),
            max_batch: default_max_batch(),
        }
    }
}

fn default_topic_name() -> String {
    "demo_records".into()
}

fn default_max_batch() -> usize {
    64
}

// ---------------------------------------------------------------------------
// Demo feed
// ---------------------------------------------------------------------------

/// The built-in synthetic producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Whether the feed produces records at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Milliseconds between produced records.
    #[serde(default = "default_feed_interval_ms")]
    pub interval_ms: u64,

    /// Number of partitions records are spread across.
    #[serde(default = "default_partitions")]
    pub partitions: i32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_ms: default_feed_interval_ms(),
            partitions: default_partitions(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_feed_interval_ms() -> u64 {
    250
}

fn default_partitions() -> i32 {
    3
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl DaemonConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::IoError(e)
            }
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load a config file, or fall back to defaults when it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daemon.poll_timeout_ms".into(),
                detail: "must be greater than zero".into(),
            });
        }
        if self.topic.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "topic.name".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.topic.max_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "topic.max_batch".into(),
                detail: "must be greater than zero".into(),
            });
        }
        if self.feed.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.interval_ms".into(),
                detail: "must be greater than zero".into(),
            });
        }
        if self.feed.partitions <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.partitions".into(),
                detail: "must be at least one".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [topic]
            name = "orders"
            "#,
        )
        .unwrap();

        assert_eq!(config.topic.name, "orders");
        assert_eq!(config.topic.max_batch, 64);
        assert_eq!(config.daemon.poll_timeout_ms, 1000);
        assert_eq!(config.daemon.log_level, "info");
        assert!(config.feed.enabled);
        assert_eq!(config.feed.partitions, 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_config_is_fully_defaulted() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.topic.name, "demo_records");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_poll_timeout() {
        let mut config = DaemonConfig::default();
        config.daemon.poll_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("daemon.poll_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_empty_topic() {
        let mut config = DaemonConfig::default();
        config.topic.name = "  ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("topic.name"));
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let err = DaemonConfig::load(Path::new("/nonexistent/streamdrain.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let config =
            DaemonConfig::load_or_default(Path::new("/nonexistent/streamdrain.toml")).unwrap();
        assert_eq!(config.topic.name, "demo_records");
    }
}
