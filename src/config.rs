//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::DEFAULT_BROADCAST_TIMEOUT;

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;
pub const DEFAULT_DISPATCHERS: usize = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Knobs shared by every dispatcher of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Workers per dispatcher
    pub workers: usize,

    /// Inbound queue capacity per dispatcher
    pub queue_capacity: usize,

    /// How long a broadcast waits on a full queue
    #[serde(with = "humantime_serde")]
    pub broadcast_timeout: Duration,

    /// Dispatchers subscribed to the producer
    pub dispatchers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            dispatchers: DEFAULT_DISPATCHERS,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        if self.dispatchers == 0 {
            return Err(ConfigError::Zero("dispatchers"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.queue_capacity, 20);
        assert_eq!(config.broadcast_timeout, Duration::from_secs(60));
        assert_eq!(config.dispatchers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config(r#"{"workers": 8, "broadcast_timeout": "250ms"}"#);
        let config = PipelineConfig::load(file.path()).unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.broadcast_timeout, Duration::from_millis(250));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.dispatchers, DEFAULT_DISPATCHERS);
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        let file = write_config("{ workers: ");
        assert!(matches!(
            PipelineConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PipelineConfig::load(dir.path().join("absent.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn zero_sizes_fail_validation() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero("queue_capacity"))
        ));

        let config = PipelineConfig {
            dispatchers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("dispatchers"))));
    }
}
