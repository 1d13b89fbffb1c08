use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::connection::ConnectionMonitor;
use crate::poll_state::BackoffSchedule;
use crate::tree::TreeLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub console: ConsoleConfig,
    pub execution: ExecutionConfig,
    pub review: ReviewConfig,
    pub tree: TreeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub runs_limit: usize,
    pub replay_limit: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_backoff_ms: 30_000,
            runs_limit: 15,
            replay_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub tick_ms: u64,
    pub base_interval_ms: u64,
    pub medium_interval_ms: u64,
    pub slow_interval_ms: u64,
    pub medium_after_ms: u64,
    pub slow_after_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            base_interval_ms: 500,
            medium_interval_ms: 1000,
            slow_interval_ms: 2000,
            medium_after_ms: 5000,
            slow_after_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub diff_max_lines: usize,
    pub max_reasons_shown: usize,
    pub max_files_shown: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            diff_max_lines: crate::diff_preview::DEFAULT_PREVIEW_LINES,
            max_reasons_shown: 5,
            max_files_shown: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub max_entries: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        let limits = TreeLimits::default();
        Self {
            max_depth: limits.max_depth,
            max_entries: limits.max_entries,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw, path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.execution.tick_ms.max(1))
    }

    pub fn backoff_schedule(&self) -> BackoffSchedule {
        let exec = &self.execution;
        BackoffSchedule {
            base: Duration::from_millis(exec.base_interval_ms),
            medium: Duration::from_millis(exec.medium_interval_ms),
            slow: Duration::from_millis(exec.slow_interval_ms),
            medium_after: Duration::from_millis(exec.medium_after_ms),
            slow_after: Duration::from_millis(exec.slow_after_ms),
        }
    }

    pub fn connection_monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor::new(
            Duration::from_millis(self.console.poll_interval_ms),
            Duration::from_millis(self.console.max_backoff_ms),
        )
    }

    pub fn tree_limits(&self) -> TreeLimits {
        TreeLimits {
            max_depth: self.tree.max_depth,
            max_entries: self.tree.max_entries,
        }
    }
}
