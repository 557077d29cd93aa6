//! Configuration for the recorder and validator.

use crate::collector::DEFAULT_STOP_KEY;
use crate::validate::EarlyEventPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persistent defaults, overridden by environment variables and CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that holds one subdirectory per session
    pub dataset_root: PathBuf,

    /// Target frames per second
    pub fps: u32,

    /// 1-based monitor index
    pub monitor_index: usize,

    /// Key that stops a recording
    pub stop_key: String,

    /// Operator recorded in session metadata
    pub operator: String,

    /// Stop recording after this many seconds
    pub max_duration_secs: Option<f64>,

    /// Frames checked for image shape at each end of a session (0 = none, negative = all)
    pub sample_frames: i64,

    /// How the validator treats events recorded before frame 1
    pub early_events: EarlyEventPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("./dataset"),
            fps: 20,
            monitor_index: 1,
            stop_key: DEFAULT_STOP_KEY.to_uppercase(),
            operator: String::new(),
            max_duration_secs: None,
            sample_frames: 8,
            early_events: EarlyEventPolicy::Warn,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.fps = config.fps.max(1);
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("datagrab")
            .join("config.json")
    }

    /// Apply `DATASET_ROOT`, `OPERATOR_NAME` and `STOP_KEY` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(root) = get("DATASET_ROOT") {
            self.dataset_root = PathBuf::from(root);
        }
        if let Some(operator) = get("OPERATOR_NAME") {
            self.operator = operator.trim().to_string();
        }
        if let Some(key) = get("STOP_KEY") {
            self.stop_key = key.trim().to_string();
        }
    }

    /// Operator name, falling back to the login user when none is configured.
    pub fn effective_operator(&self) -> String {
        if !self.operator.trim().is_empty() {
            return self.operator.trim().to_string();
        }
        ["OPERATOR_NAME", "USER", "USERNAME"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Serialize error: {0}")]
    SerializeError(serde_json::Error),
}
