use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::operation_mode::OperationMode;
use crate::detection::infrastructure::edge_detector::EdgeDetectorConfig;
use crate::detection::infrastructure::feature_cascade_detector::CascadeDetectorConfig;
use crate::shared::constants::{
    APP_DIR_NAME, CYCLE_PAUSE_MS, DEFAULT_MAX_VERTICES, DEFAULT_REFRESH_RATE, ITEM_BUDGET,
    ITEM_INTERVAL_MS, STARTUP_DELAY_MS,
};
use crate::tracking::domain::throttle::ThrottlePolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Worker pacing in milliseconds, as stored in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub startup_delay_ms: u64,
    pub cycle_pause_ms: u64,
    /// Vertex writes admitted per `item_interval_ms`; 0 disables item pacing.
    pub item_budget: u32,
    pub item_interval_ms: u64,
}

impl ThrottleSettings {
    pub fn to_policy(self) -> ThrottlePolicy {
        ThrottlePolicy {
            startup_delay: Duration::from_millis(self.startup_delay_ms),
            cycle_pause: Duration::from_millis(self.cycle_pause_ms),
            item_budget: self.item_budget,
            item_interval: Duration::from_millis(self.item_interval_ms),
        }
    }

    pub fn unthrottled() -> Self {
        Self {
            startup_delay_ms: 0,
            cycle_pause_ms: 0,
            item_budget: 0,
            item_interval_ms: 0,
        }
    }
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            startup_delay_ms: STARTUP_DELAY_MS,
            cycle_pause_ms: CYCLE_PAUSE_MS,
            item_budget: ITEM_BUDGET,
            item_interval_ms: ITEM_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_vertices: usize,
    pub mode: OperationMode,
    pub edge: EdgeDetectorConfig,
    pub cascade: CascadeDetectorConfig,
    pub throttle: ThrottleSettings,
    /// Host frame rate in frames per second.
    pub refresh_rate: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_vertices: DEFAULT_MAX_VERTICES,
            mode: OperationMode::default(),
            edge: EdgeDetectorConfig::default(),
            cascade: CascadeDetectorConfig::default(),
            throttle: ThrottleSettings::default(),
            refresh_rate: DEFAULT_REFRESH_RATE,
        }
    }
}

impl TrackerConfig {
    /// `<config dir>/FanCam/tracker.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("tracker.json"))
    }

    /// Reads and validates a config file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        log::debug!("Loaded tracker config from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given; otherwise the platform config file if it
    /// exists, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Encode)?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_vertices == 0 {
            return Err(ConfigError::Invalid("max_vertices must be at least 1".into()));
        }
        if !self.refresh_rate.is_finite() || self.refresh_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "refresh_rate must be positive, got {}",
                self.refresh_rate
            )));
        }
        Ok(())
    }

    pub fn throttle_policy(&self) -> ThrottlePolicy {
        self.throttle.to_policy()
    }
}
