//! Configuration types for office-to-pdf conversion.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Wall-clock budget for the conversion step (engine startup excluded).
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Period of the synthetic progress ticker.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(800);

/// Highest value the synthetic ticker may reach.
pub const DEFAULT_TICK_CEILING: u8 = 98;

/// Configuration for a [`Processor`](crate::Processor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum accepted input size in bytes.
    /// Default: 52,428,800 (50 MiB).
    pub max_file_size: u64,

    /// Timeout for the conversion call.
    /// Default: 300 seconds.
    pub conversion_timeout: Duration,

    /// How often the synthetic ticker advances progress while converting.
    /// Default: 800 ms.
    pub tick_interval: Duration,

    /// The ticker stops advancing once progress reaches this value.
    /// Default: 98.
    pub tick_ceiling: u8,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            conversion_timeout: DEFAULT_CONVERSION_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_ceiling: DEFAULT_TICK_CEILING,
        }
    }
}

impl ProcessorConfig {
    /// Set the maximum file size.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Set the conversion timeout.
    pub fn conversion_timeout(mut self, timeout: Duration) -> Self {
        self.conversion_timeout = timeout;
        self
    }

    /// Set the ticker period.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the ticker ceiling.
    pub fn tick_ceiling(mut self, ceiling: u8) -> Self {
        self.tick_ceiling = ceiling;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(EngineError::InvalidConfig(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        if self.conversion_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "conversion_timeout must be greater than 0".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "tick_interval must be greater than 0".to_string(),
            ));
        }
        if self.tick_ceiling >= 100 {
            return Err(EngineError::InvalidConfig(
                "tick_ceiling must be below 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the bundled LibreOffice engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to soffice binary. If None, searches well-known locations and PATH.
    pub soffice_path: Option<PathBuf>,

    /// Directory for the engine's profile and scratch files.
    /// Default: system temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Set the soffice binary path.
    pub fn soffice_path(mut self, path: PathBuf) -> Self {
        self.soffice_path = Some(path);
        self
    }

    /// Set the temporary directory.
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }
}

/// Combined settings, as loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub processor: ProcessorConfig,
    pub engine: EngineConfig,
}

impl Settings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::io("Failed to read settings", path, e))?;
        Self::from_json_str(&raw)
    }

    /// Parse settings from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(raw)
            .map_err(|e| EngineError::InvalidConfig(format!("malformed settings: {}", e)))?;
        settings.processor.validate()?;
        Ok(settings)
    }
}
