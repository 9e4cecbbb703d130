use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;
use crate::error::{Result, VoxcheckError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
}

/// Analysis pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: defaults::MIN_ANALYSIS_DELAY_MS,
            max_delay_ms: defaults::MAX_ANALYSIS_DELAY_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. Returns an error if the file
    /// does not exist, contains invalid TOML, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxcheckError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxcheckError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path, or from the default path when none is given
    ///
    /// An explicit path must exist. A missing file at the default path
    /// yields defaults; invalid TOML is an error either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::load(&Self::default_path()) {
                Ok(config) => Ok(config),
                Err(VoxcheckError::ConfigFileNotFound { .. }) => Ok(Self::default()),
                Err(e) => Err(e),
            },
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXCHECK_AUDIO_DEVICE → audio.device
    /// - VOXCHECK_SAMPLE_RATE → audio.sample_rate
    /// - VOXCHECK_MIN_DELAY_MS → analysis.min_delay_ms
    /// - VOXCHECK_MAX_DELAY_MS → analysis.max_delay_ms
    ///
    /// Empty or unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("VOXCHECK_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(rate) = std::env::var("VOXCHECK_SAMPLE_RATE")
            && let Ok(rate) = rate.parse::<u32>()
        {
            self.audio.sample_rate = rate;
        }

        if let Ok(ms) = std::env::var("VOXCHECK_MIN_DELAY_MS")
            && let Ok(ms) = ms.parse::<u64>()
        {
            self.analysis.min_delay_ms = ms;
        }

        if let Ok(ms) = std::env::var("VOXCHECK_MAX_DELAY_MS")
            && let Ok(ms) = ms.parse::<u64>()
        {
            self.analysis.max_delay_ms = ms;
        }

        self
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(VoxcheckError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.analysis.min_delay_ms > self.analysis.max_delay_ms {
            return Err(VoxcheckError::ConfigInvalidValue {
                key: "analysis.min_delay_ms".to_string(),
                message: format!(
                    "must not exceed analysis.max_delay_ms ({} > {})",
                    self.analysis.min_delay_ms, self.analysis.max_delay_ms
                ),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxcheck/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("voxcheck")
            .join("config.toml")
    }
}
