//! Configuration file support for breathe.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/breathe/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fastest supported session speed-up
pub const MAX_TIME_SCALE: f64 = 1000.0;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,

    #[serde(default)]
    pub patterns: PatternsConfig,
}

/// Session scheduling configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tick cadence while a session is running
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Clock speed multiplier; 1.0 is real time
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            time_scale: default_time_scale(),
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Haptic feedback configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_enabled")]
    pub enabled: bool,

    /// Phase pulses below this intensity are suppressed
    #[serde(default)]
    pub min_intensity: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_feedback_enabled(),
            min_intensity: 0.0,
        }
    }
}

/// Extra pattern sources
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PatternsConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

// Default value functions
fn default_tick_interval_ms() -> u64 {
    50
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_feedback_enabled() -> bool {
    true
}

/// Time scales must be positive and at most `MAX_TIME_SCALE`
pub fn check_time_scale(scale: f64) -> Result<()> {
    if scale > 0.0 && scale <= MAX_TIME_SCALE {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "time_scale must be within (0, {}], got {}",
            MAX_TIME_SCALE, scale
        )))
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject settings the session runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.session.tick_interval_ms == 0 {
            return Err(Error::Config("session.tick_interval_ms must be > 0".into()));
        }
        check_time_scale(self.session.time_scale)?;
        if !(0.0..=1.0).contains(&self.feedback.min_intensity) {
            return Err(Error::Config(format!(
                "feedback.min_intensity must be within [0.0, 1.0], got {}",
                self.feedback.min_intensity
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let base = match dirs::config_dir() {
            Some(dir) => dir,
            None => {
                let home = std::env::var("HOME")
                    .map_err(|_| Error::Config("HOME environment variable not set".into()))?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("breathe").join("config.toml"))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
