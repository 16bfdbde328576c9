//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/usagelens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/usagelens/` (~/.config/usagelens/)
//! - Data: `$XDG_DATA_HOME/usagelens/` (~/.local/share/usagelens/)
//! - State/Logs: `$XDG_STATE_HOME/usagelens/` (~/.local/state/usagelens/)

use crate::error::{Error, Result};
use crate::time::fill::MAX_FILL_POINTS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Usage store location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Statistics engine tuning
    #[serde(default)]
    pub stats: StatsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Usage store location override
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite usage store (defaults to the XDG data dir)
    pub path: Option<PathBuf>,
}

/// Statistics engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    /// Entries kept before the "Other" bucket in top-N rankings
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Trailing days shown by the KPI trend
    #[serde(default = "default_kpi_days")]
    pub kpi_days: u32,

    /// Standard deviations above the mean that count as an anomaly
    #[serde(default = "default_anomaly_sigma")]
    pub anomaly_sigma: f64,

    /// Days covered by the activity heatmap
    #[serde(default = "default_heatmap_days")]
    pub heatmap_days: u32,

    /// Read rollup tables when they are usable
    #[serde(default = "default_prefer_rollups")]
    pub prefer_rollups: bool,

    /// First hour (inclusive) of the night-owl window
    #[serde(default = "default_night_start_hour")]
    pub night_start_hour: u32,

    /// Last hour (exclusive) of the night-owl window
    #[serde(default = "default_night_end_hour")]
    pub night_end_hour: u32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            kpi_days: default_kpi_days(),
            anomaly_sigma: default_anomaly_sigma(),
            heatmap_days: default_heatmap_days(),
            prefer_rollups: default_prefer_rollups(),
            night_start_hour: default_night_start_hour(),
            night_end_hour: default_night_end_hour(),
        }
    }
}

impl StatsConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::Config("stats.top_n must be at least 1".to_string()));
        }
        let max_days = MAX_FILL_POINTS as u32;
        if !(1..=max_days).contains(&self.kpi_days) {
            return Err(Error::Config(format!(
                "stats.kpi_days must be between 1 and {}",
                max_days
            )));
        }
        if !(1..=max_days).contains(&self.heatmap_days) {
            return Err(Error::Config(format!(
                "stats.heatmap_days must be between 1 and {}",
                max_days
            )));
        }
        if self.anomaly_sigma.is_nan() || self.anomaly_sigma <= 0.0 {
            return Err(Error::Config(
                "stats.anomaly_sigma must be positive".to_string(),
            ));
        }
        if self.night_start_hour > 23 || self.night_end_hour > 23 {
            return Err(Error::Config(
                "stats.night_start_hour and stats.night_end_hour must be between 0 and 23"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn default_top_n() -> usize {
    5
}

fn default_kpi_days() -> u32 {
    7
}

fn default_anomaly_sigma() -> f64 {
    2.0
}

fn default_heatmap_days() -> u32 {
    365
}

fn default_prefer_rollups() -> bool {
    true
}

fn default_night_start_hour() -> u32 {
    22
}

fn default_night_end_hour() -> u32 {
    6
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.stats.validate()?;
        Ok(config)
    }

    /// Returns the store path, honouring `[database] path`
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/usagelens/config.toml` (~/.config/usagelens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("usagelens").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite store)
    ///
    /// `$XDG_DATA_HOME/usagelens/` (~/.local/share/usagelens/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("usagelens")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/usagelens/` (~/.local/state/usagelens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("usagelens")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/usagelens/usage.db` (~/.local/share/usagelens/usage.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("usage.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/usagelens/usagelens.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("usagelens.log")
    }
}
