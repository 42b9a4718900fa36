//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/hydrate/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/hydrate/` (~/.config/hydrate/)
//! - Data: `$XDG_DATA_HOME/hydrate/` (~/.local/share/hydrate/)
//! - State/Logs: `$XDG_STATE_HOME/hydrate/` (~/.local/state/hydrate/)
//!
//! The shared directory used to exchange progress between the main process
//! and the widget defaults to `$XDG_DATA_HOME/hydrate/shared/`.

use crate::error::{Error, Result};
use crate::grid::{FillStrategy, GridGeometry, WaveParams};
use crate::types::{BeverageKind, VolumeUnit};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Daily goal used whenever no goal has been configured.
pub const DEFAULT_DAILY_GOAL_ML: i64 = 3000;

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
    /// Goal, unit and quick-add presets
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Progress grid geometry and fill behavior
    #[serde(default)]
    pub grid: GridConfig,

    /// Cross-process shared store settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Reminder toggle (scheduling lives outside this crate)
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Goal and logging presets
#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    /// Daily goal in milliliters
    #[serde(default = "default_daily_goal")]
    pub daily_goal_ml: i64,

    /// Display unit
    #[serde(default)]
    pub unit: VolumeUnit,

    /// Quick-add presets, in display order
    #[serde(default = "default_quick_selections")]
    pub quick_selections: Vec<QuickSelection>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            daily_goal_ml: default_daily_goal(),
            unit: VolumeUnit::default(),
            quick_selections: default_quick_selections(),
        }
    }
}

fn default_daily_goal() -> i64 {
    DEFAULT_DAILY_GOAL_ML
}

/// A preset volume/beverage pair for one-tap logging
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct QuickSelection {
    #[serde(default)]
    pub kind: BeverageKind,
    pub volume_ml: i64,
}

fn default_quick_selections() -> Vec<QuickSelection> {
    vec![
        QuickSelection {
            kind: BeverageKind::Water,
            volume_ml: 250,
        },
        QuickSelection {
            kind: BeverageKind::Water,
            volume_ml: 500,
        },
        QuickSelection {
            kind: BeverageKind::Coffee,
            volume_ml: 200,
        },
        QuickSelection {
            kind: BeverageKind::Tea,
            volume_ml: 300,
        },
    ]
}

/// Grid configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GridConfig {
    #[serde(default = "default_grid_rows")]
    pub rows: usize,

    #[serde(default = "default_grid_columns")]
    pub columns: usize,

    /// How many cells a newly logged volume fills
    #[serde(default)]
    pub fill_strategy: FillStrategy,

    /// Perturb the fill boundary with a sine wave
    #[serde(default = "default_true")]
    pub wave_animation: bool,

    #[serde(default = "default_wave_height")]
    pub wave_height: f64,

    #[serde(default = "default_wave_frequency")]
    pub wave_frequency: f64,

    #[serde(default = "default_wave_speed")]
    pub wave_speed: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_grid_rows(),
            columns: default_grid_columns(),
            fill_strategy: FillStrategy::default(),
            wave_animation: true,
            wave_height: default_wave_height(),
            wave_frequency: default_wave_frequency(),
            wave_speed: default_wave_speed(),
        }
    }
}

impl GridConfig {
    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.rows, self.columns)
    }

    /// Wave parameters, or `None` when the animation is disabled.
    pub fn wave(&self) -> Option<WaveParams> {
        self.wave_animation.then_some(WaveParams {
            height: self.wave_height,
            frequency: self.wave_frequency,
            speed: self.wave_speed,
        })
    }
}

fn default_grid_rows() -> usize {
    10
}

fn default_grid_columns() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_wave_height() -> f64 {
    0.6
}

fn default_wave_frequency() -> f64 {
    0.8
}

fn default_wave_speed() -> f64 {
    1.5
}

/// Shared store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Override for the shared directory both processes poll
    pub shared_dir: Option<PathBuf>,

    /// Poll interval for watch loops, in milliseconds
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            shared_dir: None,
            poll_ms: default_poll_ms(),
        }
    }
}

fn default_poll_ms() -> u64 {
    1000
}

/// Notification toggle
#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
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

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the core cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.tracking.daily_goal_ml <= 0 {
            return Err(Error::InvalidGoal(self.tracking.daily_goal_ml));
        }
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(Error::Config(
                "grid.rows and grid.columns must be at least 1".to_string(),
            ));
        }
        if let Some(bad) = self
            .tracking
            .quick_selections
            .iter()
            .find(|q| q.volume_ml <= 0)
        {
            return Err(Error::Config(format!(
                "quick selection volumes must be positive, got {} ml",
                bad.volume_ml
            )));
        }
        Ok(())
    }

    /// Returns the shared directory, honoring the config override
    pub fn shared_dir(&self) -> PathBuf {
        self.sync
            .shared_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("shared"))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/hydrate/config.toml` (~/.config/hydrate/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("hydrate").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/hydrate/` (~/.local/share/hydrate/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("hydrate")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/hydrate/` (~/.local/state/hydrate/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("hydrate")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/hydrate/data.db` (~/.local/share/hydrate/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tracking.daily_goal_ml, DEFAULT_DAILY_GOAL_ML);
        assert_eq!(config.tracking.unit, VolumeUnit::Ml);
        assert_eq!(config.grid.rows, 10);
        assert_eq!(config.grid.fill_strategy, FillStrategy::GoalRelative);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[tracking]
daily_goal_ml = 2000
unit = "oz"
quick_selections = [
    { kind = "soda", volume_ml = 330 },
    { volume_ml = 150 },
]

[grid]
rows = 8
columns = 6
fill_strategy = "per_liter"
wave_animation = false

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.tracking.daily_goal_ml, 2000);
        assert_eq!(config.tracking.unit, VolumeUnit::Oz);
        assert_eq!(config.tracking.quick_selections.len(), 2);
        assert_eq!(config.tracking.quick_selections[1].kind, BeverageKind::Water);
        assert_eq!(config.grid.geometry().cell_count(), 48);
        assert_eq!(config.grid.fill_strategy, FillStrategy::PerLiter);
        assert!(config.grid.wave().is_none());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_non_positive_goal() {
        let mut config = Config::default();
        config.tracking.daily_goal_ml = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidGoal(0))));
    }

    #[test]
    fn test_shared_dir_override() {
        let mut config = Config::default();
        config.sync.shared_dir = Some(PathBuf::from("/tmp/hydrate-shared"));
        assert_eq!(config.shared_dir(), PathBuf::from("/tmp/hydrate-shared"));
    }
}
