//! Choredaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main choredaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration
    pub storage: StorageConfig,

    /// Household clock configuration
    pub clock: ClockConfig,

    /// Household policy settings
    pub settings: SettingsConfig,

    /// Scheduler sweep configuration
    pub sweep: SweepSettings,

    /// Row-lock configuration
    pub locks: LockSettings,

    /// Hook bus configuration
    pub hooks: HooksConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .choredaemon.yml
        let local_config = PathBuf::from(".choredaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/choredaemon/choredaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("choredaemon").join("choredaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store directory
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("choredaemon"),
        }
    }
}

/// Household clock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Household UTC offset in minutes (east positive)
    #[serde(rename = "utc-offset-minutes")]
    pub utc_offset_minutes: i32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { utc_offset_minutes: 0 }
    }
}

impl ClockConfig {
    pub fn offset_secs(&self) -> i32 {
        self.utc_offset_minutes * 60
    }
}

/// Household policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Maximum pool claims per person per local day
    #[serde(rename = "daily-claim-limit")]
    pub daily_claim_limit: u32,

    /// Undo window in hours, measured from completion time
    #[serde(rename = "undo-window-hours")]
    pub undo_window_hours: i64,

    /// Currency value of one point (consumed by caller layers)
    #[serde(rename = "point-currency-rate")]
    pub point_currency_rate: f64,

    /// Bonus rate for a new all-time-fastest arcade run
    #[serde(rename = "arcade-record-bonus")]
    pub arcade_record_bonus: f64,

    /// Bonus rate for a current top-3 arcade placement
    #[serde(rename = "arcade-top3-bonus")]
    pub arcade_top3_bonus: f64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            daily_claim_limit: 5,
            undo_window_hours: 24,
            point_currency_rate: 0.05,
            arcade_record_bonus: 0.5,
            arcade_top3_bonus: 0.25,
        }
    }
}

/// Scheduler sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Frequent sweep interval in seconds
    #[serde(rename = "frequent-interval-secs")]
    pub frequent_interval_secs: u64,

    /// Max daily-sweep retries per local day before the watchdog gives up
    #[serde(rename = "daily-retry-max")]
    pub daily_retry_max: u32,

    /// Days after a one-off's completion before its template is archived
    #[serde(rename = "one-off-grace-days")]
    pub one_off_grace_days: i64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            frequent_interval_secs: 180,
            daily_retry_max: 3,
            one_off_grace_days: 14,
        }
    }
}

/// Row-lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Bounded wait for a single acquisition attempt, in milliseconds
    #[serde(rename = "wait-ms")]
    pub wait_ms: u64,

    /// Internal retries before a lock timeout surfaces as a conflict
    pub retries: u32,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            wait_ms: 2_000,
            retries: 2,
        }
    }
}

/// Hook bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Broadcast channel capacity
    pub capacity: usize,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self { capacity: 1_024 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.settings.daily_claim_limit, 5);
        assert_eq!(config.settings.undo_window_hours, 24);
        assert_eq!(config.sweep.frequent_interval_secs, 180);
        assert_eq!(config.clock.utc_offset_minutes, 0);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
settings:
  daily-claim-limit: 3
clock:
  utc-offset-minutes: -300
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings.daily_claim_limit, 3);
        assert_eq!(config.clock.utc_offset_minutes, -300);
        // Unspecified sections keep defaults
        assert_eq!(config.settings.undo_window_hours, 24);
        assert_eq!(config.sweep.daily_retry_max, 3);
    }

    #[test]
    fn test_load_missing_uses_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.hooks.capacity, 1_024);
    }

    #[test]
    fn test_clock_offset_secs() {
        let clock = ClockConfig { utc_offset_minutes: -300 };
        assert_eq!(clock.offset_secs(), -18_000);
    }
}
