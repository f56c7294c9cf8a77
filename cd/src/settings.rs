//! Household settings seam
//!
//! Settings come from an external settings store; the core reads them
//! through this trait so the admin layer can change them at runtime.

use std::sync::RwLock;

use crate::config::SettingsConfig;

/// Snapshot of the household's policy settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum pool claims per person per local day
    pub daily_claim_limit: u32,

    /// Undo window in hours, measured from completion time
    pub undo_window_hours: i64,

    /// Currency value of one point
    pub point_currency_rate: f64,

    /// Bonus rate for a new all-time-fastest arcade run
    pub arcade_record_bonus: f64,

    /// Bonus rate for a current top-3 arcade placement
    pub arcade_top3_bonus: f64,
}

impl From<&SettingsConfig> for Settings {
    fn from(config: &SettingsConfig) -> Self {
        Self {
            daily_claim_limit: config.daily_claim_limit,
            undo_window_hours: config.undo_window_hours,
            point_currency_rate: config.point_currency_rate,
            arcade_record_bonus: config.arcade_record_bonus,
            arcade_top3_bonus: config.arcade_top3_bonus,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&SettingsConfig::default())
    }
}

/// Read side of the settings store
pub trait SettingsSource: Send + Sync {
    /// Current settings snapshot
    fn current(&self) -> Settings;
}

/// In-process settings holder, updatable by the admin layer
pub struct SharedSettings {
    inner: RwLock<Settings>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn update(&self, settings: Settings) {
        *self.inner.write().expect("settings lock poisoned") = settings;
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> Settings {
        self.inner.read().expect("settings lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let settings = Settings::default();
        assert_eq!(settings.daily_claim_limit, 5);
        assert_eq!(settings.undo_window_hours, 24);
    }

    #[test]
    fn test_shared_settings_update() {
        let shared = SharedSettings::new(Settings::default());
        assert_eq!(shared.current().daily_claim_limit, 5);

        let mut updated = Settings::default();
        updated.daily_claim_limit = 2;
        shared.update(updated);
        assert_eq!(shared.current().daily_claim_limit, 2);
    }
}
