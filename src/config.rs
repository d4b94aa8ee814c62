use std::sync::Arc;

use chrono::Duration;

use crate::aggregator::StatsOptions;
use crate::dashboard::DashboardOptions;
use crate::rate_limit::IntakeLimits;
use crate::store::memory::MemoryStore;
use crate::store::sqlite::SqliteStore;
use crate::store::KvStore;

pub const CONFIG_FILE: &str = "sitekeep.toml";

/// Largest accepted growth window, one hundred years.
const MAX_GROWTH_WINDOW_DAYS: i64 = 36_500;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "SITEKEEP_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: Backend,
    pub db_path: String,
    pub poll_interval_secs: u64,
    pub recent_limit: usize,
    pub growth_window_days: i64,
    pub write_retries: u32,
    pub intake_max_attempts: u64,
    pub intake_window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::Sqlite,
            db_path: "data/sitekeep.db".to_string(),
            poll_interval_secs: 2,
            recent_limit: 5,
            growth_window_days: 30,
            write_retries: 3,
            intake_max_attempts: 5,
            intake_window_secs: 3600,
        }
    }
}

impl Config {
    pub fn path() -> String {
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_FILE.to_string())
    }

    /// Read the config file; a missing or unreadable file yields defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &str) -> Self {
        std::fs::read_to_string(path)
            .map(|s| Self::from_toml_str(&s))
            .unwrap_or_default()
    }

    /// Missing keys and values of the wrong type fall back to defaults.
    pub fn from_toml_str(s: &str) -> Self {
        let defaults = Config::default();
        let toml_val: toml::Value = s
            .parse()
            .unwrap_or(toml::Value::Table(Default::default()));
        let get = |section: &str, key: &str| -> Option<toml::Value> {
            toml_val.get(section)?.get(key).cloned()
        };

        let backend = match get("store", "backend").as_ref().and_then(|v| v.as_str()) {
            Some("memory") => Backend::Memory,
            _ => Backend::Sqlite,
        };
        let db_path = get("store", "path")
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .unwrap_or(defaults.db_path);
        let poll_interval_secs = get("sync", "poll_interval_secs")
            .and_then(|v| v.as_integer())
            .filter(|n| *n > 0)
            .map(|n| n as u64)
            .unwrap_or(defaults.poll_interval_secs);
        let recent_limit = get("dashboard", "recent_limit")
            .and_then(|v| v.as_integer())
            .filter(|n| *n >= 0)
            .map(|n| n as usize)
            .unwrap_or(defaults.recent_limit);
        let growth_window_days = get("dashboard", "growth_window_days")
            .and_then(|v| v.as_integer())
            .filter(|n| (1..=MAX_GROWTH_WINDOW_DAYS).contains(n))
            .unwrap_or(defaults.growth_window_days);
        let write_retries = get("dashboard", "write_retries")
            .and_then(|v| v.as_integer())
            .filter(|n| *n >= 0)
            .map(|n| n as u32)
            .unwrap_or(defaults.write_retries);
        let intake_max_attempts = get("intake", "max_attempts")
            .and_then(|v| v.as_integer())
            .filter(|n| *n > 0)
            .map(|n| n as u64)
            .unwrap_or(defaults.intake_max_attempts);
        let intake_window_secs = get("intake", "window_secs")
            .and_then(|v| v.as_integer())
            .filter(|n| *n >= 0)
            .map(|n| n as u64)
            .unwrap_or(defaults.intake_window_secs);

        Config {
            backend,
            db_path,
            poll_interval_secs,
            recent_limit,
            growth_window_days,
            write_retries,
            intake_max_attempts,
            intake_window_secs,
        }
    }

    pub fn dashboard_options(&self) -> DashboardOptions {
        DashboardOptions {
            stats: StatsOptions {
                recent_limit: self.recent_limit,
                growth_window: Duration::days(self.growth_window_days),
            },
            write_retries: self.write_retries,
        }
    }

    pub fn intake_limits(&self) -> IntakeLimits {
        IntakeLimits {
            max_attempts: self.intake_max_attempts,
            window: std::time::Duration::from_secs(self.intake_window_secs),
        }
    }

    pub fn open_store(&self) -> Result<Arc<dyn KvStore>, String> {
        match self.backend {
            Backend::Memory => Ok(Arc::new(MemoryStore::new())),
            Backend::Sqlite => Ok(Arc::new(SqliteStore::new_at(&self.db_path)?)),
        }
    }
}
