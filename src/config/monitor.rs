use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::checker::{DEFAULT_MAX_PER_BRAND, DEFAULT_WORKERS};
use crate::notify::DEFAULT_MAX_IN_FLIGHT;

/// How often and how wide the monitor checks pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between the start of two passes (default: 60)
    pub interval_secs: u64,

    /// Browser sessions per destination group (default: 4)
    pub max_workers: usize,

    /// Pages of one shop checked per group and pass (default: 50)
    pub max_per_brand: usize,

    /// Notifications in flight at once (default: 5)
    pub notify_concurrency: usize,

    /// Run a pass right after the daemon starts (default: true)
    pub update_on_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_workers: DEFAULT_WORKERS,
            max_per_brand: DEFAULT_MAX_PER_BRAND,
            notify_concurrency: DEFAULT_MAX_IN_FLIGHT,
            update_on_start: true,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
}
