use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the browser sessions that check product pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Page load timeout per attempt in seconds (default: 15)
    pub timeout_secs: u64,

    /// Wait time after page load for client-side rendering in milliseconds (default: 3000)
    pub wait_after_load_ms: u64,

    /// Attempts to open a page before reporting it as failed (default: 3)
    pub page_load_retries: u32,

    /// Pause between page load attempts in milliseconds (default: 2000)
    pub retry_delay_ms: u64,

    /// Browser UI language, passed as `--lang`
    pub language: String,

    /// User agent string to use
    pub user_agent: Option<String>,

    /// Chrome/Chromium binary; found on PATH when unset
    pub chrome_executable: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_secs: 15,
            wait_after_load_ms: 3000,
            page_load_retries: 3,
            retry_delay_ms: 2000,
            language: "uk-UA".to_string(),
            user_agent: None,
            chrome_executable: None,
        }
    }
}

impl ScraperConfig {
    /// Get the page load timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the wait time after load as a Duration
    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.page_load_retries.max(1)
    }
}
