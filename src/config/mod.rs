//! Configuration management for stockwatch.
//!
//! Configuration is read from `~/.config/stockwatch/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod monitor;

pub use monitor::{MonitorConfig, TelegramConfig};

use crate::scraper::ScraperConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable that takes precedence over `telegram.token`.
pub const BOT_TOKEN_ENV: &str = "STOCKWATCH_BOT_TOKEN";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub scraper: ScraperConfig,
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file is created with commented defaults. Missing fields use
    /// default values; an unreadable or invalid file is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/stockwatch/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("stockwatch").join("config.toml"))
    }

    /// Bot token from the environment, else from the config file.
    pub fn bot_token(&self) -> Option<String> {
        let from_env = std::env::var(BOT_TOKEN_ENV).ok();
        Self::pick_token(from_env, self.telegram.token.clone())
    }

    fn pick_token(from_env: Option<String>, from_file: Option<String>) -> Option<String> {
        from_env
            .into_iter()
            .chain(from_file)
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# stockwatch configuration
#
# The bot token can also be given through the STOCKWATCH_BOT_TOKEN
# environment variable, which wins over the value below.

[monitor]
# Seconds between two monitoring passes
interval_secs = 60

# Browser sessions opened per chat while checking its subscriptions
max_workers = 4

# Pages of one shop checked per chat and pass; the rest are skipped
max_per_brand = 50

# Notifications sent at the same time
notify_concurrency = 5

# Run a pass as soon as the daemon starts
update_on_start = true

[scraper]
# Run browser in headless mode (no visible window)
headless = true

# Page load timeout per attempt in seconds
timeout_secs = 15

# Wait time after page load for sizes to render (milliseconds)
wait_after_load_ms = 3000

# Attempts to open a page before giving up on it
page_load_retries = 3

# Pause between attempts (milliseconds)
retry_delay_ms = 2000

# Browser language
language = "uk-UA"

# user_agent = "Mozilla/5.0 ..."
# chrome_executable = "/usr/bin/chromium"

[telegram]
# token = "123456:ABC..."
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
