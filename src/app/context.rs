use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::app::error::{Result, StockwatchError};
use crate::checker::WorkerPool;
use crate::config::Config;
use crate::monitor::Monitor;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::scraper::{chrome_probers, ChromeSessionFactory};
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub config: Config,
}

impl AppContext {
    pub fn new(db_path: Option<PathBuf>, config: Config) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        Ok(Self {
            store: Arc::new(SqliteStore::new(&db_path)?),
            config,
        })
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Ok(Self {
            store: Arc::new(SqliteStore::in_memory()?),
            config,
        })
    }

    /// Chrome-backed pool sized from the `[monitor]` settings.
    pub fn worker_pool(&self) -> WorkerPool<ChromeSessionFactory> {
        let factory = Arc::new(ChromeSessionFactory::new(self.config.scraper.clone()));
        WorkerPool::new(factory, chrome_probers())
            .with_workers(self.config.monitor.max_workers)
            .with_max_per_brand(self.config.monitor.max_per_brand)
    }

    /// Telegram when a token is configured, the log otherwise or when `dry_run` is set.
    pub fn notifier(&self, dry_run: bool) -> Arc<dyn Notifier> {
        if dry_run {
            return Arc::new(LogNotifier);
        }
        match self.config.bot_token() {
            Some(token) => Arc::new(TelegramNotifier::new(token)),
            None => {
                warn!("No bot token configured, notifications only go to the log");
                Arc::new(LogNotifier)
            }
        }
    }

    pub fn monitor(&self, dry_run: bool) -> Monitor<ChromeSessionFactory> {
        Monitor::new(self.store.clone(), self.worker_pool(), self.notifier(dry_run))
            .with_notify_concurrency(self.config.monitor.notify_concurrency)
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| StockwatchError::Config("Could not find data directory".into()))?;
        let stockwatch_dir = data_dir.join("stockwatch");
        std::fs::create_dir_all(&stockwatch_dir)?;
        Ok(stockwatch_dir.join("stockwatch.db"))
    }
}
