use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{Result, StockwatchError};
use crate::checker::{Prober, SessionFactory};
use crate::domain::{Brand, Sentinel};
use crate::scraper::config::ScraperConfig;
use crate::scraper::extractor::{ExtractedPage, SizeExtractor};

/// Launches one Chrome process per worker
pub struct ChromeSessionFactory {
    config: ScraperConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg(format!("--lang={}", self.config.language))
            .window_size(1920, 1080)
            .user_data_dir(profile_dir);

        if let Some(ref ua) = self.config.user_agent {
            builder = builder.arg(format!("--user-agent={}", ua));
        }

        if let Some(ref executable) = self.config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| StockwatchError::Browser(format!("Failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn open(&self, worker: usize) -> Result<ChromeSession> {
        // Separate profiles keep concurrent browsers from fighting over one lock file
        let profile_dir = std::env::temp_dir().join(format!(
            "stockwatch-{}-worker-{}",
            std::process::id(),
            worker
        ));
        let browser_config = self.browser_config(&profile_dir)?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            StockwatchError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(worker, error = %e, "Browser handler error");
                }
            }
        });

        info!(worker, "Browser session started");

        Ok(ChromeSession {
            worker,
            browser,
            handler,
            config: self.config.clone(),
            profile_dir,
        })
    }

    async fn close(&self, mut session: ChromeSession) {
        if let Err(e) = session.browser.close().await {
            debug!(worker = session.worker, error = %e, "Browser close failed");
        }
        let _ = session.browser.wait().await;
        session.handler.abort();
        let _ = tokio::fs::remove_dir_all(&session.profile_dir).await;
        info!(worker = session.worker, "Browser session closed");
    }
}

/// One browser owned by one worker.
pub struct ChromeSession {
    worker: usize,
    browser: Browser,
    handler: JoinHandle<()>,
    config: ScraperConfig,
    profile_dir: PathBuf,
}

impl ChromeSession {
    /// The handler task ends when the browser connection is gone.
    fn ensure_alive(&self) -> Result<()> {
        if self.handler.is_finished() {
            return Err(StockwatchError::SessionFatal(format!(
                "browser connection for worker {} closed",
                self.worker
            )));
        }
        Ok(())
    }

    /// Open `url` in a new tab, retrying within the configured budget.
    ///
    /// `Ok(None)` means the page never loaded; `Err` means the browser itself is gone.
    /// A tab whose load fails or times out is closed before the next attempt.
    pub async fn open_page(&mut self, url: &str) -> Result<Option<Page>> {
        let attempts = self.config.attempts();

        for attempt in 1..=attempts {
            self.ensure_alive()?;

            let blank = self.browser.new_page("about:blank");
            let outcome = match tokio::time::timeout(self.config.timeout(), blank).await {
                Ok(Ok(page)) => load_tab(page, url, self.config.timeout()).await,
                Ok(Err(e)) => Err(LoadFailure::Failed(e.to_string())),
                Err(_) => Err(LoadFailure::TimedOut),
            };

            match outcome {
                Ok(page) => {
                    // Product pages render sizes client-side
                    tokio::time::sleep(self.config.wait_after_load()).await;
                    return Ok(Some(page));
                }
                Err(LoadFailure::Failed(e)) => {
                    warn!(worker = self.worker, url, attempt, attempts, error = %e, "Page load failed");
                }
                Err(LoadFailure::TimedOut) => {
                    warn!(worker = self.worker, url, attempt, attempts, "Page load timed out");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        self.ensure_alive()?;
        Ok(None)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LoadFailure {
    Failed(String),
    TimedOut,
}

/// A browser tab that can be pointed at a URL and closed.
#[async_trait]
trait Tab: Sized + Send + Sync {
    async fn navigate(&self, url: &str) -> std::result::Result<(), String>;
    async fn discard(self) -> std::result::Result<(), String>;
}

#[async_trait]
impl Tab for Page {
    async fn navigate(&self, url: &str) -> std::result::Result<(), String> {
        self.goto(url).await.map_err(|e: CdpError| e.to_string())?;
        Ok(())
    }

    async fn discard(self) -> std::result::Result<(), String> {
        self.close().await.map_err(|e| e.to_string())
    }
}

/// Navigate `tab` to `url` within `limit`, closing it when that fails.
async fn load_tab<T: Tab>(tab: T, url: &str, limit: Duration) -> std::result::Result<T, LoadFailure> {
    let failure = match tokio::time::timeout(limit, tab.navigate(url)).await {
        Ok(Ok(())) => return Ok(tab),
        Ok(Err(e)) => LoadFailure::Failed(e),
        Err(_) => LoadFailure::TimedOut,
    };

    if let Err(e) = tab.discard().await {
        debug!(url, error = %e, "Failed to close tab");
    }
    Err(failure)
}

/// Reads per-size availability from a product page of one brand
pub struct ChromeProber {
    brand: Brand,
    extractor: SizeExtractor,
}

impl ChromeProber {
    pub fn new(brand: Brand) -> Self {
        Self {
            brand,
            extractor: SizeExtractor::new(brand),
        }
    }
}

#[async_trait]
impl Prober<ChromeSession> for ChromeProber {
    async fn check(&self, session: &mut ChromeSession, url: &str) -> Result<String> {
        info!(worker = session.worker, brand = %self.brand, url, "Checking page");

        let Some(page) = session.open_page(url).await? else {
            return Ok(Sentinel::PageLoadFailed.text().to_string());
        };

        let evaluated = page.evaluate(self.extractor.extraction_script()).await;
        if let Err(e) = page.close().await {
            debug!(worker = session.worker, error = %e, "Failed to close page");
        }

        let extracted = match evaluated {
            Ok(result) => result.into_value::<ExtractedPage>().unwrap_or_else(|e| {
                warn!(url, error = %e, "Unexpected extraction result");
                ExtractedPage::default()
            }),
            Err(e) => {
                session.ensure_alive()?;
                warn!(url, error = %e, "Extraction script failed");
                ExtractedPage::default()
            }
        };

        let text = self.extractor.to_status_block(url, extracted).render();
        debug!(url, status = %text, "Status block");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Stands in for a browser tab; `closed` flips when the tab is discarded.
    struct FakeTab {
        delay: Duration,
        error: Option<&'static str>,
        closed: Arc<AtomicBool>,
    }

    impl FakeTab {
        fn new(delay: Duration, error: Option<&'static str>) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let tab = Self {
                delay,
                error,
                closed: closed.clone(),
            };
            (tab, closed)
        }
    }

    #[async_trait]
    impl Tab for FakeTab {
        async fn navigate(&self, _url: &str) -> std::result::Result<(), String> {
            tokio::time::sleep(self.delay).await;
            match self.error {
                Some(e) => Err(e.to_string()),
                None => Ok(()),
            }
        }

        async fn discard(self) -> std::result::Result<(), String> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    const URL: &str = "https://www.zara.com/p1.html";

    #[tokio::test]
    async fn test_loaded_tab_stays_open() {
        let (tab, closed) = FakeTab::new(Duration::from_millis(1), None);

        let result = load_tab(tab, URL, Duration::from_secs(5)).await;

        assert!(result.is_ok());
        assert!(!closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_navigation_closes_tab() {
        let (tab, closed) = FakeTab::new(Duration::from_millis(1), Some("net::ERR_CONNECTION_RESET"));

        let result = load_tab(tab, URL, Duration::from_secs(5)).await;

        assert_eq!(
            result.err(),
            Some(LoadFailure::Failed("net::ERR_CONNECTION_RESET".to_string()))
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_timed_out_navigation_closes_tab() {
        let (tab, closed) = FakeTab::new(Duration::from_secs(10), None);

        let result = load_tab(tab, URL, Duration::from_millis(20)).await;

        assert_eq!(result.err(), Some(LoadFailure::TimedOut));
        assert!(closed.load(Ordering::SeqCst));
    }
}
