//! Page checking: the per-brand prober seam and the worker pool that drives it.
//!
//! ```text
//! urls → WorkerPool ─┬─ worker 0 (session 0): chunk 0 in order ─┐
//!                    ├─ worker 1 (session 1): chunk 1 in order ─┼─→ ResultSink → ResultStream
//!                    └─ ...                                     ┘
//! ```

pub mod parallel;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Brand;

pub use parallel::{partition, PoolReport, WorkerPool, DEFAULT_MAX_PER_BRAND, DEFAULT_WORKERS};
pub use stream::{channel, ResultMessage, ResultSink, ResultStream, StreamEvent};

/// Opens the sessions workers check pages with. A worker keeps its session for its whole lifetime.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: Send + 'static;

    async fn open(&self, worker: usize) -> Result<Self::Session>;

    async fn close(&self, session: Self::Session);
}

/// Brand-specific page check.
///
/// Page-level problems (timeouts, missing elements) are reported inside the
/// returned status text. An `Err` carrying
/// [`StockwatchError::SessionFatal`](crate::app::StockwatchError::SessionFatal)
/// means the session is unusable; any other `Err` fails only this page.
#[async_trait]
pub trait Prober<S: Send>: Send + Sync {
    async fn check(&self, session: &mut S, url: &str) -> Result<String>;
}

/// Probers keyed by brand.
pub struct ProberRegistry<S: Send> {
    probers: HashMap<Brand, Arc<dyn Prober<S>>>,
}

impl<S: Send> ProberRegistry<S> {
    pub fn new() -> Self {
        Self {
            probers: HashMap::new(),
        }
    }

    pub fn register(mut self, brand: Brand, prober: Arc<dyn Prober<S>>) -> Self {
        self.probers.insert(brand, prober);
        self
    }

    pub fn get(&self, brand: Brand) -> Option<Arc<dyn Prober<S>>> {
        self.probers.get(&brand).cloned()
    }

    pub fn supports(&self, brand: Brand) -> bool {
        self.probers.contains_key(&brand)
    }

    /// Prober for the brand behind `url`, if any.
    pub fn resolve(&self, url: &str) -> Option<Arc<dyn Prober<S>>> {
        Brand::detect(url).and_then(|brand| self.get(brand))
    }
}

impl<S: Send> Default for ProberRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
