//! Browser-backed page checks.
//!
//! Every worker of the [`WorkerPool`](crate::checker::WorkerPool) owns one
//! Chrome process launched by [`ChromeSessionFactory`]. A [`ChromeProber`]
//! per brand opens the product page, runs that brand's extraction script
//! and renders the result as a status block.
//!
//! ```text
//! url → ChromeSession::open_page (retries) → extraction script → StatusBlock::render
//! ```

mod chrome;
mod config;
mod extractor;

use std::sync::Arc;

pub use chrome::{ChromeProber, ChromeSession, ChromeSessionFactory};
pub use config::ScraperConfig;
pub use extractor::{ExtractedPage, ExtractedSize, SizeExtractor};

use crate::checker::ProberRegistry;
use crate::domain::Brand;

/// Probers for every supported brand.
pub fn chrome_probers() -> ProberRegistry<ChromeSession> {
    Brand::ALL
        .into_iter()
        .fold(ProberRegistry::<ChromeSession>::new(), |registry, brand| {
            registry.register(brand, Arc::new(ChromeProber::new(brand)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_brand_has_a_prober() {
        let registry = chrome_probers();
        for brand in Brand::ALL {
            assert!(registry.supports(brand));
        }
    }
}
