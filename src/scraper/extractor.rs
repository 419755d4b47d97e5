use serde::Deserialize;

use crate::domain::{Brand, SizeEntry, StatusBlock, Stock};

/// What the in-page script reports back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedPage {
    pub name: Option<String>,
    #[serde(default)]
    pub sizes: Vec<ExtractedSize>,
    /// Which part of the page was absent: `"add-to-cart"` or `"sizes"`.
    #[serde(default)]
    pub missing: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedSize {
    pub label: String,
    /// `"in"`, `"low"` or `"out"`
    pub state: String,
}

/// Per-brand size extraction for a loaded product page
pub struct SizeExtractor {
    brand: Brand,
}

impl SizeExtractor {
    pub fn new(brand: Brand) -> Self {
        Self { brand }
    }

    /// JavaScript evaluated in the page. It resolves to an [`ExtractedPage`] object.
    pub fn extraction_script(&self) -> &'static str {
        match self.brand {
            Brand::Zara => ZARA_SCRIPT,
            Brand::Bershka => BERSHKA_SCRIPT,
        }
    }

    pub fn to_status_block(&self, url: &str, page: ExtractedPage) -> StatusBlock {
        let mut block = StatusBlock::new(self.brand, url);
        block.product_name = page.name.filter(|n| !n.trim().is_empty());
        block.sizes = page
            .sizes
            .into_iter()
            .filter(|s| !s.label.trim().is_empty())
            .map(|s| SizeEntry {
                stock: parse_state(&s.state),
                label: s.label,
            })
            .collect();

        if block.sizes.is_empty() {
            block.note = Some(match page.missing.as_deref() {
                Some("add-to-cart") => {
                    "❌ 'Add to cart' button not found, item or sizes may be unavailable".to_string()
                }
                _ => "❗ Sizes not found".to_string(),
            });
        }

        block
    }
}

fn parse_state(state: &str) -> Stock {
    match state {
        "in" => Stock::InStock,
        "low" => Stock::LowStock,
        _ => Stock::OutOfStock,
    }
}

const ZARA_SCRIPT: &str = r#"
(async () => {
    const sleep = ms => new Promise(resolve => setTimeout(resolve, ms));
    const click = selector => {
        const el = document.querySelector(selector);
        if (el) { el.click(); return true; }
        return false;
    };

    // Cookie banner and the "stay in this store" modal hide the size popup
    if (click('#onetrust-accept-btn-handler')) await sleep(1000);
    if (click("button[data-qa-action='stay-in-store']")) await sleep(1000);

    const nameEl = document.querySelector("h1[class*='product-detail-info__header-name']");
    const name = nameEl ? nameEl.innerText.trim() : null;

    const addButton = document.querySelector(
        "div[class*='product-detail-cart-buttons__main-action'] button[data-qa-action='add-to-cart']"
    );
    if (!addButton) {
        return { name, sizes: [], missing: 'add-to-cart' };
    }
    addButton.click();
    await sleep(1000);

    const sizes = [];
    for (const button of document.querySelectorAll('ul.size-selector-sizes > li > button')) {
        const labelEl = button.querySelector("[data-qa-qualifier='size-selector-sizes-size-label']");
        if (!labelEl) continue;
        const action = (button.getAttribute('data-qa-action') || '').toLowerCase();
        const state = action === 'size-in-stock' ? 'in'
            : action === 'size-low-on-stock' ? 'low'
            : 'out';
        sizes.push({ label: labelEl.innerText.trim(), state });
    }

    return { name, sizes, missing: sizes.length ? null : 'sizes' };
})()
"#;

const BERSHKA_SCRIPT: &str = r#"
(async () => {
    const nameEl = document.querySelector(
        "h1[class*='product-detail-info-layout__title'], h1[class*='product-detail-name']"
    );
    const name = nameEl ? nameEl.innerText.trim() : null;

    const sizes = [];
    const buttons = document.querySelectorAll(
        "div[class*='size-selector-desktop-pdp__sizes'] button[class*='ui--dot-item']"
    );
    for (const button of buttons) {
        const labelEl = button.querySelector('span.text__label');
        const label = labelEl ? labelEl.innerText.trim() : '';
        const classes = button.getAttribute('class') || '';
        const ariaDisabled = (button.getAttribute('aria-disabled') || '').toLowerCase();
        const description = (button.getAttribute('aria-description') || '').toLowerCase();
        const unavailable = button.hasAttribute('disabled')
            || classes.includes('is-disabled')
            || ariaDisabled === 'true'
            || description.includes('розпродано')
            || description.includes('sold out');
        sizes.push({ label, state: unavailable ? 'out' : 'in' });
    }

    return { name, sizes, missing: sizes.length ? null : 'sizes' };
})()
"#;
