//! Status block text shared by the probers and the trigger engine.
//!
//! ```text
//! <b>🧵 Zara</b>                         brand title
//! Linen shirt                            product name (optional)
//! 🔗 <a href="...">Linen shirt</a>
//! 📏 Sizes:
//! 🟢 M
//! 🔴 L
//! ```

use crate::domain::availability::{strip_markup, IN_STOCK, LOW_STOCK, OUT_OF_STOCK};
use crate::domain::Brand;

const LINK_PREFIX: &str = "🔗";
const SIZES_HEADER: &str = "📏 Sizes:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stock {
    InStock,
    LowStock,
    OutOfStock,
}

impl Stock {
    pub fn marker(&self) -> &'static str {
        match self {
            Stock::InStock => IN_STOCK,
            Stock::LowStock => LOW_STOCK,
            Stock::OutOfStock => OUT_OF_STOCK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeEntry {
    pub label: String,
    pub stock: Stock,
}

#[derive(Debug, Clone)]
pub struct StatusBlock {
    pub brand: Brand,
    pub url: String,
    pub product_name: Option<String>,
    pub sizes: Vec<SizeEntry>,
    /// Free-text remark appended when sizes could not be read.
    pub note: Option<String>,
}

impl StatusBlock {
    pub fn new(brand: Brand, url: impl Into<String>) -> Self {
        Self {
            brand,
            url: url.into(),
            product_name: None,
            sizes: Vec::new(),
            note: None,
        }
    }

    pub fn render(&self) -> String {
        let mut lines = vec![self.brand.title_line()];

        let name = self.product_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            lines.push(name.to_string());
        }
        lines.push(format!(
            "{} <a href=\"{}\">{}</a>",
            LINK_PREFIX,
            self.url,
            name.unwrap_or("Product link")
        ));

        if !self.sizes.is_empty() {
            lines.push(SIZES_HEADER.to_string());
            for entry in &self.sizes {
                lines.push(format!("{} {}", entry.stock.marker(), entry.label.trim()));
            }
        }

        if let Some(ref note) = self.note {
            lines.push(note.clone());
        }

        lines.join("\n")
    }
}

/// Product name carried on the second line of a status block.
///
/// Blocks without a name have their link or size lines there instead; those don't count.
pub fn product_name(text: &str) -> Option<String> {
    let line = text.lines().nth(1)?;
    let name = strip_markup(line).trim().to_string();
    let structural = [LINK_PREFIX, SIZES_HEADER, IN_STOCK, LOW_STOCK, OUT_OF_STOCK]
        .iter()
        .any(|marker| name.starts_with(marker));

    if name.is_empty() || structural {
        None
    } else {
        Some(name)
    }
}

/// Explicit per-URL results standing in for a page that could not be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// The worker's browser session died before or while checking the page.
    SessionLost,
    /// The page never loaded within the retry budget.
    PageLoadFailed,
    /// No prober handles this URL's host.
    UnsupportedDomain,
    /// The per-brand page limit for this pass was reached.
    Skipped,
}

impl Sentinel {
    pub const ALL: [Sentinel; 4] = [
        Sentinel::SessionLost,
        Sentinel::PageLoadFailed,
        Sentinel::UnsupportedDomain,
        Sentinel::Skipped,
    ];

    pub fn text(&self) -> &'static str {
        match self {
            Sentinel::SessionLost => "⚠️ Check failed: browser session was lost",
            Sentinel::PageLoadFailed => "⚠️ Check failed: page could not be opened",
            Sentinel::UnsupportedDomain => "❗ Unsupported domain (not Zara/Bershka)",
            Sentinel::Skipped => "⏭ Skipped: page limit for this shop reached",
        }
    }

    pub fn from_text(text: &str) -> Option<Sentinel> {
        Self::ALL.into_iter().find(|s| s.text() == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::available_sizes;

    #[test]
    fn test_render_full_block() {
        let mut block = StatusBlock::new(Brand::Zara, "https://www.zara.com/p1.html");
        block.product_name = Some(" Linen shirt ".into());
        block.sizes = vec![
            SizeEntry { label: "M".into(), stock: Stock::InStock },
            SizeEntry { label: "L".into(), stock: Stock::OutOfStock },
            SizeEntry { label: "XL".into(), stock: Stock::LowStock },
        ];

        let text = block.render();
        assert_eq!(
            text,
            "<b>🧵 Zara</b>\nLinen shirt\n🔗 <a href=\"https://www.zara.com/p1.html\">Linen shirt</a>\n📏 Sizes:\n🟢 M\n🔴 L\n🟡 XL"
        );
        assert_eq!(product_name(&text).as_deref(), Some("Linen shirt"));
        assert_eq!(available_sizes(&text).len(), 2);
    }

    #[test]
    fn test_render_without_name_or_sizes() {
        let mut block = StatusBlock::new(Brand::Bershka, "https://www.bershka.com/p1.html");
        block.note = Some("❗ Sizes not found".into());

        let text = block.render();
        assert!(text.starts_with("<b>🧥 Bershka</b>\n🔗"));
        assert!(text.ends_with("❗ Sizes not found"));
        assert!(available_sizes(&text).is_empty());
    }

    #[test]
    fn test_product_name_strips_markup() {
        assert_eq!(
            product_name("title\n<a href=\"x\">Jeans</a>").as_deref(),
            Some("Jeans")
        );
        assert_eq!(product_name("only one line"), None);
        assert_eq!(product_name("<b>🧥 Bershka</b>\n🔗 <a href=\"x\">Product link</a>"), None);
        assert_eq!(product_name("<b>🧵 Zara</b>\n🟢 M"), None);
        assert_eq!(product_name("title\n   "), None);
    }

    #[test]
    fn test_sentinels_have_no_sizes() {
        for sentinel in Sentinel::ALL {
            assert!(available_sizes(sentinel.text()).is_empty());
            assert_eq!(Sentinel::from_text(sentinel.text()), Some(sentinel));
        }
        assert_eq!(Sentinel::from_text("🟢 M"), None);
    }
}
