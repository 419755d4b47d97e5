use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::availability::WantedSizes;
use crate::domain::Brand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    /// Chat that receives notifications for this subscription.
    pub chat_id: i64,
    pub url: String,
    pub brand: Option<String>,
    /// Comma-separated wanted sizes; `None` or blank means any size.
    pub sizes: Option<String>,
    pub last_status: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(user_id: i64, chat_id: i64, url: String) -> Self {
        let brand = Brand::detect(&url).map(|b| b.as_str().to_string());
        Self {
            id: 0,
            user_id,
            chat_id,
            url,
            brand,
            sizes: None,
            last_status: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_sizes(mut self, sizes: &str) -> Self {
        self.sizes = WantedSizes::parse(Some(sizes)).to_storage();
        self
    }

    pub fn wanted_sizes(&self) -> WantedSizes {
        WantedSizes::parse(self.sizes.as_deref())
    }

    pub fn last_status_text(&self) -> &str {
        self.last_status.as_deref().unwrap_or("")
    }

    /// Human label for the shop: the stored brand tag, else the brand behind the URL.
    pub fn brand_label(&self) -> String {
        let tag = self.brand.as_deref().map(str::trim).unwrap_or("");
        if !tag.is_empty() {
            return capitalize(tag);
        }
        match Brand::detect(&self.url) {
            Some(brand) => brand.label().to_string(),
            None => "Item".to_string(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
