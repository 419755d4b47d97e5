//! Outgoing availability alerts.
//!
//! - [`Notifier`]: delivery seam (Telegram in production, the log for dry runs)
//! - [`NotificationDispatcher`]: bounded fire-and-forget sends scoped to one pass

mod dispatcher;
mod telegram;

pub use dispatcher::{DispatchReport, NotificationDispatcher, DEFAULT_MAX_IN_FLIGHT};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use tracing::info;

use crate::app::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Brand label, plus the product name when known.
    pub title: String,
    pub url: String,
    /// Sorted sizes to show.
    pub sizes: Vec<String>,
}

impl Notification {
    pub fn sizes_line(&self) -> String {
        if self.sizes.is_empty() {
            "—".to_string()
        } else {
            self.sizes.join(", ")
        }
    }

    /// Telegram HTML message body.
    pub fn render_html(&self) -> String {
        format!(
            "🆕 <b>{title}</b>\nAvailability changed!\n\n🔗 <a href=\"{url}\">Product link</a>\n\n📏 Available sizes now: <b>{sizes}</b>",
            title = html_escape::encode_text(&self.title),
            url = html_escape::encode_double_quoted_attribute(&self.url),
            sizes = html_escape::encode_text(&self.sizes_line()),
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: i64, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: i64, notification: &Notification) -> Result<()> {
        info!(
            destination,
            title = %notification.title,
            url = %notification.url,
            sizes = %notification.sizes_line(),
            "Notification (not delivered)"
        );
        Ok(())
    }
}
