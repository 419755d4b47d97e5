use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, ParseMode};
use teloxide::Bot;
use tracing::debug;

use crate::app::{Result, StockwatchError};
use crate::notify::{Notification, Notifier};

/// Delivers notifications as Telegram HTML messages.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: i64, notification: &Notification) -> Result<()> {
        self.bot
            .send_message(ChatId(destination), notification.render_html())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| StockwatchError::Notify(format!("chat {}: {}", destination, e)))?;

        debug!(destination, url = %notification.url, "Notification delivered");
        Ok(())
    }
}
