use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockwatchError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    /// The browser session behind a worker can no longer be used.
    #[error("Session lost: {0}")]
    SessionFatal(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(i64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl StockwatchError {
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, StockwatchError::SessionFatal(_))
    }
}

pub type Result<T> = std::result::Result<T, StockwatchError>;
