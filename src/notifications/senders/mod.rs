use async_trait::async_trait;
use thiserror::Error;

pub mod log;
pub mod telegram;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Delivers a rendered alert to a site owner.
///
/// Delivery is best effort: callers log failures and carry on, so
/// implementations should bound their own latency.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// * `chat_id` - The owner's Telegram chat id.
    /// * `message` - Alert text in Telegram HTML.
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), SenderError>;
}
