use async_trait::async_trait;
use tracing::info;

use super::{NotificationSender, SenderError};

/// Writes alerts to the log. Used when no bot token is configured.
#[derive(Debug, Default, Clone)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), SenderError> {
        info!(chat_id, alert = message, "Alert (log delivery).");
        Ok(())
    }
}
