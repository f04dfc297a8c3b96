use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{NotificationSender, SenderError};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A sender for pushing notifications via the Telegram Bot API.
pub struct TelegramSender {
    client: Client,
    bot_token: String,
    api_base: String,
}

impl TelegramSender {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, SenderError> {
        Self::with_api_base(bot_token, TELEGRAM_API_BASE)
    }

    /// Points the sender at a different Bot API host (self-hosted API server, tests).
    pub fn with_api_base(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self, SenderError> {
        let bot_token = bot_token.into();
        if bot_token.trim().is_empty() {
            return Err(SenderError::InvalidConfiguration(
                "Telegram bot token is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, chat_id: i64, message: &str) -> Result<(), SenderError> {
        let api_url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = TelegramMessage {
            chat_id,
            text: message,
            parse_mode: "HTML",
        };

        // The request URL carries the bot token; keep it out of the error.
        let response = self
            .client
            .post(&api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SenderError::NetworkError(e.without_url()))?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Telegram API returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_posts_html_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::Json(json!({
                "chat_id": 42,
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let sender = TelegramSender::with_api_base("TOKEN", server.url()).unwrap();
        sender.send(42, "<b>hi</b>").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(403)
            .with_body(r#"{"ok":false,"description":"Forbidden: bot was blocked by the user"}"#)
            .create_async()
            .await;

        let sender = TelegramSender::with_api_base("TOKEN", server.url()).unwrap();
        let err = sender.send(42, "hello").await.unwrap_err();
        assert!(matches!(err, SenderError::SendFailed(ref m) if m.contains("blocked")));
    }

    #[tokio::test]
    async fn test_network_error_hides_token() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let sender =
            TelegramSender::with_api_base("123456:SECRET-TOKEN", format!("http://127.0.0.1:{port}"))
                .unwrap();
        let err = sender.send(42, "hello").await.unwrap_err();

        assert!(matches!(err, SenderError::NetworkError(_)));
        let text = format!("{err} {err:?}");
        assert!(!text.contains("SECRET-TOKEN"), "token leaked: {text}");
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            TelegramSender::new("  "),
            Err(SenderError::InvalidConfiguration(_))
        ));
    }
}
