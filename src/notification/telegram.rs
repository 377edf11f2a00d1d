use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Telegram Bot API sink
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram API error: {description} (code: {code})")]
    Api { code: i64, description: String },

    #[error("telegram returned HTTP {status} with an unreadable body")]
    UnexpectedResponse { status: u16 },
}

/// Somewhere a rendered message can be delivered to.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramClient {
    client: Client,
    send_message_url: String,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let send_message_url = format!(
            "{}/bot{}/sendMessage",
            config.api_url.trim_end_matches('/'),
            config.token
        );

        Ok(Self {
            client,
            send_message_url,
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotificationError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(&self.send_message_url)
            .json(&request)
            .send()
            .await?;

        // Errors come back as non-2xx with the same JSON envelope.
        let status = response.status();
        let body: SendMessageResponse = response
            .json()
            .await
            .map_err(|_| NotificationError::UnexpectedResponse {
                status: status.as_u16(),
            })?;

        if !body.ok {
            return Err(NotificationError::Api {
                code: body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: body.description.unwrap_or_default(),
            });
        }

        tracing::debug!(
            chat_id,
            message_id = body.result.map(|m| m.message_id),
            "Telegram message sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(
            TelegramConfig::new("123:abc")
                .with_api_url(server.uri())
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_html_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(json!({
                "chat_id": 42,
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 7 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).send(42, "<b>hi</b>").await.unwrap();
    }

    #[tokio::test]
    async fn test_api_rejection_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).send(1, "x").await.unwrap_err();

        assert!(matches!(err, NotificationError::Api { code: 400, .. }));
        assert_eq!(
            err.to_string(),
            "telegram API error: Bad Request: chat not found (code: 400)"
        );
    }

    #[tokio::test]
    async fn test_unreadable_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).send(1, "x").await.unwrap_err();

        assert!(matches!(err, NotificationError::UnexpectedResponse { status: 502 }));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": true }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).send(1, "x").await.unwrap_err();

        assert!(matches!(err, NotificationError::Http(ref e) if e.is_timeout()));
    }
}
