//! Delivery transports used by the notification channels.
//!
//! Channels decide *what* to send and *where*; transports perform the delivery.
//! Chat goes through [`ChatTransport`] (an HTTP webhook implementation is
//! provided); mail goes through [`MailTransport`], which callers implement on
//! top of their mail service.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::Result;
use crate::utils::http_client;

/// Default chat webhook base URL.
pub const DEFAULT_WEBHOOK_BASE_URL: &str = "https://hooks.slack.com/services";

/// Default per-request chat timeout.
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(3);

/// Posts a payload to a named chat webhook.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver `payload` to `webhook`. Fails with [`crate::Error::Timeout`] when
    /// the transport's timeout elapses.
    async fn post(&self, webhook: &str, payload: &Value) -> Result<()>;
}

/// An outbound plain-text email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEnvelope {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub sender: String,
}

/// Sends an email; returns the provider's message id.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, envelope: &EmailEnvelope) -> Result<String>;
}

/// The chat payload for a text message.
pub fn text_payload(text: &str) -> Value {
    json!({ "text": text })
}

/// Chat transport posting JSON to `{base_url}/{webhook}`.
///
/// The HTTP client is built on first use and reused for every later post.
pub struct WebhookTransport {
    base_url: String,
    timeout: Duration,
    client: OnceLock<Client>,
}

impl WebhookTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> &Client {
        self.client
            .get_or_init(|| http_client::build_webhook_client(self.timeout))
    }

    /// Full URL for a webhook path or an absolute webhook URL.
    fn url(&self, webhook: &str) -> String {
        if webhook.starts_with("https://") || webhook.starts_with("http://") {
            webhook.to_string()
        } else {
            format!("{}/{}", self.base_url, webhook.trim_start_matches('/'))
        }
    }
}

impl Default for WebhookTransport {
    fn default() -> Self {
        Self::new(DEFAULT_WEBHOOK_BASE_URL, DEFAULT_CHAT_TIMEOUT)
    }
}

#[async_trait]
impl ChatTransport for WebhookTransport {
    async fn post(&self, webhook: &str, payload: &Value) -> Result<()> {
        let url = self.url(webhook);

        let response = self
            .client()
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    crate::Error::timeout("webhook", self.timeout)
                } else {
                    crate::Error::transport("webhook", format!("Webhook request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Webhook returned non-OK status");
            return Err(crate::Error::transport(
                "webhook",
                format!("Webhook failed: {} - {}", status, body),
            ));
        }

        debug!(webhook = %webhook, "Webhook message delivered");
        Ok(())
    }
}
