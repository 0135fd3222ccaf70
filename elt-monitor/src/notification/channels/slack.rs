//! Chat webhook notification channel.
//!
//! Every environment owns an info and an alert webhook. Error-classified
//! messages go to the alert webhook behind a mention of the whole channel,
//! everything else goes to info. Delivery problems never reach the caller:
//! the alert is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Notifier;
use crate::Result;
use crate::config::Environment;
use crate::message::{Message, Severity};
use crate::notification::format::{MessageFormatter, SegmentStyle};
use crate::notification::report::ResultsReport;
use crate::notification::transport::{
    ChatTransport, DEFAULT_WEBHOOK_BASE_URL, WebhookTransport, text_payload,
};

/// Mention that notifies every member of the alert channel.
pub const MENTION_MARKER: &str = "<!channel>";

/// Info/alert webhook pair of one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackWebhook {
    pub info: String,
    pub alert: String,
}

impl SlackWebhook {
    pub fn new(info: impl Into<String>, alert: impl Into<String>) -> Self {
        Self {
            info: info.into(),
            alert: alert.into(),
        }
    }

    pub fn for_severity(&self, severity: Severity) -> &str {
        match severity {
            Severity::Info => &self.info,
            Severity::Alert => &self.alert,
        }
    }
}

/// Chat channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Whether the channel is enabled.
    pub enabled: bool,
    /// Webhooks used in the development environment.
    pub dev: SlackWebhook,
    /// Webhooks used in the production environment.
    pub prod: SlackWebhook,
    /// Base URL webhook paths are appended to.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dev: SlackWebhook::default(),
            prod: SlackWebhook::default(),
            base_url: DEFAULT_WEBHOOK_BASE_URL.to_string(),
            timeout_secs: 3,
        }
    }
}

/// Chat notification channel.
pub struct SlackChannel {
    config: SlackConfig,
    environment: Environment,
    transport: Arc<dyn ChatTransport>,
    formatter: MessageFormatter,
}

impl SlackChannel {
    /// Create a channel delivering through an HTTP webhook transport.
    pub fn new(config: SlackConfig, environment: Environment) -> Self {
        let transport = Arc::new(WebhookTransport::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        ));
        Self::with_transport(config, environment, transport)
    }

    pub fn with_transport(
        config: SlackConfig,
        environment: Environment,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            config,
            environment,
            transport,
            formatter: MessageFormatter::default(),
        }
    }

    /// Webhooks of the active environment.
    pub fn webhooks(&self) -> &SlackWebhook {
        match self.environment {
            Environment::Prod => &self.config.prod,
            Environment::Dev => &self.config.dev,
        }
    }

    /// Transport texts for `message`, in sending order.
    pub fn render(&self, message: &Message) -> Vec<String> {
        let prefix = match message.severity() {
            Severity::Alert => MENTION_MARKER,
            Severity::Info => "",
        };
        self.formatter.format(prefix, &message.as_str())
    }

    /// Post a structured results report.
    ///
    /// Every segment goes to the info webhook; failed reports are also raised
    /// on the alert webhook.
    pub async fn send_results(&self, report: &ResultsReport) {
        let formatter = self.formatter.with_style(SegmentStyle::CodeBlock);
        let webhooks = self.webhooks();

        for text in report.segments(&formatter) {
            if text.is_empty() {
                continue;
            }
            if report.failed {
                self.deliver(&webhooks.alert, &format!("{MENTION_MARKER} {text}"))
                    .await;
            }
            self.deliver(&webhooks.info, &text).await;
        }
    }

    /// Post one text, logging and dropping any failure.
    async fn deliver(&self, webhook: &str, text: &str) {
        if webhook.is_empty() {
            warn!(environment = %self.environment, "No chat webhook configured, dropping message");
            return;
        }

        match self.transport.post(webhook, &text_payload(text)).await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                info!(environment = %self.environment, error = %e, "Chat webhook timed out, message dropped");
            }
            Err(e) => {
                warn!(environment = %self.environment, error = %e, "Chat delivery failed, message dropped");
            }
        }
    }
}

#[async_trait]
impl Notifier for SlackChannel {
    fn channel_type(&self) -> &'static str {
        "slack"
    }

    fn is_enabled(&self) -> bool {
        let webhooks = self.webhooks();
        self.config.enabled && !(webhooks.info.is_empty() && webhooks.alert.is_empty())
    }

    async fn notify(&self, message: &Message) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let webhook = self.webhooks().for_severity(message.severity()).to_string();
        let texts = self.render(message);
        let segments = texts.len();
        for text in texts {
            self.deliver(&webhook, &text).await;
        }

        debug!(
            kind = %message.kind(),
            severity = %message.severity(),
            segments,
            "Chat notification processed"
        );
        Ok(())
    }
}
