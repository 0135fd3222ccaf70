//! Email notification channel.
//!
//! Subjects and recipients are built here; delivery goes through a
//! [`MailTransport`] supplied by the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::Notifier;
use crate::Result;
use crate::config::Environment;
use crate::message::Message;
use crate::notification::transport::{EmailEnvelope, MailTransport};

/// Subject fallback when the message carries no name.
const UNNAMED: &str = "unbekannt";

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

/// Email channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Whether the channel is enabled.
    pub enabled: bool,
    /// Verified sender address.
    pub sender_address: String,
    /// Maintainers, always notified.
    pub developer_addresses: Vec<String>,
    /// Business contacts, notified in production only.
    pub business_addresses: Vec<String>,
    /// IANA time zone of the subject timestamp.
    pub timezone: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sender_address: String::new(),
            developer_addresses: Vec::new(),
            business_addresses: Vec::new(),
            timezone: default_timezone(),
        }
    }
}

/// Email notification channel.
pub struct EmailChannel {
    config: EmailConfig,
    environment: Environment,
    transport: Arc<dyn MailTransport>,
}

impl EmailChannel {
    pub fn new(
        config: EmailConfig,
        environment: Environment,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            config,
            environment,
            transport,
        }
    }

    /// Recipients for the active environment.
    pub fn recipients(&self) -> Vec<String> {
        let mut recipients = self.config.developer_addresses.clone();
        if self.environment.is_production() {
            recipients.extend(self.config.business_addresses.iter().cloned());
        }
        recipients
    }

    fn timezone(&self) -> Tz {
        match self.config.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(e) => {
                warn!(timezone = %self.config.timezone, error = %e, "Invalid timezone, using Europe/Berlin");
                chrono_tz::Europe::Berlin
            }
        }
    }

    /// Build the email subject for a message sent at `now`.
    pub fn build_subject_at(&self, message: &Message, now: DateTime<Utc>) -> String {
        let name = message.name().filter(|n| !n.is_empty()).unwrap_or(UNNAMED);
        let local = now.with_timezone(&self.timezone());
        format!(
            "⚠ ELT-Fehler ({}) - {}",
            name,
            local.format("%d.%m.%Y %H:%M:%S")
        )
    }

    /// Build the full envelope for a message sent at `now`.
    pub fn envelope_at(&self, message: &Message, now: DateTime<Utc>) -> EmailEnvelope {
        EmailEnvelope {
            subject: self.build_subject_at(message, now),
            body: message.as_str(),
            recipients: self.recipients(),
            sender: self.config.sender_address.clone(),
        }
    }
}

#[async_trait]
impl Notifier for EmailChannel {
    fn channel_type(&self) -> &'static str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.sender_address.is_empty() && !self.recipients().is_empty()
    }

    async fn notify(&self, message: &Message) -> Result<()> {
        if !self.is_enabled() {
            debug!(kind = %message.kind(), "Email channel disabled, skipping");
            return Ok(());
        }

        let envelope = self.envelope_at(message, Utc::now());
        let message_id = self.transport.send(&envelope).await?;

        info!(
            recipients = ?envelope.recipients,
            message_id = %message_id,
            "Email sent"
        );
        Ok(())
    }
}
