//! Notification channels.
//!
//! This module provides the channels a classified message can be delivered to:
//! - Slack-style chat webhooks with an info/alert pair per environment
//! - Email through a caller-provided mail transport

mod email;
mod slack;

pub use email::{EmailChannel, EmailConfig};
pub use slack::{MENTION_MARKER, SlackChannel, SlackConfig, SlackWebhook};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::message::Message;

/// Trait for notification channels.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Check if the channel is enabled.
    fn is_enabled(&self) -> bool;

    /// Deliver a message through this channel.
    ///
    /// Channels whose failures must not disturb the caller log them and return `Ok`.
    async fn notify(&self, message: &Message) -> Result<()>;
}

/// Channel configuration wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Chat webhook channel.
    Slack(SlackConfig),
    /// Email channel.
    Email(EmailConfig),
}

impl ChannelConfig {
    /// Get the channel type name.
    pub fn channel_type(&self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Email(_) => "email",
        }
    }

    /// Check if the channel is enabled.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Slack(c) => c.enabled,
            Self::Email(c) => c.enabled,
        }
    }
}
