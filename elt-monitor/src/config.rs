//! Monitor configuration.
//!
//! Configuration is an explicit value handed to the channels and the wrapper.
//! It can be parsed from JSON or assembled from environment variables:
//!
//! - `APP_ENV` (`prod` selects production, anything else development)
//! - `FAIL_ON_ERROR` (`true`, case-insensitive, enables propagation)
//! - `SLACK_DEV_INFO`, `SLACK_DEV_ALERT`, `SLACK_PROD_INFO`, `SLACK_PROD_ALERT`
//! - `EMAIL_SENDER`, `EMAIL_DEVELOPER_ADDRESSES`, `EMAIL_BUSINESS_ADDRESSES`
//!   (comma-separated)
//! - `MONITOR_TIMEZONE`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::notification::channels::{ChannelConfig, EmailConfig, SlackConfig, SlackWebhook};
use crate::{Error, Result};

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Prod)
    }

    /// Lenient parse of an `APP_ENV` value: only `prod` selects production.
    pub fn from_app_env(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("prod") {
            Self::Prod
        } else {
            Self::Dev
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(Error::config(format!("Unknown environment: {}", other))),
        }
    }
}

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub environment: Environment,
    /// Propagate handler failures instead of reporting and swallowing them.
    pub fail_on_error: bool,
    pub channels: Vec<ChannelConfig>,
}

impl MonitorConfig {
    /// Load from the process environment, reading `.env` first when present.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!(error = %e, "No .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(mut lookup: impl FnMut(&str) -> Option<String>) -> Self {
        let mut get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = get("APP_ENV")
            .map(|raw| Environment::from_app_env(&raw))
            .unwrap_or_default();
        let fail_on_error = get("FAIL_ON_ERROR")
            .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let mut channels = Vec::new();

        let dev = SlackWebhook {
            info: get("SLACK_DEV_INFO").unwrap_or_default(),
            alert: get("SLACK_DEV_ALERT").unwrap_or_default(),
        };
        let prod = SlackWebhook {
            info: get("SLACK_PROD_INFO").unwrap_or_default(),
            alert: get("SLACK_PROD_ALERT").unwrap_or_default(),
        };
        if dev != SlackWebhook::default() || prod != SlackWebhook::default() {
            channels.push(ChannelConfig::Slack(SlackConfig {
                enabled: true,
                dev,
                prod,
                ..Default::default()
            }));
        }

        if let Some(sender_address) = get("EMAIL_SENDER") {
            let mut email = EmailConfig {
                enabled: true,
                sender_address,
                developer_addresses: get("EMAIL_DEVELOPER_ADDRESSES")
                    .map(|raw| split_addresses(&raw))
                    .unwrap_or_default(),
                business_addresses: get("EMAIL_BUSINESS_ADDRESSES")
                    .map(|raw| split_addresses(&raw))
                    .unwrap_or_default(),
                ..Default::default()
            };
            if let Some(timezone) = get("MONITOR_TIMEZONE") {
                email.timezone = timezone;
            }
            channels.push(ChannelConfig::Email(email));
        }

        Self {
            environment,
            fail_on_error,
            channels,
        }
    }

    /// Parse a JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}
