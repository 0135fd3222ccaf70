//! Notification service.
//!
//! The NotificationService fans a classified message out to every configured
//! channel. Channels are attempted in configuration order; one failing channel
//! never stops the others, and the first propagated error is returned once
//! every channel was tried.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::channels::{ChannelConfig, EmailChannel, Notifier, SlackChannel};
use super::report::ResultsReport;
use super::transport::MailTransport;
use crate::Result;
use crate::config::Environment;
use crate::message::Message;

/// A channel registered with the service.
#[derive(Clone)]
enum RuntimeChannel {
    Slack(Arc<SlackChannel>),
    Email(Arc<EmailChannel>),
    Custom(Arc<dyn Notifier>),
}

impl RuntimeChannel {
    fn notifier(&self) -> &dyn Notifier {
        match self {
            Self::Slack(c) => c.as_ref(),
            Self::Email(c) => c.as_ref(),
            Self::Custom(c) => c.as_ref(),
        }
    }
}

/// Delivers messages to all enabled channels.
pub struct NotificationService {
    environment: Environment,
    mail_transport: Option<Arc<dyn MailTransport>>,
    channels: RwLock<Vec<RuntimeChannel>>,
}

impl NotificationService {
    /// Create a service without channels.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            mail_transport: None,
            channels: RwLock::new(Vec::new()),
        }
    }

    /// Create a service from channel configurations.
    ///
    /// Email channels need `mail_transport`; without one they are skipped.
    pub fn with_config(
        configs: &[ChannelConfig],
        environment: Environment,
        mail_transport: Option<Arc<dyn MailTransport>>,
    ) -> Self {
        let service = Self {
            environment,
            mail_transport,
            channels: RwLock::new(Vec::new()),
        };
        service.init_channels(configs);
        service
    }

    /// Initialize channels from configuration.
    fn init_channels(&self, configs: &[ChannelConfig]) {
        for config in configs {
            self.add_channel(config.clone());
        }

        info!(
            environment = %self.environment,
            channels = self.channels.read().len(),
            "Notification service initialized"
        );
    }

    fn build_channel(&self, config: ChannelConfig) -> Option<RuntimeChannel> {
        match config {
            ChannelConfig::Slack(c) => Some(RuntimeChannel::Slack(Arc::new(SlackChannel::new(
                c,
                self.environment,
            )))),
            ChannelConfig::Email(c) => match &self.mail_transport {
                Some(transport) => Some(RuntimeChannel::Email(Arc::new(EmailChannel::new(
                    c,
                    self.environment,
                    transport.clone(),
                )))),
                None => {
                    warn!("No mail transport available, skipping email channel");
                    None
                }
            },
        }
    }

    /// Add a channel from its configuration. Disabled channels are ignored.
    pub fn add_channel(&self, config: ChannelConfig) {
        let channel_type = config.channel_type();
        if !config.is_enabled() {
            debug!(channel_type, "Notification channel disabled");
            return;
        }

        let Some(channel) = self.build_channel(config) else {
            return;
        };

        if channel.notifier().is_enabled() {
            self.channels.write().push(channel);
            info!(channel_type, "Added notification channel");
        } else {
            warn!(channel_type, "Notification channel is incomplete, skipping");
        }
    }

    /// Add an already built channel.
    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        if notifier.is_enabled() {
            info!(channel_type = notifier.channel_type(), "Added notification channel");
            self.channels.write().push(RuntimeChannel::Custom(notifier));
        }
    }

    /// Number of active channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }

    /// Type names of the active channels, in delivery order.
    pub fn channel_types(&self) -> Vec<&'static str> {
        self.channels
            .read()
            .iter()
            .map(|c| c.notifier().channel_type())
            .collect()
    }

    /// Post a results report to every chat channel.
    pub async fn send_results(&self, report: &ResultsReport) {
        let chat: Vec<Arc<SlackChannel>> = self
            .channels
            .read()
            .iter()
            .filter_map(|c| match c {
                RuntimeChannel::Slack(slack) => Some(slack.clone()),
                _ => None,
            })
            .collect();

        for channel in chat {
            channel.send_results(report).await;
        }
    }
}

#[async_trait]
impl Notifier for NotificationService {
    fn channel_type(&self) -> &'static str {
        "service"
    }

    fn is_enabled(&self) -> bool {
        !self.channels.read().is_empty()
    }

    async fn notify(&self, message: &Message) -> Result<()> {
        let channels = self.channels.read().clone();
        if channels.is_empty() {
            debug!(kind = %message.kind(), "No notification channels configured");
            return Ok(());
        }

        let mut first_error = None;
        for channel in &channels {
            let notifier = channel.notifier();
            if let Err(e) = notifier.notify(message).await {
                warn!(
                    channel_type = notifier.channel_type(),
                    error = %e,
                    "Notification delivery failed"
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::message::ErrorMessage;
    use crate::notification::channels::{EmailConfig, SlackConfig, SlackWebhook};
    use crate::notification::transport::EmailEnvelope;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct TestChannel {
        calls: AtomicU32,
        fail_with: Option<&'static str>,
    }

    impl TestChannel {
        fn new(fail_with: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_with,
            })
        }
    }

    #[async_trait]
    impl Notifier for TestChannel {
        fn channel_type(&self) -> &'static str {
            "test"
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn notify(&self, _message: &Message) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(reason) => Err(Error::transport("test", reason)),
                None => Ok(()),
            }
        }
    }

    struct NullMailer;

    #[async_trait]
    impl MailTransport for NullMailer {
        async fn send(&self, _envelope: &EmailEnvelope) -> Result<String> {
            Ok("id".to_string())
        }
    }

    fn slack_config(enabled: bool) -> ChannelConfig {
        ChannelConfig::Slack(SlackConfig {
            enabled,
            dev: SlackWebhook::new("T/B/info", "T/B/alert"),
            ..Default::default()
        })
    }

    fn email_config() -> ChannelConfig {
        ChannelConfig::Email(EmailConfig {
            enabled: true,
            sender_address: "monitor@example.com".to_string(),
            developer_addresses: vec!["dev@example.com".to_string()],
            ..Default::default()
        })
    }

    fn message() -> Message {
        ErrorMessage::new("E", "boom").into()
    }

    #[test]
    fn test_notification_service_creation() {
        let service = NotificationService::new(Environment::Dev);
        assert_eq!(service.channel_count(), 0);
        assert!(!service.is_enabled());
    }

    #[test]
    fn test_disabled_channels_are_skipped() {
        let service = NotificationService::with_config(
            &[slack_config(false), slack_config(true)],
            Environment::Dev,
            None,
        );
        assert_eq!(service.channel_types(), vec!["slack"]);
    }

    #[test]
    fn test_email_needs_transport() {
        let configs = [slack_config(true), email_config()];

        let without = NotificationService::with_config(&configs, Environment::Dev, None);
        assert_eq!(without.channel_types(), vec!["slack"]);

        let with = NotificationService::with_config(
            &configs,
            Environment::Dev,
            Some(Arc::new(NullMailer)),
        );
        assert_eq!(with.channel_types(), vec!["slack", "email"]);
    }

    #[test]
    fn test_slack_without_webhooks_is_skipped() {
        // enabled, but the prod pair is empty
        let service =
            NotificationService::with_config(&[slack_config(true)], Environment::Prod, None);
        assert_eq!(service.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_without_channels() {
        let service = NotificationService::new(Environment::Dev);
        service.notify(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_attempts_all_channels() {
        let service = NotificationService::new(Environment::Dev);
        let failing = TestChannel::new(Some("first"));
        let also_failing = TestChannel::new(Some("second"));
        let healthy = TestChannel::new(None);
        service.add_notifier(failing.clone());
        service.add_notifier(also_failing.clone());
        service.add_notifier(healthy.clone());

        let err = service.notify(&message()).await.unwrap_err();

        assert!(err.to_string().contains("first"));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(also_failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }
}
