//! Notification delivery.
//!
//! Classified messages reach people through channels:
//! - Chat webhooks, routed by environment and severity, chunked to the
//!   transport limit
//! - Email, addressed by environment
//!
//! Channels implement [`Notifier`]; [`NotificationService`] fans out to every
//! configured channel.

pub mod channels;
pub mod format;
pub mod report;
pub mod service;
pub mod transport;

pub use channels::{ChannelConfig, Notifier};
pub use format::{CHAT_SEGMENT_LIMIT, CONTINUED_MARKER, MessageFormatter, SegmentStyle};
pub use report::ResultsReport;
pub use service::NotificationService;
pub use transport::{ChatTransport, EmailEnvelope, MailTransport, WebhookTransport};
