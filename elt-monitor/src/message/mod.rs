//! Classified failure messages.
//!
//! A [`Message`] is the closed set of alert shapes the normalizer produces and
//! the notification channels consume. Every variant renders through
//! [`MessageBody`]; variants that extend the plain error form embed an
//! [`ErrorMessage`] and append to its rendering.

mod basic;
mod lambda;
mod step_function;

pub use basic::{DbtMessage, EMPTY_TEXT, ErrorMessage, SimpleMessage};
pub use lambda::{InvocationContext, LambdaErrorMessage, RuntimeEnv, cloudwatch_link};
pub use step_function::{RETURNED_PAYLOAD_MARKER, StepFunctionFailureMessage, returned_payload};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::json::{self, JsonContext};

/// Where a message is routed on severity-aware channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational, routed to the info channel.
    Info,
    /// Requires attention, routed to the alert channel with a mention.
    Alert,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Alert => write!(f, "alert"),
        }
    }
}

/// Discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Error,
    LambdaError,
    StepFunctionFailure,
    Dbt,
    Simple,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::LambdaError => "lambda_error",
            Self::StepFunctionFailure => "step_function_failure",
            Self::Dbt => "dbt",
            Self::Simple => "simple",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering shared by every message variant.
pub trait MessageBody: Serialize {
    const KIND: MessageKind;

    /// Human-readable multi-line form. Never empty.
    fn as_str(&self) -> String;

    /// Short name used in email subjects, if the variant has one.
    fn name(&self) -> Option<&str>;

    fn severity(&self) -> Severity;

    /// The variant's fields in declaration order.
    fn as_dict(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    fn as_json(&self) -> String {
        json::to_string_or_fallback(
            self,
            "{}",
            JsonContext::MessageField {
                kind: Self::KIND.as_str(),
                field: "*",
            },
            "Failed to serialize message",
        )
    }
}

/// A classified failure or status report.
///
/// Serializes to the inner variant's fields without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Error(ErrorMessage),
    LambdaError(LambdaErrorMessage),
    StepFunctionFailure(StepFunctionFailureMessage),
    Dbt(DbtMessage),
    Simple(SimpleMessage),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Message::Error($m) => $body,
            Message::LambdaError($m) => $body,
            Message::StepFunctionFailure($m) => $body,
            Message::Dbt($m) => $body,
            Message::Simple($m) => $body,
        }
    };
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Error(_) => ErrorMessage::KIND,
            Self::LambdaError(_) => LambdaErrorMessage::KIND,
            Self::StepFunctionFailure(_) => StepFunctionFailureMessage::KIND,
            Self::Dbt(_) => DbtMessage::KIND,
            Self::Simple(_) => SimpleMessage::KIND,
        }
    }

    pub fn as_str(&self) -> String {
        dispatch!(self, m => m.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        dispatch!(self, m => m.name())
    }

    pub fn severity(&self) -> Severity {
        dispatch!(self, m => m.severity())
    }

    pub fn is_alert(&self) -> bool {
        self.severity() == Severity::Alert
    }

    pub fn as_dict(&self) -> Map<String, Value> {
        dispatch!(self, m => m.as_dict())
    }

    pub fn as_json(&self) -> String {
        dispatch!(self, m => m.as_json())
    }
}

impl From<ErrorMessage> for Message {
    fn from(m: ErrorMessage) -> Self {
        Self::Error(m)
    }
}

impl From<LambdaErrorMessage> for Message {
    fn from(m: LambdaErrorMessage) -> Self {
        Self::LambdaError(m)
    }
}

impl From<StepFunctionFailureMessage> for Message {
    fn from(m: StepFunctionFailureMessage) -> Self {
        Self::StepFunctionFailure(m)
    }
}

impl From<DbtMessage> for Message {
    fn from(m: DbtMessage) -> Self {
        Self::Dbt(m)
    }
}

impl From<SimpleMessage> for Message {
    fn from(m: SimpleMessage) -> Self {
        Self::Simple(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_kind() {
        let error: Message = ErrorMessage::new("E", "boom").into();
        let dbt: Message = DbtMessage::new("dbt", "3 passed").into();
        let simple: Message = SimpleMessage::new("done").into();

        assert!(error.is_alert());
        assert!(!dbt.is_alert());
        assert!(!simple.is_alert());
        assert_eq!(error.kind(), MessageKind::Error);
        assert_eq!(simple.kind().to_string(), "simple");
    }

    #[test]
    fn test_untagged_serialization() {
        let message: Message = ErrorMessage::new("E", "boom").into();
        assert_eq!(message.as_json(), r#"{"name":"E","text":"boom"}"#);

        let dict = message.as_dict();
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "text"]);
    }

    #[test]
    fn test_simple_message_has_no_name() {
        let message: Message = SimpleMessage::new("all good").into();
        assert_eq!(message.name(), None);
        assert_eq!(message.as_str(), "all good");
    }
}
