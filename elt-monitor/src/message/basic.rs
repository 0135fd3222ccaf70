use serde::{Deserialize, Serialize};

use super::{MessageBody, MessageKind, Severity};

/// A failure with a name and free text. The base error shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub name: String,
    pub text: String,
}

impl ErrorMessage {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Name used for envelopes that match no known shape.
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown(text: impl Into<String>) -> Self {
        Self::new(Self::UNKNOWN, text)
    }
}

impl MessageBody for ErrorMessage {
    const KIND: MessageKind = MessageKind::Error;

    fn as_str(&self) -> String {
        format!("Error: {}\nMessage: {}", self.name, self.text)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn severity(&self) -> Severity {
        Severity::Alert
    }
}

/// Outcome of a dbt run. Reported as information even when tests failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbtMessage {
    pub name: String,
    pub text: String,
}

impl DbtMessage {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

impl MessageBody for DbtMessage {
    const KIND: MessageKind = MessageKind::Dbt;

    fn as_str(&self) -> String {
        // keep the rendering non-empty
        [&self.text, &self.name]
            .into_iter()
            .find(|s| !s.is_empty())
            .map_or_else(|| EMPTY_TEXT.to_string(), |s| s.clone())
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }
}

/// Rendering of a message that has no text at all.
pub const EMPTY_TEXT: &str = "-";

/// Plain status text without a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleMessage {
    pub text: String,
}

impl SimpleMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl MessageBody for SimpleMessage {
    const KIND: MessageKind = MessageKind::Simple;

    fn as_str(&self) -> String {
        if self.text.is_empty() {
            return EMPTY_TEXT.to_string();
        }
        self.text.clone()
    }

    fn name(&self) -> Option<&str> {
        None
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_as_str() {
        let message = ErrorMessage::new("Test Error", "Test Message");
        assert_eq!(message.as_str(), "Error: Test Error\nMessage: Test Message");
    }

    #[test]
    fn test_dbt_message_renders_text_only() {
        let message = DbtMessage::new("dbt test", "Done. PASS=3 WARN=0 ERROR=1");
        assert_eq!(message.as_str(), "Done. PASS=3 WARN=0 ERROR=1");
        assert_eq!(DbtMessage::new("dbt test", "").as_str(), "dbt test");
        assert_eq!(DbtMessage::new("", "").as_str(), EMPTY_TEXT);
    }

    #[test]
    fn test_simple_message_is_never_blank() {
        assert_eq!(SimpleMessage::new("12 tables loaded").as_str(), "12 tables loaded");
        assert_eq!(SimpleMessage::new("").as_str(), EMPTY_TEXT);
    }

    #[test]
    fn test_unknown_error() {
        let message = ErrorMessage::unknown("{}");
        assert_eq!(message.name, "Unknown");
    }
}
