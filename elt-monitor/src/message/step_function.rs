//! Failures reported by the workflow orchestrator.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use super::{ErrorMessage, MessageBody, MessageKind, Severity};
use crate::utils::json;

/// Marker the orchestrator puts in front of a function's raw response when the
/// function did not report an error type.
pub const RETURNED_PAYLOAD_MARKER: &str = "Returned payload:";

/// Placeholder for absent optional fields in the rendered form.
const MISSING: &str = "-";

/// The JSON text following [`RETURNED_PAYLOAD_MARKER`], if the marker is present.
pub fn returned_payload(cause: &str) -> Option<&str> {
    let (_, rest) = cause.split_once(RETURNED_PAYLOAD_MARKER)?;
    // a second marker would belong to an embedded payload; stop there
    let payload = rest.split(RETURNED_PAYLOAD_MARKER).next().unwrap_or(rest);
    Some(payload.trim())
}

/// A failed state machine execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFunctionFailureMessage {
    #[serde(flatten)]
    pub error: ErrorMessage,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub execution_arn: Option<String>,
    #[serde(default)]
    pub state_machine_arn: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub start_date: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub stop_date: Option<i64>,
}

impl StepFunctionFailureMessage {
    pub fn new(name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            error: ErrorMessage::new(name, cause),
            input: None,
            execution_arn: None,
            state_machine_arn: None,
            start_date: None,
            stop_date: None,
        }
    }

    /// The cause, pretty-printed when it (or its returned payload) is JSON.
    pub fn cause_json(&self) -> String {
        let cause = &self.error.text;
        let candidate = returned_payload(cause).unwrap_or(cause);
        json::reformat_pretty(candidate).unwrap_or_else(|| cause.clone())
    }

    /// The execution input, pretty-printed when it is JSON.
    pub fn input_json(&self) -> String {
        match self.input.as_deref() {
            Some(input) => json::reformat_pretty(input).unwrap_or_else(|| input.to_string()),
            None => MISSING.to_string(),
        }
    }
}

fn format_epoch_millis(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| MISSING.to_string())
}

impl MessageBody for StepFunctionFailureMessage {
    const KIND: MessageKind = MessageKind::StepFunctionFailure;

    fn as_str(&self) -> String {
        format!(
            "{}\nCause:\n{}\nExecutionArn: {}\nStateMachineArn: {}\nStartDate: {}\nStopDate: {}\nInput:\n{}",
            self.error.as_str(),
            self.cause_json(),
            self.execution_arn.as_deref().unwrap_or(MISSING),
            self.state_machine_arn.as_deref().unwrap_or(MISSING),
            format_epoch_millis(self.start_date),
            format_epoch_millis(self.stop_date),
            self.input_json()
        )
    }

    fn name(&self) -> Option<&str> {
        Some(&self.error.name)
    }

    fn severity(&self) -> Severity {
        Severity::Alert
    }
}
