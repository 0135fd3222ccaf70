//! Failure envelope normalization.
//!
//! Orchestrator failures arrive as `{"Error": .., "Cause": ..}` where `Cause` is
//! frequently the JSON-encoded failure of the next layer down, sometimes behind
//! a `Returned payload:` prefix. [`from_event`] peels those layers off and
//! classifies the innermost recognizable one into a [`Message`].
//!
//! Nothing here fails: undecodable text is kept verbatim in the resulting message.

use serde_json::{Map, Value};
use tracing::debug;

use crate::message::{
    DbtMessage, ErrorMessage, LambdaErrorMessage, Message, StepFunctionFailureMessage,
    returned_payload,
};
use crate::utils::json::{self, JsonContext};

const ERROR_KEY: &str = "Error";
const CAUSE_KEY: &str = "Cause";
const ERROR_TYPE_KEY: &str = "errorType";
const ERROR_MESSAGE_KEY: &str = "errorMessage";

/// Discriminant of a direct crash report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /// A monitored function failed with fail-on-error enabled; `errorMessage`
    /// is a serialized [`LambdaErrorMessage`].
    LambdaException,
    /// A dbt run failed with fail-on-error enabled; `errorMessage` is a
    /// serialized [`DbtMessage`].
    DbtRuntimeError,
    /// Any other reported error type.
    Other(String),
    /// No `errorType` field.
    Missing,
}

impl ErrorType {
    pub fn of(event: &Map<String, Value>) -> Self {
        match event.get(ERROR_TYPE_KEY).and_then(Value::as_str) {
            Some("LambdaException") => Self::LambdaException,
            Some("DbtRuntimeError") => Self::DbtRuntimeError,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Missing,
        }
    }

    fn label(&self) -> Option<&str> {
        match self {
            Self::LambdaException => Some("LambdaException"),
            Self::DbtRuntimeError => Some("DbtRuntimeError"),
            Self::Other(name) => Some(name),
            Self::Missing => None,
        }
    }
}

/// Classify a raw failure envelope into exactly one message.
pub fn from_event(event: &Value) -> Message {
    let Some(top) = event.as_object() else {
        return unknown(event);
    };

    let mut current = top.clone();
    let mut innermost_pair: Option<Map<String, Value>> = None;
    let mut depth = 0usize;

    while let Some(next) = unwrap_cause(&current) {
        depth += 1;
        innermost_pair = Some(std::mem::replace(&mut current, next));
    }
    debug!(depth, "Unwrapped failure envelope");

    let error_type = ErrorType::of(&current);
    match error_type {
        ErrorType::LambdaException => lambda_message(&current, &error_type),
        ErrorType::DbtRuntimeError => dbt_message(&current, &error_type),
        ErrorType::Other(_) | ErrorType::Missing => {
            if has_error_pair(&current) {
                step_function_message(&current).into()
            } else if let Some(level) = innermost_pair {
                step_function_message(&level).into()
            } else {
                unknown(event)
            }
        }
    }
}

fn has_error_pair(event: &Map<String, Value>) -> bool {
    event.contains_key(ERROR_KEY) && event.contains_key(CAUSE_KEY)
}

/// The mapping one layer down, if `event` has an `Error`/`Cause` pair whose
/// cause decodes to a mapping.
fn unwrap_cause(event: &Map<String, Value>) -> Option<Map<String, Value>> {
    if !has_error_pair(event) {
        return None;
    }
    match event.get(CAUSE_KEY)? {
        Value::Object(inner) => Some(inner.clone()),
        Value::String(text) => match decode_cause(text)? {
            Value::Object(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

/// Decode a cause string, preferring a `Returned payload:` suffix over the full text.
fn decode_cause(text: &str) -> Option<Value> {
    if let Some(payload) = returned_payload(text)
        && let Some(value) = json::try_parse_value(payload)
    {
        return Some(value);
    }
    json::try_parse_value(text)
}

fn lambda_message(event: &Map<String, Value>, error_type: &ErrorType) -> Message {
    let raw = error_message_text(event);
    let ctx = JsonContext::EventField {
        field: ERROR_MESSAGE_KEY,
        error_type: error_type.label(),
    };
    match json::parse_or_warn::<LambdaErrorMessage>(&raw, ctx, "Crash report body is not a message") {
        Some(message) => message.into(),
        None => ErrorMessage::new("LambdaException", raw).into(),
    }
}

fn dbt_message(event: &Map<String, Value>, error_type: &ErrorType) -> Message {
    let raw = error_message_text(event);
    let ctx = JsonContext::EventField {
        field: ERROR_MESSAGE_KEY,
        error_type: error_type.label(),
    };
    match json::parse_or_warn::<DbtMessage>(&raw, ctx, "dbt failure body is not a message") {
        Some(message) => message.into(),
        None => DbtMessage::new("DbtRuntimeError", raw).into(),
    }
}

fn error_message_text(event: &Map<String, Value>) -> String {
    match event.get(ERROR_MESSAGE_KEY) {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn step_function_message(event: &Map<String, Value>) -> StepFunctionFailureMessage {
    StepFunctionFailureMessage {
        input: text_field(event, "Input"),
        execution_arn: text_field(event, "ExecutionArn"),
        state_machine_arn: text_field(event, "StateMachineArn"),
        start_date: event.get("StartDate").and_then(Value::as_i64),
        stop_date: event.get("StopDate").and_then(Value::as_i64),
        ..StepFunctionFailureMessage::new(
            text_field(event, ERROR_KEY).unwrap_or_default(),
            text_field(event, CAUSE_KEY).unwrap_or_default(),
        )
    }
}

/// A string field verbatim, or any other JSON value in its compact form.
fn text_field(event: &Map<String, Value>, key: &str) -> Option<String> {
    match event.get(key)? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn unknown(event: &Value) -> Message {
    let text = json::to_pretty_or_fallback(
        event,
        "{}",
        JsonContext::EventField {
            field: "*",
            error_type: None,
        },
        "Failed to dump unrecognized event",
    );
    ErrorMessage::unknown(text).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageBody, MessageKind};
    use rstest::rstest;
    use serde_json::json;

    fn lambda_body() -> String {
        json!({
            "name": "X",
            "text": "Y",
            "traceback": "Y\n\nCaused by:\n    connection reset",
            "request_id": "24dfa092-ca3b-400c-954d-7ce9cfbf4bc3",
            "cloudwatch": "https://example.com/logs",
            "envs": {"lambda_function_name": "ExtractLoadFunction-dev"}
        })
        .to_string()
    }

    #[test]
    fn test_lambda_exception() {
        let event = json!({"errorType": "LambdaException", "errorMessage": lambda_body()});
        let Message::LambdaError(message) = from_event(&event) else {
            panic!("expected a lambda error");
        };
        assert_eq!(message.error.name, "X");
        assert_eq!(message.error.text, "Y");
        assert_eq!(message.envs.lambda_function_name, "ExtractLoadFunction-dev");
    }

    #[test]
    fn test_lambda_exception_with_garbage_body() {
        let event = json!({"errorType": "LambdaException", "errorMessage": "not json"});
        assert_eq!(
            from_event(&event),
            Message::Error(ErrorMessage::new("LambdaException", "not json"))
        );
    }

    #[test]
    fn test_dbt_runtime_error() {
        let event = json!({
            "errorType": "DbtRuntimeError",
            "errorMessage": "{\"name\":\"dbt test\",\"text\":\"Done. PASS=3 ERROR=1\"}"
        });
        assert_eq!(
            from_event(&event),
            Message::Dbt(DbtMessage::new("dbt test", "Done. PASS=3 ERROR=1"))
        );
    }

    #[test]
    fn test_nested_cause_is_unwrapped() {
        let crash = json!({
            "errorMessage": "Test Error",
            "errorType": "RuntimeError",
            "requestId": "RequestId",
            "stackTrace": ["/var/task/monitor/app.py"]
        });
        let middle = json!({
            "Cause": crash.to_string(),
            "Error": "RuntimeError",
            "ExecutionArn": "arn:aws:states:eu-central-1:testtest:execution:Test-prod:d145050b",
            "Input": json!({"test": {"action": "test"}}).to_string()
        });
        let event = json!({"Error": "States.TaskFailed", "Cause": middle.to_string()});

        let Message::StepFunctionFailure(message) = from_event(&event) else {
            panic!("expected a step function failure");
        };
        assert_eq!(message.error.name, "RuntimeError");
        assert_eq!(message.error.text, crash.to_string());
        assert_eq!(
            message.execution_arn.as_deref(),
            Some("arn:aws:states:eu-central-1:testtest:execution:Test-prod:d145050b")
        );
    }

    #[test]
    fn test_nested_lambda_exception_wins() {
        let inner = json!({"errorType": "LambdaException", "errorMessage": lambda_body()});
        let middle = json!({"Error": "LambdaException", "Cause": inner.to_string()});
        let event = json!({"Error": "States.TaskFailed", "Cause": middle.to_string()});

        let message = from_event(&event);
        assert_eq!(message.kind(), MessageKind::LambdaError);
        assert_eq!(message.name(), Some("X"));
    }

    #[test]
    fn test_cause_as_mapping() {
        let event = json!({
            "Error": "States.TaskFailed",
            "Cause": {"errorType": "DbtRuntimeError", "errorMessage": "{\"name\":\"n\",\"text\":\"t\"}"}
        });
        assert_eq!(from_event(&event).kind(), MessageKind::Dbt);
    }

    #[test]
    fn test_returned_payload_cause() {
        let event = json!({
            "Cause": "The cause could not be determined because Lambda did not return an error type. Returned payload: {\"errorMessage\":\"2024-11-26T00:36:39.604Z 5b1c368c Task timed out after 600.15 seconds\"}",
            "Error": "Lambda.Unknown",
            "ExecutionArn": "arn:aws:states:eu-central-1:123456789:execution:ExtractLoad-prod:12747c42",
            "Input": "{\"job_id\":\"74d69da730b04488b7978b40719861e3\"}",
            "InputDetails": {"Included": true},
            "StartDate": 1732579237465i64,
            "StateMachineArn": "arn:aws:states:eu-central-1:073230366257:stateMachine:ExtractLoad-prod",
            "Status": "FAILED",
            "StopDate": 1732581399675i64
        });

        let Message::StepFunctionFailure(message) = from_event(&event) else {
            panic!("expected a step function failure");
        };
        assert_eq!(message.error.name, "Lambda.Unknown");
        assert_eq!(message.start_date, Some(1732579237465));
        assert!(message.cause_json().contains("Task timed out after 600.15 seconds"));
    }

    #[test]
    fn test_plain_text_cause_is_kept() {
        let event = json!({"Error": "States.Timeout", "Cause": "Execution timed out after 3600s"});
        let Message::StepFunctionFailure(message) = from_event(&event) else {
            panic!("expected a step function failure");
        };
        assert_eq!(message.error.text, "Execution timed out after 3600s");
        assert!(message.as_str().contains("Cause:\nExecution timed out after 3600s\n"));
    }

    #[test]
    fn test_unknown_event() {
        let event = json!({"detail": {"status": "FAILED"}, "source": "aws.states"});
        let message = from_event(&event);
        assert_eq!(
            message,
            Message::Error(ErrorMessage::unknown(
                "{\n  \"detail\": {\n    \"status\": \"FAILED\"\n  },\n  \"source\": \"aws.states\"\n}"
            ))
        );
    }

    #[rstest]
    #[case::crash_report(json!({"errorType": "RuntimeError", "errorMessage": "Test Error"}), MessageKind::Error)]
    #[case::not_a_mapping(json!(["Error", "Cause"]), MessageKind::Error)]
    #[case::error_without_cause(json!({"Error": "States.TaskFailed"}), MessageKind::Error)]
    #[case::numeric_cause(json!({"Error": "E", "Cause": 42}), MessageKind::StepFunctionFailure)]
    #[case::json_scalar_cause(json!({"Error": "E", "Cause": "\"quoted\""}), MessageKind::StepFunctionFailure)]
    #[case::lambda_exception(json!({"errorType": "LambdaException", "errorMessage": "{\"name\":\"n\",\"text\":\"t\"}"}), MessageKind::LambdaError)]
    fn test_classification(#[case] event: Value, #[case] expected: MessageKind) {
        assert_eq!(from_event(&event).kind(), expected);
    }

    #[test]
    fn test_long_mapping_chain_terminates() {
        let mut event = json!({"errorType": "DbtRuntimeError", "errorMessage": "{\"name\":\"n\",\"text\":\"t\"}"});
        for level in 0..64 {
            event = json!({"Error": format!("Level{level}"), "Cause": event});
        }
        assert_eq!(from_event(&event).kind(), MessageKind::Dbt);
    }

    #[test]
    fn test_string_encoded_chain_terminates() {
        let mut event = json!({"errorType": "DbtRuntimeError", "errorMessage": "{\"name\":\"n\",\"text\":\"t\"}"});
        for level in 0..8 {
            event = json!({"Error": format!("Level{level}"), "Cause": event.to_string()});
        }
        assert_eq!(from_event(&event).kind(), MessageKind::Dbt);
    }
}
