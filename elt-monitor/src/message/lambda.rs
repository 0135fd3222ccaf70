//! Function crash reports.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ErrorMessage, MessageBody, MessageKind, Severity};
use crate::error::HandlerError;
use crate::utils::json::{self, JsonContext};

/// Allowlisted runtime values captured when a function crashes.
///
/// Field names follow the runtime variable names without their `AWS_` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeEnv {
    pub execution_env: String,
    pub default_region: String,
    pub lambda_function_name: String,
    pub lambda_function_memory_size: String,
    pub lambda_log_group_name: String,
    pub lambda_log_stream_name: String,
}

impl RuntimeEnv {
    /// Variables read by [`RuntimeEnv::from_lookup`], in field order.
    pub const VARIABLES: [&'static str; 6] = [
        "AWS_EXECUTION_ENV",
        "AWS_DEFAULT_REGION",
        "AWS_LAMBDA_FUNCTION_NAME",
        "AWS_LAMBDA_FUNCTION_MEMORY_SIZE",
        "AWS_LAMBDA_LOG_GROUP_NAME",
        "AWS_LAMBDA_LOG_STREAM_NAME",
    ];

    /// Snapshot of the current process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a snapshot from any key lookup. Missing keys become empty strings.
    pub fn from_lookup(mut lookup: impl FnMut(&str) -> Option<String>) -> Self {
        let [
            execution_env,
            default_region,
            lambda_function_name,
            lambda_function_memory_size,
            lambda_log_group_name,
            lambda_log_stream_name,
        ] = Self::VARIABLES.map(|key| {
            lookup(key).unwrap_or_else(|| {
                debug!(variable = key, "Runtime variable not set");
                String::new()
            })
        });

        Self {
            execution_env,
            default_region,
            lambda_function_name,
            lambda_function_memory_size,
            lambda_log_group_name,
            lambda_log_stream_name,
        }
    }
}

/// Per-invocation context handed to wrapped handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
    pub env: RuntimeEnv,
}

impl InvocationContext {
    pub fn new(request_id: impl Into<String>, env: RuntimeEnv) -> Self {
        Self {
            request_id: request_id.into(),
            env,
        }
    }

    /// Deep link to this invocation's log lines.
    pub fn cloudwatch_link(&self) -> String {
        cloudwatch_link(
            &self.env.default_region,
            &self.env.lambda_log_group_name,
            &self.env.lambda_log_stream_name,
            &self.request_id,
        )
    }

    /// Function name, if the runtime reported one.
    pub fn function_name(&self) -> Option<&str> {
        Some(self.env.lambda_function_name.as_str()).filter(|name| !name.is_empty())
    }
}

/// Deep link to the log stream of one invocation, filtered to its request id.
pub fn cloudwatch_link(
    region: &str,
    log_group_name: &str,
    log_stream_name: &str,
    request_id: &str,
) -> String {
    let encoded_log_group = urlencoding::encode(log_group_name);
    let encoded_log_stream = urlencoding::encode(log_stream_name);
    let quoted = format!("\"{request_id}\"");
    let filter_pattern = urlencoding::encode(&quoted);
    format!(
        "https://{region}.console.aws.amazon.com/cloudwatch/home\
         ?region={region}\
         #logsV2:log-groups/log-group/{encoded_log_group}\
         /log-events/{encoded_log_stream}\
         ?filterPattern={filter_pattern}"
    )
}

/// A crashed function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaErrorMessage {
    #[serde(flatten)]
    pub error: ErrorMessage,
    #[serde(default)]
    pub traceback: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub cloudwatch: String,
    #[serde(default)]
    pub envs: RuntimeEnv,
}

impl LambdaErrorMessage {
    pub fn from_error(error: &HandlerError, context: &InvocationContext) -> Self {
        Self {
            error: ErrorMessage::new(error.name(), error.message()),
            traceback: error.traceback(),
            request_id: context.request_id.clone(),
            cloudwatch: context.cloudwatch_link(),
            envs: context.env.clone(),
        }
    }

    /// Replace the environment snapshot. Done once, before the message is sent.
    pub fn attach_env(&mut self, envs: RuntimeEnv) {
        self.envs = envs;
    }
}

impl MessageBody for LambdaErrorMessage {
    const KIND: MessageKind = MessageKind::LambdaError;

    fn as_str(&self) -> String {
        let envs = json::to_pretty_or_fallback(
            &self.envs,
            "{}",
            JsonContext::MessageField {
                kind: Self::KIND.as_str(),
                field: "envs",
            },
            "Failed to serialize environment snapshot",
        );
        format!(
            "{}\nTraceback:\n{}\nAWS Request ID: {}\nCloudWatch Logs: {}\nEnvironment:\n{}\n",
            self.error.as_str(),
            self.traceback,
            self.request_id,
            self.cloudwatch,
            envs
        )
    }

    fn name(&self) -> Option<&str> {
        Some(&self.error.name)
    }

    fn severity(&self) -> Severity {
        Severity::Alert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REQUEST_ID: &str = "24dfa092-ca3b-400c-954d-7ce9cfbf4bc3";
    const LOG_STREAM: &str = "2024/10/31/[$LATEST]1ef30f6c48d24e3287ee2b41908216b2";

    fn runtime_env() -> RuntimeEnv {
        RuntimeEnv {
            execution_env: "python3.12".to_string(),
            default_region: "eu-central-1".to_string(),
            lambda_function_name: "TestFunction-dev".to_string(),
            lambda_function_memory_size: "128".to_string(),
            lambda_log_group_name: "/aws/lambda/TestFunction-dev".to_string(),
            lambda_log_stream_name: LOG_STREAM.to_string(),
        }
    }

    #[test]
    fn test_cloudwatch_link() {
        let link = cloudwatch_link(
            "eu-central-1",
            "/aws/lambda/ExtractLoadFunction-dev",
            LOG_STREAM,
            REQUEST_ID,
        );
        assert_eq!(
            link,
            "https://eu-central-1.console.aws.amazon.com/cloudwatch/home?region=eu-central-1\
             #logsV2:log-groups/log-group/%2Faws%2Flambda%2FExtractLoadFunction-dev\
             /log-events/2024%2F10%2F31%2F%5B%24LATEST%5D1ef30f6c48d24e3287ee2b41908216b2\
             ?filterPattern=%2224dfa092-ca3b-400c-954d-7ce9cfbf4bc3%22"
        );
    }

    #[test]
    fn test_runtime_env_from_lookup() {
        let env = RuntimeEnv::from_lookup(|key| match key {
            "AWS_DEFAULT_REGION" => Some("eu-central-1".to_string()),
            "AWS_LAMBDA_FUNCTION_NAME" => Some("Transform-dev".to_string()),
            _ => None,
        });
        assert_eq!(env.default_region, "eu-central-1");
        assert_eq!(env.lambda_function_name, "Transform-dev");
        assert!(env.lambda_log_stream_name.is_empty());
    }

    #[test]
    fn test_from_error() {
        let context = InvocationContext::new(REQUEST_ID, runtime_env());
        let error = HandlerError::new("RuntimeError", anyhow::anyhow!("Test Error"));

        let message = LambdaErrorMessage::from_error(&error, &context);
        assert_eq!(message.error.name, "RuntimeError");
        assert_eq!(message.error.text, "Test Error");
        assert_eq!(message.request_id, REQUEST_ID);
        assert!(message.cloudwatch.ends_with("%2224dfa092-ca3b-400c-954d-7ce9cfbf4bc3%22"));
        assert_eq!(message.envs.lambda_function_memory_size, "128");
        assert_eq!(message.traceback, "Test Error");
    }

    #[test]
    fn test_dict_round_trip() {
        let dict = json!({
            "name": "RuntimeError",
            "text": "Test Error",
            "traceback": "Test Error\n\nCaused by:\n    disk full",
            "request_id": REQUEST_ID,
            "cloudwatch": "https://example.com/logs",
            "envs": {
                "execution_env": "python3.12",
                "default_region": "eu-central-1",
                "lambda_function_name": "TestFunction-dev",
                "lambda_function_memory_size": "128",
                "lambda_log_group_name": "/aws/lambda/TestFunction-dev",
                "lambda_log_stream_name": LOG_STREAM
            }
        });

        let message: LambdaErrorMessage = serde_json::from_value(dict.clone()).unwrap();
        assert_eq!(serde_json::Value::Object(message.as_dict()), dict);
    }

    #[test]
    fn test_partial_body_defaults() {
        let message: LambdaErrorMessage =
            serde_json::from_str(r#"{"name":"X","text":"Y"}"#).unwrap();
        assert_eq!(message.error.name, "X");
        assert!(message.traceback.is_empty());
        assert_eq!(message.envs, RuntimeEnv::default());
    }

    #[test]
    fn test_as_str_extends_error_form() {
        let context = InvocationContext::new(REQUEST_ID, runtime_env());
        let error = HandlerError::new("RuntimeError", anyhow::anyhow!("Test Error"));
        let rendered = LambdaErrorMessage::from_error(&error, &context).as_str();

        assert!(rendered.starts_with("Error: RuntimeError\nMessage: Test Error\nTraceback:\n"));
        assert!(rendered.contains(&format!("AWS Request ID: {REQUEST_ID}\n")));
        assert!(rendered.contains("\"lambda_function_name\": \"TestFunction-dev\""));
        assert!(rendered.ends_with("}\n"));
    }

    #[test]
    fn test_attach_env() {
        let mut message: LambdaErrorMessage =
            serde_json::from_str(r#"{"name":"X","text":"Y"}"#).unwrap();
        message.attach_env(runtime_env());
        assert_eq!(message.envs.default_region, "eu-central-1");
    }
}
