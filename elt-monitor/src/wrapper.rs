//! Invocation wrapper.
//!
//! [`MonitoredHandler`] runs a task handler and turns its outcome into
//! notifications. A handler failure is always classified: it is either
//! reported and answered with a synthetic response, or re-raised as a
//! structured error when fail-on-error is set.
//!
//! ```text
//! Running ─┬─ Ok, no status text ─────────────► Succeeded
//!          ├─ Ok, status text ────────────────► NotifiedSuccess
//!          ├─ Err, fail_on_error = false ─────► FailedNotified
//!          └─ Err, fail_on_error = true ──────► FailedPropagated
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::error::HandlerError;
use crate::message::{
    DbtMessage, ErrorMessage, InvocationContext, LambdaErrorMessage, Message, MessageBody,
    SimpleMessage,
};
use crate::notification::Notifier;
use crate::notification::report::ResultsReport;
use crate::utils::json::{self, JsonContext};
use crate::{Error, Result};

/// A task handler: one event in, one response out.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> std::result::Result<Value, HandlerError>;
}

/// Handler backed by an async closure. Built by [`handler_fn`].
pub struct FnHandler<F>(F);

/// Use an async closure as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value, InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, HandlerError>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Value, InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Value, HandlerError>> + Send,
{
    async fn handle(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> std::result::Result<Value, HandlerError> {
        (self.0)(event, context.clone()).await
    }
}

/// Wrapper behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperConfig {
    /// Propagate handler failures instead of reporting and swallowing them.
    pub fail_on_error: bool,
}

/// Status text derived from a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub text: String,
    /// Send as an error alert instead of plain status.
    pub is_error: bool,
}

/// Derives an optional status report from a handler response.
pub type PostHook = Arc<dyn Fn(&Value, &InvocationContext) -> Option<StatusReport> + Send + Sync>;

/// Post-hook reporting `summary` / `messages` / `traceback` responses.
pub fn results_post_hook() -> PostHook {
    Arc::new(|response: &Value, context: &InvocationContext| {
        let report = ResultsReport::parse(response, &context.env);
        report.status_text().map(|text| StatusReport {
            text,
            is_error: report.failed,
        })
    })
}

/// Lifecycle of one invocation. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationState {
    Running,
    Succeeded,
    NotifiedSuccess,
    FailedNotified,
    FailedPropagated,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::NotifiedSuccess => "notified_success",
            Self::FailedNotified => "failed_notified",
            Self::FailedPropagated => "failed_propagated",
        }
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler wrapped with failure reporting.
pub struct MonitoredHandler<H> {
    handler: H,
    notifier: Arc<dyn Notifier>,
    config: WrapperConfig,
    post_hook: Option<PostHook>,
}

/// Wrap `handler` so its outcome is reported through `notifier`.
///
/// Successful responses go through [`results_post_hook`] unless another hook
/// is installed.
pub fn wrap<H: Handler>(
    handler: H,
    notifier: Arc<dyn Notifier>,
    config: WrapperConfig,
) -> MonitoredHandler<H> {
    MonitoredHandler {
        handler,
        notifier,
        config,
        post_hook: Some(results_post_hook()),
    }
}

impl<H: Handler> MonitoredHandler<H> {
    pub fn with_post_hook(mut self, hook: PostHook) -> Self {
        self.post_hook = Some(hook);
        self
    }

    /// Never notify on success.
    pub fn without_post_hook(mut self) -> Self {
        self.post_hook = None;
        self
    }

    pub fn config(&self) -> WrapperConfig {
        self.config
    }

    /// Run the handler and return its (possibly synthetic) response.
    pub async fn invoke(&self, event: Value, context: &InvocationContext) -> Result<Value> {
        let (state, result) = self.invoke_traced(event, context).await;
        info!(
            request_id = %context.request_id,
            state = %state,
            "Invocation finished"
        );
        result
    }

    /// Like [`invoke`](Self::invoke), also returning the terminal state.
    ///
    /// Notification errors that channels propagate are returned as the result;
    /// the state still names the branch that was taken.
    pub async fn invoke_traced(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> (InvocationState, Result<Value>) {
        debug!(request_id = %context.request_id, state = %InvocationState::Running, "Invoking handler");

        match self.handler.handle(event, context).await {
            Ok(response) => self.on_success(response, context).await,
            Err(failure) => self.on_failure(failure, context).await,
        }
    }

    async fn on_success(
        &self,
        response: Value,
        context: &InvocationContext,
    ) -> (InvocationState, Result<Value>) {
        let status = self
            .post_hook
            .as_ref()
            .and_then(|hook| hook(&response, context))
            .filter(|status| !status.text.is_empty());

        let Some(status) = status else {
            return (InvocationState::Succeeded, Ok(response));
        };

        let message: Message = if status.is_error {
            let name = context.function_name().unwrap_or(ErrorMessage::UNKNOWN);
            ErrorMessage::new(name, status.text).into()
        } else {
            SimpleMessage::new(status.text).into()
        };

        let result = self.notifier.notify(&message).await.map(|()| response);
        (InvocationState::NotifiedSuccess, result)
    }

    async fn on_failure(
        &self,
        failure: HandlerError,
        context: &InvocationContext,
    ) -> (InvocationState, Result<Value>) {
        error!(
            request_id = %context.request_id,
            name = failure.name(),
            error = %failure,
            traceback = %failure.traceback(),
            "Handler failed"
        );

        if failure.is_dbt() {
            if self.config.fail_on_error {
                return (InvocationState::FailedPropagated, Err(Error::Handler(failure)));
            }

            let message = dbt_message(&failure);
            let text = message.as_str();
            let result = self
                .notifier
                .notify(&message.into())
                .await
                .map(|()| json!({ "statusCode": 200, "message": text }));
            return (InvocationState::FailedNotified, result);
        }

        let message = LambdaErrorMessage::from_error(&failure, context);
        if self.config.fail_on_error {
            return (
                InvocationState::FailedPropagated,
                Err(Error::LambdaException(message.as_json())),
            );
        }

        let fields = Value::Object(message.as_dict());
        let result = self
            .notifier
            .notify(&message.into())
            .await
            .map(|()| json!({ "statusCode": 500, "message": fields }));
        (InvocationState::FailedNotified, result)
    }
}

/// dbt failures carry a `{name, text}` body; anything else is kept as text.
fn dbt_message(failure: &HandlerError) -> DbtMessage {
    let raw = failure.message();
    let ctx = JsonContext::HandlerFailure {
        name: failure.name(),
    };
    json::parse_or_warn::<DbtMessage>(&raw, ctx, "dbt failure body is not a message")
        .unwrap_or_else(|| DbtMessage::new(failure.name(), raw))
}
