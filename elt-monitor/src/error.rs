//! Crate-wide error types.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Delivery to a downstream channel failed (network, non-success status, rejected mail).
    #[error("Transport error ({channel}): {reason}")]
    Transport {
        channel: &'static str,
        reason: String,
    },

    #[error("Transport timeout ({channel}) after {after:?}")]
    Timeout {
        channel: &'static str,
        after: Duration,
    },

    /// Inbound text that should have been JSON was not.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A wrapped handler failed with fail-on-error enabled. Displays as the
    /// serialized message alone, so the crash report's `errorMessage` decodes.
    #[error("{0}")]
    LambdaException(String),

    /// A wrapped handler failure re-raised unchanged.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl Error {
    pub fn transport(channel: &'static str, reason: impl Into<String>) -> Self {
        Self::Transport {
            channel,
            reason: reason.into(),
        }
    }

    pub fn timeout(channel: &'static str, after: Duration) -> Self {
        Self::Timeout { channel, after }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this is a delivery failure of any kind.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failure raised by a wrapped handler.
///
/// `name` plays the role of the failure's type name in alerts; the wrapped
/// [`anyhow::Error`] provides the message text and the cause chain used as the
/// traceback.
#[derive(Error, Debug)]
#[error("{name}: {inner}")]
pub struct HandlerError {
    name: String,
    inner: anyhow::Error,
}

/// Name of dbt run failures, which are reported as informational.
pub const DBT_RUNTIME_ERROR: &str = "DbtRuntimeError";

impl HandlerError {
    pub fn new(name: impl Into<String>, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            name: name.into(),
            inner: inner.into(),
        }
    }

    /// A dbt run failure. `payload` is normally a JSON object with `name` and `text`.
    pub fn dbt(payload: impl Into<String>) -> Self {
        Self::new(DBT_RUNTIME_ERROR, anyhow::Error::msg(payload.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The failure message, without the cause chain.
    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    /// Multi-line rendering of the failure and every cause. Captured
    /// backtraces are left out.
    pub fn traceback(&self) -> String {
        let mut chain = self.inner.chain();
        let mut out = chain.next().map(|e| e.to_string()).unwrap_or_default();
        let causes: Vec<_> = chain.collect();
        match causes.as_slice() {
            [] => {}
            [cause] => {
                out.push_str("\n\nCaused by:\n    ");
                out.push_str(&cause.to_string());
            }
            many => {
                out.push_str("\n\nCaused by:");
                for (i, cause) in many.iter().enumerate() {
                    out.push_str(&format!("\n    {i}: {cause}"));
                }
            }
        }
        out
    }

    pub fn is_dbt(&self) -> bool {
        self.name == DBT_RUNTIME_ERROR
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(inner: anyhow::Error) -> Self {
        Self::new("Error", inner)
    }
}
