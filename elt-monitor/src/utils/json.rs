//! JSON parsing/serialization helpers with consistent warning logs.
//!
//! Failure payloads nest JSON inside JSON strings. Every decode on that path is
//! best effort: a failure is logged with the location it happened at and the
//! caller falls back to the raw text.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::{Error, Result};

/// Where a JSON string came from, for log fields.
#[derive(Debug, Clone, Copy)]
pub enum JsonContext<'a> {
    /// A field of an inbound failure envelope (`Cause`, `errorMessage`, ...).
    EventField {
        field: &'static str,
        error_type: Option<&'a str>,
    },
    /// A field of an already classified message.
    MessageField {
        kind: &'static str,
        field: &'static str,
    },
    /// The text of a handler failure.
    HandlerFailure { name: &'a str },
}

fn warn_parse_error(raw_len: usize, error: &Error, ctx: JsonContext<'_>, msg: &str) {
    match ctx {
        JsonContext::EventField { field, error_type } => {
            warn!(field, error_type, raw_len, error = %error, "{msg}");
        }
        JsonContext::MessageField { kind, field } => {
            warn!(kind, field, raw_len, error = %error, "{msg}");
        }
        JsonContext::HandlerFailure { name } => {
            warn!(handler_error = %name, raw_len, error = %error, "{msg}");
        }
    }
}

fn warn_serialize_error(error: serde_json::Error, ctx: JsonContext<'_>, msg: &str) {
    match ctx {
        JsonContext::EventField { field, error_type } => {
            warn!(field, error_type, error = %error, "{msg}");
        }
        JsonContext::MessageField { kind, field } => {
            warn!(kind, field, error = %error, "{msg}");
        }
        JsonContext::HandlerFailure { name } => {
            warn!(handler_error = %name, error = %error, "{msg}");
        }
    }
}

/// Parse `raw` into `T`. Undecodable text is an [`Error::MalformedPayload`].
pub fn parse<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::malformed(e.to_string()))
}

/// Parse `raw` into `T`, logging and returning `None` on failure.
pub fn parse_or_warn<T: DeserializeOwned>(raw: &str, ctx: JsonContext<'_>, msg: &str) -> Option<T> {
    match parse(raw) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn_parse_error(raw.len(), &error, ctx, msg);
            None
        }
    }
}

/// Parse `raw` as JSON without logging, where failure is an expected outcome.
pub fn try_parse_value(raw: &str) -> Option<Value> {
    serde_json::from_str(raw.trim()).ok()
}

/// Parse `raw` as JSON and pretty-print it; returns `None` if it is not JSON.
pub fn reformat_pretty(raw: &str) -> Option<String> {
    let value = try_parse_value(raw)?;
    serde_json::to_string_pretty(&value).ok()
}

pub fn to_string_or_fallback<T: Serialize + ?Sized>(
    value: &T,
    fallback: &'static str,
    ctx: JsonContext<'_>,
    msg: &str,
) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(error) => {
            warn_serialize_error(error, ctx, msg);
            fallback.to_string()
        }
    }
}

pub fn to_pretty_or_fallback<T: Serialize + ?Sized>(
    value: &T,
    fallback: &'static str,
    ctx: JsonContext<'_>,
    msg: &str,
) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => json,
        Err(error) => {
            warn_serialize_error(error, ctx, msg);
            fallback.to_string()
        }
    }
}
