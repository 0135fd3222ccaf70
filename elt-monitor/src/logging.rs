//! Logging setup.
//!
//! Console output with local timezone timestamps, either human readable or as
//! JSON lines for log stores that index structured fields.

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "elt_monitor=info,reqwest=warn";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Console log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Filter from `RUST_LOG`, or [`DEFAULT_LOG_FILTER`] when unset or invalid.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_logging(format: LogFormat) -> crate::Result<()> {
    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(fmt::layer().with_ansi(true).with_timer(LocalTimer)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_timer(LocalTimer),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(pretty)
        .with(json)
        .try_init()
        .map_err(|e| crate::Error::config(format!("Failed to set global default subscriber: {}", e)))
}
