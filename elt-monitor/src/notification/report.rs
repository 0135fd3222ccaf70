//! Structured results reports returned by task handlers.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::debug;

use crate::message::RuntimeEnv;
use crate::notification::format::{MessageFormatter, SegmentStyle};

/// Timestamp layout of `started_at` / `ended_at`.
pub const REPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const FALLBACK_REGION: &str = "eu-central-1";

/// A handler's results, ready for chat delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsReport {
    /// Summary line, including the timing suffix when known.
    pub summary: String,
    /// Detail text, sent as code blocks.
    pub body: String,
    /// The run failed or crashed.
    pub failed: bool,
}

impl ResultsReport {
    /// Build a report from a handler response.
    ///
    /// Recognized keys are `summary`, `messages`, `success`, `started_at`,
    /// `ended_at` and `traceback`; anything else is ignored. A response that
    /// is not an object yields an empty report.
    pub fn parse(results: &Value, env: &RuntimeEnv) -> Self {
        let Some(results) = results.as_object() else {
            return Self::default();
        };

        let traceback = results.get("traceback");
        let mut summary = string_field(results, "summary");
        let mut body = string_field(results, "messages");

        if let Some(traceback) = traceback {
            summary = format!(":no_entry:  {}", crash_summary(env));
            body = match traceback {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
        }

        if let Some(timing) = timing(results) {
            summary.push_str(&timing);
        }

        let success = results
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Self {
            summary,
            body,
            failed: !success || traceback.is_some(),
        }
    }

    /// Chat texts, with the body chunked into code blocks.
    pub fn segments(&self, formatter: &MessageFormatter) -> Vec<String> {
        formatter
            .with_style(SegmentStyle::CodeBlock)
            .format(&self.summary, &self.body)
    }

    /// Summary line plus body, or `None` when the report is empty.
    pub fn status_text(&self) -> Option<String> {
        match (self.summary.is_empty(), self.body.is_empty()) {
            (true, true) => None,
            (false, true) => Some(self.summary.clone()),
            (true, false) => Some(self.body.clone()),
            (false, false) => Some(format!("{}\n{}", self.summary, self.body)),
        }
    }
}

/// A one-line crash notice linking to the function's log stream.
pub fn crash_summary(env: &RuntimeEnv) -> String {
    let region = if env.default_region.is_empty() {
        FALLBACK_REGION
    } else {
        env.default_region.as_str()
    };
    let log_group = urlencoding::encode(&env.lambda_log_group_name);
    let log_stream = urlencoding::encode(&env.lambda_log_stream_name);
    let url = format!(
        "https://{region}.console.aws.amazon.com/cloudwatch/home\
         ?region={region}\
         #logsV2:log-groups/log-group/{log_group}\
         /log-events/{log_stream}"
    );
    format!(
        "`{}` crashed, see <{}|log stream> for details",
        env.lambda_function_name, url
    )
}

fn string_field(results: &Map<String, Value>, key: &str) -> String {
    results
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn timing(results: &Map<String, Value>) -> Option<String> {
    let started_at = results.get("started_at")?.as_str()?;
    let ended_at = results.get("ended_at")?.as_str()?;

    let parse = |raw: &str| match NaiveDateTime::parse_from_str(raw, REPORT_TIME_FORMAT) {
        Ok(ts) => Some(ts),
        Err(e) => {
            debug!(value = raw, error = %e, "Unparseable report timestamp");
            None
        }
    };
    let start = parse(started_at)?;
    let end = parse(ended_at)?;
    // seconds component of the duration, never negative
    let seconds = (end - start).num_seconds().rem_euclid(86_400);

    Some(format!(" started at {} ({}s)", started_at, seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::format::CONTINUED_MARKER;
    use serde_json::json;

    fn env() -> RuntimeEnv {
        RuntimeEnv {
            default_region: "eu-central-1".to_string(),
            lambda_function_name: "ExtractLoadFunction-dev".to_string(),
            lambda_log_group_name: "/aws/lambda/ExtractLoadFunction-dev".to_string(),
            lambda_log_stream_name: "2024/10/31/[$LATEST]abc".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_with_timing() {
        let report = ResultsReport::parse(
            &json!({
                "summary": "ExtractLoad finished",
                "messages": "12 tables loaded",
                "started_at": "2024-11-26 01:00:00",
                "ended_at": "2024-11-26 01:02:05",
            }),
            &env(),
        );

        assert_eq!(
            report.summary,
            "ExtractLoad finished started at 2024-11-26 01:00:00 (125s)"
        );
        assert_eq!(report.body, "12 tables loaded");
        assert!(!report.failed);
    }

    #[test]
    fn test_parse_unparseable_timing_is_ignored() {
        let report = ResultsReport::parse(
            &json!({"summary": "done", "started_at": "yesterday", "ended_at": "today"}),
            &env(),
        );
        assert_eq!(report.summary, "done");
    }

    #[test]
    fn test_parse_timing_is_never_negative() {
        let report = ResultsReport::parse(
            &json!({
                "summary": "done",
                "started_at": "2024-11-26 01:00:10",
                "ended_at": "2024-11-26 01:00:00",
            }),
            &env(),
        );
        assert_eq!(report.summary, "done started at 2024-11-26 01:00:10 (86390s)");
    }

    #[test]
    fn test_parse_failure_flag() {
        let report = ResultsReport::parse(&json!({"summary": "x", "success": false}), &env());
        assert!(report.failed);
    }

    #[test]
    fn test_parse_traceback() {
        let report = ResultsReport::parse(
            &json!({"summary": "ignored", "traceback": "Traceback (most recent call last):\n..."}),
            &env(),
        );

        assert!(report.failed);
        assert_eq!(report.body, "Traceback (most recent call last):\n...");
        assert_eq!(
            report.summary,
            ":no_entry:  `ExtractLoadFunction-dev` crashed, see \
             <https://eu-central-1.console.aws.amazon.com/cloudwatch/home?region=eu-central-1\
             #logsV2:log-groups/log-group/%2Faws%2Flambda%2FExtractLoadFunction-dev\
             /log-events/2024%2F10%2F31%2F%5B%24LATEST%5Dabc|log stream> for details"
        );
    }

    #[test]
    fn test_parse_non_object() {
        let report = ResultsReport::parse(&json!("ok"), &env());
        assert_eq!(report, ResultsReport::default());
        assert_eq!(report.status_text(), None);
    }

    #[test]
    fn test_segments_use_code_blocks() {
        let report = ResultsReport {
            summary: "done".to_string(),
            body: "aaaa\nbbbb\ncccc\n".to_string(),
            failed: false,
        };
        let segments = report.segments(&MessageFormatter::new(10));

        assert_eq!(segments[0], "done\n```aaaa\nbbbb\n```");
        assert_eq!(segments[1], format!("{CONTINUED_MARKER}\n```cccc\n```"));
    }

    #[test]
    fn test_status_text() {
        let report = ResultsReport {
            summary: "done".to_string(),
            body: "details".to_string(),
            failed: false,
        };
        assert_eq!(report.status_text().as_deref(), Some("done\ndetails"));

        let summary_only = ResultsReport {
            body: String::new(),
            ..report
        };
        assert_eq!(summary_only.status_text().as_deref(), Some("done"));
    }
}
