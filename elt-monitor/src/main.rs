use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};

use elt_monitor::config::{Environment, MonitorConfig};
use elt_monitor::logging::{self, LogFormat};
use elt_monitor::message::{Message, RuntimeEnv};
use elt_monitor::normalizer;
use elt_monitor::notification::channels::MENTION_MARKER;
use elt_monitor::notification::{
    MessageFormatter, NotificationService, Notifier, ResultsReport,
};
use elt_monitor::utils::{http_client, json};

/// Normalize a failure event and relay it to the configured channels.
#[derive(Parser, Debug)]
#[command(name = "elt-monitor", version, about)]
struct Args {
    /// Event JSON file, or `-` for stdin
    #[arg(short = 'e', long, default_value = "-")]
    event: String,

    /// Monitor configuration as JSON; read from the environment when omitted
    #[arg(short, long, env = "ELT_MONITOR_CONFIG")]
    config: Option<PathBuf>,

    /// Target environment, overriding the configuration
    #[arg(long = "env", value_parser = parse_environment)]
    environment: Option<Environment>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Treat the input as a handler results response instead of a failure event
    #[arg(long)]
    results: bool,

    /// Print the chat segments instead of sending anything
    #[arg(long)]
    dry_run: bool,
}

fn parse_environment(raw: &str) -> Result<Environment, String> {
    raw.parse().map_err(|e: elt_monitor::Error| e.to_string())
}

fn read_event(source: &str) -> anyhow::Result<Value> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading event from {source}"))?
    };
    json::parse(&raw).context("event is not valid JSON")
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MonitorConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading configuration from {}", path.display()))?;
            Ok(MonitorConfig::from_json(&raw)?)
        }
        None => Ok(MonitorConfig::from_env()),
    }
}

fn print_segments(segments: &[String]) {
    for segment in segments {
        println!("{segment}");
        println!("---");
    }
}

fn message_segments(message: &Message) -> Vec<String> {
    let prefix = if message.is_alert() { MENTION_MARKER } else { "" };
    MessageFormatter::default().format(prefix, &message.as_str())
}

async fn relay_results(
    response: &Value,
    config: &MonitorConfig,
    dry_run: bool,
) -> anyhow::Result<()> {
    let report = ResultsReport::parse(response, &RuntimeEnv::from_env());
    info!(
        failed = report.failed,
        environment = %config.environment,
        "Results report parsed"
    );

    if dry_run {
        print_segments(&report.segments(&MessageFormatter::default()));
        return Ok(());
    }

    let service = NotificationService::with_config(&config.channels, config.environment, None);
    if !service.is_enabled() {
        warn!("No notification channels configured, nothing sent");
        return Ok(());
    }

    service.send_results(&report).await;
    info!(channels = service.channel_count(), "Results report sent");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(format)?;
    http_client::install_rustls_provider();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(environment) = args.environment {
        config.environment = environment;
    }

    let event = read_event(&args.event)?;
    if args.results {
        return relay_results(&event, &config, args.dry_run).await;
    }

    let message = normalizer::from_event(&event);
    info!(
        kind = %message.kind(),
        severity = %message.severity(),
        environment = %config.environment,
        "Event normalized"
    );

    println!("{}", message.as_json());

    if args.dry_run {
        print_segments(&message_segments(&message));
        return Ok(());
    }

    // no mail transport ships with the binary; email channels are skipped
    let service = NotificationService::with_config(&config.channels, config.environment, None);
    if !service.is_enabled() {
        warn!("No notification channels configured, nothing sent");
        return Ok(());
    }

    service.notify(&message).await?;
    info!(channels = service.channel_count(), "Notification sent");
    Ok(())
}
