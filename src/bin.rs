//! Binary entry point for `checkin-bot`.
//!
//! This module provides the command-line interface for checkin-bot with options
//! for configuration file paths and logging verbosity. It initializes the
//! necessary components and starts the service.

use clap::Parser;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing::info;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};
use checkin_bot::base::{config::Config, types::Void};

/// Checkin-bot: daily work-location check-ins for Microsoft Teams.
///
/// Configuration can come from `config.toml` or `CHECKIN_BOT_*` environment variables.
/// The bot prompts employees on working days, reminds those who have not
/// answered, and answers questions about where the team is working.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the bot will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans over OTLP/HTTP (endpoint taken from the `OTEL_EXPORTER_OTLP_*` variables).
    #[arg(long)]
    otlp: bool,
    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

/// Main entry point for the checkin-bot binary.
///
/// Sets up logging based on verbosity, loads and validates configuration, and starts the bot.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer, if requested.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("checkin-bot");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let config = Config::load(args.config.as_deref())?;

    if args.check_config {
        info!(
            timezone = %config.timezone,
            region = %config.holiday_region,
            ai = config.ai_enabled(),
            directory_sync = config.directory_sync_enabled(),
            "Configuration is valid."
        );
        return Ok(());
    }

    checkin_bot::start(config).await
}
