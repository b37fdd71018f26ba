//! kingdom-send - Background daemon for scheduled posting
//!
//! Watches the scheduled post list and distributes each post when its time
//! comes.

use anyhow::Context;
use clap::Parser;
use libkingdom::logging::{LogFormat, LoggingConfig};
use libkingdom::{Config, KingdomError, KingdomService};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "kingdom-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
kingdom-send - Background daemon for scheduled posting

DESCRIPTION:
    kingdom-send is a long-running daemon that polls the Kingdom schedule
    and distributes every post whose time has come to its target platforms.
    A post is marked completed when at least one platform accepted it and
    failed otherwise. Failed posts are not retried.

USAGE:
    # Run in foreground (logs to stderr)
    kingdom-send

    # Check every 30 seconds, JSON logs
    kingdom-send --poll-interval 30 --log-format json

    # Process due posts once and exit
    kingdom-send --once

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current post)

CONFIGURATION:
    Configuration file: ~/.config/kingdom/config.toml (or $KINGDOM_CONFIG)
    Local store: ~/.local/share/kingdom/store.db (or $KINGDOM_STORE_PATH)

    [scheduling]
    poll_interval = 60  # seconds between polls

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
    3 - Invalid input
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty (overrides KINGDOM_LOG_FORMAT)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("kingdom-send: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_logging(cli: &Cli) {
    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init();
}

/// Exit status for an error, preferring the library's classification
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<KingdomError>())
        .map(|e| e.exit_code())
        .unwrap_or(1)
        .clamp(1, 255) as u8
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(seconds) = cli.poll_interval {
        if seconds == 0 {
            return Err(KingdomError::Config(libkingdom::error::ConfigError::InvalidValue {
                field: "--poll-interval".to_string(),
                reason: "must be at least 1 second".to_string(),
            })
            .into());
        }
        config.scheduling.poll_interval = seconds;
    }

    let service = KingdomService::from_config(config)
        .await
        .context("Failed to open the local store")?;

    info!("kingdom-send starting");

    if cli.once {
        let outcomes = service.run_due(chrono::Utc::now()).await?;
        for (id, status) in &outcomes {
            println!("{}\t{}", id, status);
        }
        info!("Processed {} scheduled post(s), exiting", outcomes.len());
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(Arc::clone(&shutdown))?;

    info!("Poll interval: {}s", service.config().scheduling.poll_interval);
    service.run_worker(shutdown).await;

    info!("kingdom-send stopped");
    Ok(())
}

/// Flip `shutdown` on SIGINT or SIGTERM
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received shutdown signal, stopping gracefully");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    Ok(())
}
