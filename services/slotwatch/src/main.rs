//! slotwatch binary.
//!
//! Without flags, runs one combined check, prints the result and exits
//! (status 1 if the check fails). With `--bot`, runs the chat bot until
//! interrupted.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slotwatch::message::render_one_shot;
use slotwatch::transport::TelegramTransport;
use slotwatch::{
    AvailabilitySource, BookingSource, CommandHandler, Config, LogFormat, Notifier, Reconciler,
    ReconcilerConfig, Registry,
};

/// Appointment availability watcher.
#[derive(Debug, Parser)]
#[command(name = "slotwatch", version, about)]
struct Cli {
    /// Run continuously as a chat bot instead of checking once.
    #[arg(long)]
    bot: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&config);

    info!(
        endpoint = %config.endpoint,
        targets = config.targets.len(),
        time_zone = %config.time_zone,
        window_months = config.window_months,
        "Configuration loaded"
    );

    if cli.bot {
        run_bot(config).await?;
        Ok(ExitCode::SUCCESS)
    } else {
        run_once(&config).await
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run_once(config: &Config) -> Result<ExitCode> {
    let source = BookingSource::from_config(config)?;

    match source.check().await {
        Ok(check) => {
            println!("{}", render_one_shot(&check, &config.booking_url));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Availability check failed");
            eprintln!("Error checking availability: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_bot(config: Config) -> Result<()> {
    let token = config
        .telegram_token
        .as_deref()
        .context("TELEGRAM_BOT_TOKEN must be set in bot mode")?;

    info!("Starting slotwatch bot");

    let telegram = Arc::new(TelegramTransport::new(&config.telegram_api_url, token)?);
    let me = telegram
        .get_me()
        .await
        .context("failed to authenticate with the Telegram Bot API")?;
    info!(
        bot_id = me.id,
        bot_username = me.username.as_deref().unwrap_or("unknown"),
        "Authorized on chat account"
    );

    let source: Arc<dyn AvailabilitySource> = Arc::new(BookingSource::from_config(&config)?);
    let registry = Arc::new(Registry::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (transition_tx, transition_rx) = mpsc::channel(16);
    let (inbound_tx, inbound_rx) = mpsc::channel(64);

    let notifier = Arc::new(Notifier::new(
        Arc::clone(&registry),
        Arc::clone(&source),
        telegram.clone(),
        config.booking_url.clone(),
    ));

    let handler = CommandHandler::new(
        Arc::clone(&registry),
        Arc::clone(&source),
        telegram.clone(),
        config.booking_url.clone(),
        config.digest_interval(),
    );

    let reconciler = Reconciler::new(
        Arc::clone(&source),
        transition_tx,
        ReconcilerConfig {
            check_interval: config.check_interval(),
        },
    );

    let reconciler_handle = tokio::spawn(reconciler.run(shutdown_rx.clone()));

    let transitions_handle = tokio::spawn({
        let notifier = Arc::clone(&notifier);
        let shutdown_rx = shutdown_rx.clone();
        async move { notifier.run_transitions(transition_rx, shutdown_rx).await }
    });

    let digest_handle = tokio::spawn({
        let notifier = Arc::clone(&notifier);
        let shutdown_rx = shutdown_rx.clone();
        let interval = config.digest_interval();
        async move { notifier.run_digest(interval, shutdown_rx).await }
    });

    let updates_handle = tokio::spawn({
        let telegram = Arc::clone(&telegram);
        let shutdown_rx = shutdown_rx.clone();
        async move { telegram.run_updates(inbound_tx, shutdown_rx).await }
    });

    let handler_handle = tokio::spawn(async move { handler.run(inbound_rx, shutdown_rx).await });

    info!(
        check_interval_secs = config.check_interval_secs,
        digest_interval_secs = config.digest_interval_secs,
        "Bot is running"
    );

    shutdown_signal().await;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    let workers = async {
        for (name, handle) in [
            ("reconciler", reconciler_handle),
            ("transitions", transitions_handle),
            ("digest", digest_handle),
            ("updates", updates_handle),
            ("commands", handler_handle),
        ] {
            if let Err(e) = handle.await {
                error!(worker = name, error = %e, "Worker task panicked");
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), workers)
        .await
        .is_err()
    {
        warn!("Workers did not stop in time");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
