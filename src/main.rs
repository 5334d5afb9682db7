//! Tickline - Main Entry Point
//!
//! Wires the ingestion pipeline, decision gate, position ledger and the
//! optional real-venue bridge, then runs until the consumer dies or a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tickline::common::channels::create_event_channel_with_capacity;
use tickline::config::{load_config, AppConfig};
use tickline::execution::{ExecutionBridge, RestVenueClient};
use tickline::gate::{DecisionGate, TradeSizing};
use tickline::ledger::PositionLedger;
use tickline::market::shared_windows;
use tickline::pipeline::{spawn_housekeeping, spawn_supervised, PipelineConsumer, StdinSource};
use tickline::scoring::{LlmScoringClient, ScoringClient};
use tickline::signal::SignalDeduplicator;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Comma-separated list of instruments to trade, overriding config
    #[arg(long)]
    instruments: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config: AppConfig = load_config(Some(&args.config))?;
    if let Some(instruments) = args.instruments {
        config.engine.instruments = instruments
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    info!(
        instruments = ?config.engine.instruments,
        balance = %config.engine.starting_balance,
        live = config.engine.live_trading,
        "Starting tickline engine"
    );

    let windows = shared_windows();
    let ledger = Arc::new(PositionLedger::new(config.engine.starting_balance));

    let scorer: Arc<dyn ScoringClient> = Arc::new(
        LlmScoringClient::new(
            &config.scoring.base_url,
            config.scoring.api_key.as_deref().unwrap_or(""),
            &config.scoring.model,
        )
        .with_min_interval(Duration::from_secs(
            config.scoring.min_request_interval_seconds,
        )),
    );

    let mut gate = DecisionGate::new(
        scorer,
        Arc::clone(&windows),
        Arc::clone(&ledger),
        config.engine.instruments.clone(),
        TradeSizing {
            margin: config.engine.margin_per_trade,
            leverage: config.engine.leverage,
        },
    )
    .with_confidence_threshold(config.engine.confidence_threshold);

    if config.engine.live_trading {
        let venue_config = config
            .venue
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("live_trading requires a [venue] section"))?;
        let mut venue = RestVenueClient::new(&venue_config.base_url)?;
        if let Some(key) = &venue_config.api_key {
            venue = venue.with_api_key(key.clone());
        }
        let bridge = ExecutionBridge::connect(Arc::new(venue)).await?;
        gate = gate.with_bridge(Arc::new(bridge));
        info!("Live trading enabled; accepted decisions will be mirrored");
    }

    let (sender, receiver) = create_event_channel_with_capacity(config.engine.queue_capacity);

    let consumer = PipelineConsumer::new(
        receiver,
        Arc::clone(&windows),
        Arc::clone(&ledger),
        Arc::new(gate),
        SignalDeduplicator::with_threshold(config.engine.dedup_threshold),
    );

    // Reference feed: `tick <INSTRUMENT> <PRICE>` and free-text signal
    // lines on stdin. Richer sources plug in through the same trait.
    spawn_supervised(
        Box::new(StdinSource),
        sender.clone(),
        Duration::from_secs(config.engine.producer_backoff_seconds),
    );
    // Keep `sender` alive in main so the consumer only sees the channel
    // close during shutdown.

    let housekeeping = spawn_housekeeping(
        Arc::clone(&ledger),
        Arc::clone(&windows),
        Duration::from_secs(config.engine.housekeeping_interval_seconds),
    );

    let consumer_handle = tokio::spawn(consumer.run());

    tokio::select! {
        result = consumer_handle => {
            housekeeping.abort();
            match result {
                Ok(Err(e)) => {
                    error!(error = %e, "Pipeline consumer failed; shutting down");
                    std::process::exit(1);
                }
                Ok(Ok(())) => {}
                Err(e) => {
                    error!(error = %e, "Pipeline consumer panicked; shutting down");
                    std::process::exit(1);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, cleaning up...");
            ledger.pause();
            housekeeping.abort();
            drop(sender);
        }
    }

    info!(
        balance = %ledger.balance().await,
        realized_pnl = %ledger.total_realized_pnl().await,
        "Engine stopped"
    );

    Ok(())
}
