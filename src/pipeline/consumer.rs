//! The single pipeline consumer
//!
//! Drains the ingestion channel in strict arrival order. Ticks update the
//! rolling windows and mark the ledger inline; signals pass the
//! deduplicator and are then handed to the decision gate on a spawned task,
//! so a slow scoring call never stalls tick processing.
//!
//! The consumer failing is fatal to the whole engine: it cannot safely keep
//! producing state changes blind to a broken sink, so `run` returning an
//! error must take the process down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{EngineEvent, MarketTick, Signal};
use crate::gate::DecisionGate;
use crate::ledger::PositionLedger;
use crate::market::SharedWindows;
use crate::signal::SignalDeduplicator;

/// Drains the ingestion channel and routes events.
pub struct PipelineConsumer {
    receiver: mpsc::Receiver<EngineEvent>,
    windows: SharedWindows,
    ledger: Arc<PositionLedger>,
    gate: Arc<DecisionGate>,
    dedup: SignalDeduplicator,
}

impl PipelineConsumer {
    pub fn new(
        receiver: mpsc::Receiver<EngineEvent>,
        windows: SharedWindows,
        ledger: Arc<PositionLedger>,
        gate: Arc<DecisionGate>,
        dedup: SignalDeduplicator,
    ) -> Self {
        Self {
            receiver,
            windows,
            ledger,
            gate,
            dedup,
        }
    }

    /// Consume events until the channel closes.
    ///
    /// A closed channel means every producer is gone; the engine has nothing
    /// left to react to and this is surfaced as a fatal error.
    pub async fn run(mut self) -> Result<()> {
        info!("Pipeline consumer started");

        while let Some(event) = self.receiver.recv().await {
            match event {
                EngineEvent::Tick(tick) => self.on_tick(tick).await,
                EngineEvent::Signal(signal) => self.on_signal(signal).await,
            }
        }

        Err(EngineError::ChannelReceive(
            "ingestion channel closed; all producers gone".into(),
        ))
    }

    async fn on_tick(&mut self, tick: MarketTick) {
        self.windows
            .write()
            .await
            .add(&tick.instrument, tick.price, tick.timestamp);

        // mark() both updates unrealized pnl and fires any close condition;
        // closures are logged and broadcast by the ledger itself.
        self.ledger.mark(&tick.instrument, tick.price).await;
    }

    async fn on_signal(&mut self, signal: Signal) {
        let (duplicate, similarity) = self.dedup.is_duplicate(&signal.text, signal.timestamp);
        if duplicate {
            info!(
                source = %signal.source,
                similarity,
                "Near-duplicate signal suppressed"
            );
            return;
        }
        // Novelty is recorded regardless of what the gate decides downstream
        self.dedup.record(&signal.text, signal.timestamp);
        debug!(source = %signal.source, similarity, "Signal accepted for scoring");

        // The gate may suspend on the scoring collaborator for a long time;
        // run it concurrently so ticks keep flowing.
        let gate = Arc::clone(&self.gate);
        tokio::spawn(async move {
            gate.handle_signal(signal).await;
        });
    }
}

/// Periodic housekeeping: re-mark every open position against the latest
/// window price so time-based expiry fires even when an instrument goes
/// quiet between ticks.
pub fn spawn_housekeeping(
    ledger: Arc<PositionLedger>,
    windows: SharedWindows,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick alignment burst
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            for position in ledger.open_positions().await {
                let price = windows.read().await.current_price(&position.instrument);
                if !price.is_zero() {
                    ledger.mark(&position.instrument, price).await;
                }
            }
        }
    })
}
