//! Decision Gate: from accepted signal to (maybe) an open position
//!
//! The gate resolves which instrument a signal concerns, asks the scoring
//! collaborator for a verdict, and only acts on decisions that clear the
//! confidence bar with a tradeable direction. Collaborator failures of any
//! kind degrade to Hold; the pipeline never stops because a scorer
//! misbehaved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::common::types::{Side, Signal};
use crate::execution::{EntryOrder, ExecutionBridge};
use crate::ledger::{OpenRequest, PositionLedger};
use crate::market::SharedWindows;
use crate::scoring::{instrument_base, Decision, ScoreRequest, ScoringClient};

/// Confidence a decision must strictly exceed to be acted on.
pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 75;

/// Per-trade sizing applied to every accepted decision.
#[derive(Debug, Clone)]
pub struct TradeSizing {
    /// Margin committed per position, pre-leverage
    pub margin: Decimal,
    pub leverage: u32,
}

/// The confidence-gated decision filter.
pub struct DecisionGate {
    scorer: Arc<dyn ScoringClient>,
    windows: SharedWindows,
    ledger: Arc<PositionLedger>,
    /// Real-order mirroring; `None` runs simulation only
    bridge: Option<Arc<ExecutionBridge>>,
    /// The allowed set of tradeable instruments
    instruments: Vec<String>,
    sizing: TradeSizing,
    confidence_threshold: u8,
    /// Global run/pause flag, shared with the ledger
    running: Arc<AtomicBool>,
}

impl DecisionGate {
    pub fn new(
        scorer: Arc<dyn ScoringClient>,
        windows: SharedWindows,
        ledger: Arc<PositionLedger>,
        instruments: Vec<String>,
        sizing: TradeSizing,
    ) -> Self {
        let running = ledger.running_flag();
        Self {
            scorer,
            windows,
            ledger,
            bridge: None,
            instruments,
            sizing,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            running,
        }
    }

    /// Enable real-order mirroring through the execution bridge.
    pub fn with_bridge(mut self, bridge: Arc<ExecutionBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: u8) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Process one deduplicated signal end to end.
    ///
    /// This path may suspend for a long time inside the scoring call; it is
    /// run concurrently with tick processing and must not assume prices
    /// stand still.
    pub async fn handle_signal(&self, signal: Signal) {
        let Some(instrument) = self.resolve_instrument(&signal.text).await else {
            debug!(source = %signal.source, "No tradeable instrument resolved for signal");
            return;
        };

        let (price, changes) = {
            let windows = self.windows.read().await;
            (
                windows.current_price(&instrument),
                windows.changes(&instrument),
            )
        };
        if price.is_zero() {
            debug!(%instrument, "No price recorded yet; signal skipped");
            return;
        }

        let request = ScoreRequest {
            instrument: instrument.clone(),
            current_price: price,
            changes,
            signal_text: signal.text.clone(),
            context_text: None,
        };

        let decision = match self.scorer.score(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(%instrument, error = %e, "Scoring collaborator failed; treating as HOLD");
                Decision::hold(format!("scoring failure: {e}"))
            }
        };

        let Some(side) = self.accept(&instrument, &decision) else {
            return;
        };

        // Re-check the pause flag at the act-on-decision step: the scoring
        // call may have been in flight when the operator paused.
        if !self.running.load(Ordering::SeqCst) {
            info!(%instrument, "Engine paused; discarding accepted decision");
            return;
        }

        self.act(&instrument, side, &decision).await;
    }

    /// Apply the confidence gate. Returns the tradeable side iff accepted.
    fn accept(&self, instrument: &str, decision: &Decision) -> Option<Side> {
        let side = decision.action.side();
        let confident = decision.confidence > self.confidence_threshold;

        match (side, confident) {
            (Some(side), true) => {
                info!(
                    %instrument,
                    action = %decision.action,
                    confidence = decision.confidence,
                    reason = %decision.reason,
                    "Decision accepted"
                );
                Some(side)
            }
            _ => {
                info!(
                    %instrument,
                    action = %decision.action,
                    confidence = decision.confidence,
                    threshold = self.confidence_threshold,
                    "Decision discarded"
                );
                None
            }
        }
    }

    async fn act(&self, instrument: &str, side: Side, decision: &Decision) {
        let price = self.windows.read().await.current_price(instrument);
        if price.is_zero() {
            warn!(%instrument, "Price vanished before acting on decision");
            return;
        }

        let open = OpenRequest {
            instrument: instrument.to_string(),
            side,
            price,
            margin: self.sizing.margin,
            leverage: self.sizing.leverage,
            take_profit_pct: decision.take_profit_pct,
            stop_loss_pct: decision.stop_loss_pct,
            validity_minutes: decision.validity_minutes,
        };

        match self.ledger.open(open).await {
            Ok(position) => {
                if let Some(bridge) = &self.bridge {
                    let entry = EntryOrder {
                        instrument: instrument.to_string(),
                        side,
                        margin: self.sizing.margin,
                        leverage: self.sizing.leverage,
                        price_hint: position.entry_price,
                        take_profit_pct: decision.take_profit_pct,
                        stop_loss_pct: decision.stop_loss_pct,
                    };
                    // Mirroring failures never touch the simulated position.
                    if let Err(e) = bridge.mirror_entry(&entry).await {
                        match e.as_refusal() {
                            Some(refusal) => {
                                warn!(%instrument, %refusal, "Real-order path refused")
                            }
                            None => warn!(%instrument, error = %e, "Real-order mirroring failed"),
                        }
                    }
                }
            }
            Err(e) => match e.as_refusal() {
                Some(refusal) => info!(%instrument, %refusal, "Open refused"),
                None => warn!(%instrument, error = %e, "Open failed"),
            },
        }
    }

    /// Resolve the target instrument: direct name matching first, then the
    /// collaborator's symbol detection, constrained to the allowed set.
    async fn resolve_instrument(&self, text: &str) -> Option<String> {
        if let Some(instrument) = self.match_directly(text) {
            debug!(%instrument, "Instrument resolved by direct match");
            return Some(instrument);
        }

        match self.scorer.resolve_symbol(text, &self.instruments).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "Symbol resolution failed; treating as none");
                None
            }
        }
    }

    /// Token-wise match of the signal text against instrument names and
    /// their base assets.
    fn match_directly(&self, text: &str) -> Option<String> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_uppercase())
            .collect();

        self.instruments
            .iter()
            .find(|instrument| {
                let full = instrument.to_uppercase();
                let base = instrument_base(instrument);
                tokens.iter().any(|t| *t == full || *t == base)
            })
            .cloned()
    }
}
