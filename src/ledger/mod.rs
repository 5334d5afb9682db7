//! Position Ledger: account balance and open-position lifecycle
//!
//! The ledger is the single writer of balance and position state. Every
//! other component observes it or requests mutation through its operations;
//! nothing else touches a `Position` directly.
//!
//! Mutations take a coarse async `Mutex` over the whole ledger. Event rates
//! here are a handful of opens per hour and one mark per tick, so a
//! per-instrument lock buys nothing; the mutex gives the per-instrument
//! mutual exclusion the open/mark/close race requires.
//!
//! State changes are announced on a `broadcast` channel. The ledger never
//! depends on whether anyone is listening; send errors from a subscriber-less
//! channel are ignored.

mod position;

pub use position::{CloseReason, ClosureRecord, Position, PositionStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::common::errors::{EngineError, Refusal, Result};
use crate::common::types::Side;

/// Capacity of the ledger event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A request to open a position.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub instrument: String,
    pub side: Side,
    /// Entry price (latest price from the rolling window)
    pub price: Decimal,
    /// Capital committed, pre-leverage
    pub margin: Decimal,
    pub leverage: u32,
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub validity_minutes: i64,
}

/// State-change notifications emitted by the ledger.
///
/// Observers (dashboards, loggers) subscribe independently; the ledger does
/// not know or care whether any exist.
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    Opened(Position),
    Closed(ClosureRecord),
}

#[derive(Debug)]
struct LedgerInner {
    balance: Decimal,
    total_realized_pnl: Decimal,
    positions: HashMap<String, Position>,
}

/// The account ledger: balance, realized pnl, and the map of open positions.
pub struct PositionLedger {
    inner: Mutex<LedgerInner>,
    /// Global run/pause flag. Checked before any state-mutating open.
    running: Arc<AtomicBool>,
    events: broadcast::Sender<LedgerEvent>,
}

impl PositionLedger {
    /// Create a ledger with a starting balance. Trading starts enabled.
    pub fn new(starting_balance: Decimal) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(LedgerInner {
                balance: starting_balance,
                total_realized_pnl: Decimal::ZERO,
                positions: HashMap::new(),
            }),
            running: Arc::new(AtomicBool::new(true)),
            events,
        }
    }

    /// Subscribe to open/close notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Handle to the global run/pause flag, shared with the decision gate.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Pause trading: no new positions will be opened. Open positions keep
    /// being marked and may still close.
    pub fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Trading paused");
    }

    /// Resume trading.
    pub fn resume(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("Trading resumed");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Open a position.
    ///
    /// Refused without any state change when the instrument already has an
    /// open position, when the balance cannot cover the margin, or when
    /// trading is paused. On success the margin is debited and a snapshot of
    /// the new position is returned.
    pub async fn open(&self, req: OpenRequest) -> Result<Position> {
        if !self.is_running() {
            return Err(EngineError::OrderRefused(Refusal::TradingPaused));
        }

        let mut inner = self.inner.lock().await;

        if inner.positions.contains_key(&req.instrument) {
            return Err(EngineError::OrderRefused(Refusal::AlreadyOpen {
                instrument: req.instrument,
            }));
        }
        if inner.balance < req.margin {
            return Err(EngineError::OrderRefused(Refusal::InsufficientBalance {
                balance: inner.balance,
                margin: req.margin,
            }));
        }

        let (take_profit_price, stop_loss_price) = bracket_prices(
            req.side,
            req.price,
            req.take_profit_pct,
            req.stop_loss_pct,
        );
        let quantity = req.margin * Decimal::from(req.leverage) / req.price;
        let now = Utc::now();

        let position = Position {
            instrument: req.instrument.clone(),
            side: req.side,
            entry_price: req.price,
            quantity,
            leverage: req.leverage,
            margin: req.margin,
            take_profit_price,
            stop_loss_price,
            expiry_time: now + Duration::seconds(req.validity_minutes * 60),
            current_price: req.price,
            unrealized_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            opened_at: now,
        };

        inner.balance -= req.margin;
        inner.positions.insert(req.instrument.clone(), position.clone());

        info!(
            instrument = %position.instrument,
            side = %position.side,
            entry = %position.entry_price,
            quantity = %position.quantity,
            tp = %position.take_profit_price,
            sl = %position.stop_loss_price,
            balance = %inner.balance,
            "Position opened"
        );

        let _ = self.events.send(LedgerEvent::Opened(position.clone()));
        Ok(position)
    }

    /// Mark an open position to market.
    ///
    /// No-op when the instrument has no open position. Updates the current
    /// price and unrealized pnl, then evaluates close conditions: expiry
    /// first, then take-profit / stop-loss. At most one close reason fires;
    /// when one does, the position is closed in the same call and the
    /// closure record is returned.
    pub async fn mark(&self, instrument: &str, price: Decimal) -> Option<ClosureRecord> {
        let mut inner = self.inner.lock().await;

        let close_reason = {
            let position = inner.positions.get_mut(instrument)?;
            position.current_price = price;
            position.unrealized_pnl = match position.side {
                Side::Long => (price - position.entry_price) * position.quantity,
                Side::Short => (position.entry_price - price) * position.quantity,
            };

            if Utc::now() > position.expiry_time {
                Some(CloseReason::TimeLimit)
            } else {
                match position.side {
                    Side::Long if price >= position.take_profit_price => {
                        Some(CloseReason::TakeProfit)
                    }
                    Side::Long if price <= position.stop_loss_price => Some(CloseReason::StopLoss),
                    Side::Short if price <= position.take_profit_price => {
                        Some(CloseReason::TakeProfit)
                    }
                    Side::Short if price >= position.stop_loss_price => Some(CloseReason::StopLoss),
                    _ => None,
                }
            }
        };

        match close_reason {
            Some(reason) => self.close_locked(&mut inner, instrument, reason),
            None => {
                debug!(instrument, price = %price, "Position marked");
                None
            }
        }
    }

    /// Close an open position, realizing its pnl.
    ///
    /// Closing an instrument with no open position is a silent no-op.
    pub async fn close(&self, instrument: &str, reason: CloseReason) -> Option<ClosureRecord> {
        let mut inner = self.inner.lock().await;
        self.close_locked(&mut inner, instrument, reason)
    }

    fn close_locked(
        &self,
        inner: &mut LedgerInner,
        instrument: &str,
        reason: CloseReason,
    ) -> Option<ClosureRecord> {
        let mut position = inner.positions.remove(instrument)?;
        position.status = PositionStatus::Closed;

        inner.balance += position.margin + position.unrealized_pnl;
        inner.total_realized_pnl += position.unrealized_pnl;

        let record = ClosureRecord {
            instrument: position.instrument.clone(),
            side: position.side,
            reason,
            entry_price: position.entry_price,
            exit_price: position.current_price,
            pnl: position.unrealized_pnl,
        };

        if record.pnl < dec!(0) {
            warn!(
                instrument = %record.instrument,
                reason = %record.reason,
                pnl = %record.pnl,
                balance = %inner.balance,
                "Position closed at a loss"
            );
        } else {
            info!(
                instrument = %record.instrument,
                reason = %record.reason,
                pnl = %record.pnl,
                balance = %inner.balance,
                "Position closed"
            );
        }

        let _ = self.events.send(LedgerEvent::Closed(record.clone()));
        Some(record)
    }

    /// Current account balance (excluding margin locked in open positions).
    pub async fn balance(&self) -> Decimal {
        self.inner.lock().await.balance
    }

    /// Sum of realized pnl over the ledger's lifetime.
    pub async fn total_realized_pnl(&self) -> Decimal {
        self.inner.lock().await.total_realized_pnl
    }

    /// Snapshot of all open positions.
    pub async fn open_positions(&self) -> Vec<Position> {
        self.inner.lock().await.positions.values().cloned().collect()
    }

    /// Whether the instrument currently has an open position.
    pub async fn has_open_position(&self, instrument: &str) -> bool {
        self.inner.lock().await.positions.contains_key(instrument)
    }
}

/// Side-dependent take-profit / stop-loss prices from percent offsets.
///
/// LONG: tp above entry, sl below. SHORT mirrored.
pub fn bracket_prices(
    side: Side,
    entry: Decimal,
    tp_pct: Decimal,
    sl_pct: Decimal,
) -> (Decimal, Decimal) {
    let hundred = dec!(100);
    match side {
        Side::Long => (
            entry * (Decimal::ONE + tp_pct / hundred),
            entry * (Decimal::ONE - sl_pct / hundred),
        ),
        Side::Short => (
            entry * (Decimal::ONE - tp_pct / hundred),
            entry * (Decimal::ONE + sl_pct / hundred),
        ),
    }
}
