//! Common test utilities and fixtures

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tickline::common::errors::Result;
use tickline::common::types::Side;
use tickline::execution::{FillReport, InstrumentFilters, ProtectiveKind, VenueClient};
use tickline::ledger::PositionLedger;
use tickline::scoring::{Decision, ScoreRequest, ScoringClient};

/// A scoring collaborator that always answers with a fixed decision and
/// counts how often it was consulted.
pub struct StubScorer {
    decision: Decision,
    score_calls: Arc<AtomicUsize>,
}

impl StubScorer {
    pub fn always(decision: Decision) -> Self {
        Self {
            decision,
            score_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `score` invocations.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.score_calls)
    }
}

#[async_trait]
impl ScoringClient for StubScorer {
    async fn score(&self, _request: &ScoreRequest) -> Result<Decision> {
        self.score_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.decision.clone())
    }

    async fn resolve_symbol(&self, _text: &str, _allowed: &[String]) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A venue that accepts everything and records the order of calls.
pub struct RecordingVenue {
    pub calls: Arc<Mutex<Vec<String>>>,
    filters: HashMap<String, InstrumentFilters>,
}

impl RecordingVenue {
    pub fn new() -> Self {
        let mut filters = HashMap::new();
        filters.insert(
            "BTCUSDT".to_string(),
            InstrumentFilters {
                quantity_step: dec!(0.001),
                price_tick: dec!(0.1),
                minimum_quantity: dec!(0.001),
            },
        );
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            filters,
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VenueClient for RecordingVenue {
    async fn exchange_filters(&self) -> Result<HashMap<String, InstrumentFilters>> {
        self.record("filters".to_string());
        Ok(self.filters.clone())
    }

    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<()> {
        self.record(format!("leverage {instrument} {leverage}"));
        Ok(())
    }

    async fn submit_market_order(
        &self,
        instrument: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<FillReport> {
        self.record(format!("market {instrument} {side} {quantity}"));
        Ok(FillReport {
            average_price: Decimal::ZERO,
        })
    }

    async fn submit_protective_order(
        &self,
        instrument: &str,
        side: Side,
        kind: ProtectiveKind,
        trigger_price: Decimal,
    ) -> Result<()> {
        self.record(format!("protective {instrument} {side} {kind:?} {trigger_price}"));
        Ok(())
    }
}

/// Poll until `ledger` reports an open position for `instrument`, or panic
/// after one second. Decision handling runs on a detached task, so tests
/// must wait for it to land.
pub async fn wait_for_open(ledger: &PositionLedger, instrument: &str) {
    for _ in 0..100 {
        if ledger.has_open_position(instrument).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("position for {instrument} never opened");
}

/// Poll until no position is open for `instrument`.
pub async fn wait_for_close(ledger: &PositionLedger, instrument: &str) {
    for _ in 0..100 {
        if !ledger.has_open_position(instrument).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("position for {instrument} never closed");
}
