//! End-to-end engine tests
//!
//! Drive the full pipeline through the public API: events enter the bounded
//! channel, the consumer routes them, the gate opens positions, and the
//! ledger closes them on later ticks.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use tickline::common::channels::create_event_channel_with_capacity;
use tickline::common::types::{EngineEvent, MarketTick, Side, Signal};
use tickline::execution::ExecutionBridge;
use tickline::gate::{DecisionGate, TradeSizing};
use tickline::ledger::{CloseReason, LedgerEvent, PositionLedger};
use tickline::market::{shared_windows, SharedWindows};
use tickline::pipeline::PipelineConsumer;
use tickline::scoring::{Action, Decision, ScoringClient};
use tickline::signal::SignalDeduplicator;

use common::{wait_for_close, wait_for_open, RecordingVenue, StubScorer};

fn long_decision(confidence: u8) -> Decision {
    Decision {
        action: Action::Long,
        confidence,
        take_profit_pct: dec!(2),
        stop_loss_pct: dec!(1),
        validity_minutes: 15,
        reason: "breakout".to_string(),
    }
}

struct Engine {
    sender: mpsc::Sender<EngineEvent>,
    ledger: Arc<PositionLedger>,
    windows: SharedWindows,
}

/// Stand up the full pipeline around a scoring stub, optionally with a
/// bridge to a recording venue.
async fn start_engine(
    scorer: Arc<dyn ScoringClient>,
    bridge: Option<Arc<ExecutionBridge>>,
) -> Engine {
    let (sender, receiver) = create_event_channel_with_capacity(64);
    let windows = shared_windows();
    let ledger = Arc::new(PositionLedger::new(dec!(1000)));

    let mut gate = DecisionGate::new(
        scorer,
        Arc::clone(&windows),
        Arc::clone(&ledger),
        vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        TradeSizing {
            margin: dec!(100),
            leverage: 10,
        },
    );
    if let Some(bridge) = bridge {
        gate = gate.with_bridge(bridge);
    }

    let consumer = PipelineConsumer::new(
        receiver,
        Arc::clone(&windows),
        Arc::clone(&ledger),
        Arc::new(gate),
        SignalDeduplicator::new(),
    );
    tokio::spawn(consumer.run());

    Engine {
        sender,
        ledger,
        windows,
    }
}

async fn send_tick(engine: &Engine, price: rust_decimal::Decimal) {
    engine
        .sender
        .send(EngineEvent::Tick(MarketTick::new("BTCUSDT", price, Utc::now())))
        .await
        .unwrap();
}

async fn send_signal(engine: &Engine, text: &str) {
    engine
        .sender
        .send(EngineEvent::Signal(Signal::new("feed", text, Utc::now())))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_long_take_profit_lifecycle() {
    let scorer = Arc::new(StubScorer::always(long_decision(90)));
    let engine = start_engine(scorer, None).await;
    let mut events = engine.ledger.subscribe();

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC breaks out above resistance").await;
    wait_for_open(&engine.ledger, "BTCUSDT").await;

    // Margin debited up front
    assert_eq!(engine.ledger.balance().await, dec!(900));
    let position = &engine.ledger.open_positions().await[0];
    assert_eq!(position.side, Side::Long);
    assert_eq!(position.quantity, dec!(10));
    assert_eq!(position.take_profit_price, dec!(102.00));

    // The take-profit tick closes the position and credits margin + pnl
    send_tick(&engine, dec!(102)).await;
    wait_for_close(&engine.ledger, "BTCUSDT").await;

    assert_eq!(engine.ledger.balance().await, dec!(1020.00));
    assert_eq!(engine.ledger.total_realized_pnl().await, dec!(20.00));
    assert_eq!(
        engine.windows.read().await.current_price("BTCUSDT"),
        dec!(102)
    );

    let LedgerEvent::Opened(opened) = events.recv().await.unwrap() else {
        panic!("expected Opened first");
    };
    assert_eq!(opened.instrument, "BTCUSDT");
    let LedgerEvent::Closed(closed) = events.recv().await.unwrap() else {
        panic!("expected Closed second");
    };
    assert_eq!(closed.reason, CloseReason::TakeProfit);
    assert_eq!(closed.pnl, dec!(20.00));
}

#[tokio::test]
async fn test_long_stop_loss_lifecycle() {
    let scorer = Arc::new(StubScorer::always(long_decision(90)));
    let engine = start_engine(scorer, None).await;

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC breaks out above resistance").await;
    wait_for_open(&engine.ledger, "BTCUSDT").await;

    send_tick(&engine, dec!(99)).await;
    wait_for_close(&engine.ledger, "BTCUSDT").await;

    // Margin back minus the 1% stop: 900 + (100 - 10) = 990
    assert_eq!(engine.ledger.balance().await, dec!(990.00));
    assert_eq!(engine.ledger.total_realized_pnl().await, dec!(-10.00));
}

#[tokio::test]
async fn test_near_duplicate_signal_scored_once() {
    let stub = StubScorer::always(long_decision(50)); // never acts
    let calls = stub.call_counter();
    let engine = start_engine(Arc::new(stub), None).await;

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC etf inflows hit a new record today").await;
    send_signal(&engine, "BTC etf inflows hit a new record today").await;
    send_signal(&engine, "Record BTC etf inflows hit today").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_open_refused_while_position_held() {
    let stub = StubScorer::always(long_decision(90));
    let calls = stub.call_counter();
    let engine = start_engine(Arc::new(stub), None).await;

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC etf inflows hit a new record today").await;
    wait_for_open(&engine.ledger, "BTCUSDT").await;

    // Different enough to pass dedup, but the slot is taken
    send_signal(&engine, "Massive liquidation cascade on BTC derivatives venues").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.ledger.open_positions().await.len(), 1);
    assert_eq!(engine.ledger.balance().await, dec!(900));
}

#[tokio::test]
async fn test_live_mirroring_places_full_bracket() {
    let venue = Arc::new(RecordingVenue::new());
    let venue_client: Arc<dyn tickline::execution::VenueClient> = venue.clone();
    let bridge = Arc::new(ExecutionBridge::connect(venue_client).await.unwrap());
    let scorer = Arc::new(StubScorer::always(long_decision(90)));
    let engine = start_engine(scorer, Some(bridge)).await;

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC breaks out above resistance").await;
    wait_for_open(&engine.ledger, "BTCUSDT").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = venue.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            "filters".to_string(),
            "leverage BTCUSDT 10".to_string(),
            "market BTCUSDT LONG 10.000".to_string(),
            "protective BTCUSDT SHORT StopLoss 99.0".to_string(),
            "protective BTCUSDT SHORT TakeProfit 102.0".to_string(),
        ]
    );
    // The simulated ledger is unaffected by mirroring details
    assert_eq!(engine.ledger.balance().await, dec!(900));
}

#[tokio::test]
async fn test_paused_engine_never_opens() {
    let stub = StubScorer::always(long_decision(95));
    let calls = stub.call_counter();
    let engine = start_engine(Arc::new(stub), None).await;
    engine.ledger.pause();

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC breaks out above resistance").await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(engine.ledger.open_positions().await.is_empty());
    assert_eq!(engine.ledger.balance().await, dec!(1000));
}

#[tokio::test]
async fn test_slot_reusable_immediately_after_close() {
    let scorer = Arc::new(StubScorer::always(long_decision(90)));
    let engine = start_engine(scorer, None).await;

    send_tick(&engine, dec!(100)).await;
    send_signal(&engine, "BTC etf inflows hit a new record today").await;
    wait_for_open(&engine.ledger, "BTCUSDT").await;

    send_tick(&engine, dec!(102)).await;
    wait_for_close(&engine.ledger, "BTCUSDT").await;

    send_signal(&engine, "Massive liquidation cascade on BTC derivatives venues").await;
    wait_for_open(&engine.ledger, "BTCUSDT").await;

    // Second entry at 102 with the 1020 balance from the first round-trip
    assert_eq!(engine.ledger.balance().await, dec!(920.00));
    let position = &engine.ledger.open_positions().await[0];
    assert_eq!(position.entry_price, dec!(102));
}

#[tokio::test]
async fn test_tick_ordering_survives_small_channel() {
    let (sender, receiver) = create_event_channel_with_capacity(2);
    let windows = shared_windows();
    let ledger = Arc::new(PositionLedger::new(dec!(1000)));
    let gate = Arc::new(DecisionGate::new(
        Arc::new(StubScorer::always(long_decision(0))),
        Arc::clone(&windows),
        Arc::clone(&ledger),
        vec!["BTCUSDT".to_string()],
        TradeSizing {
            margin: dec!(100),
            leverage: 10,
        },
    ));
    let consumer = PipelineConsumer::new(
        receiver,
        Arc::clone(&windows),
        Arc::clone(&ledger),
        gate,
        SignalDeduplicator::new(),
    );
    let handle = tokio::spawn(consumer.run());

    // Far more events than the channel holds; send() applies backpressure
    for i in 1..=200u32 {
        sender
            .send(EngineEvent::Tick(MarketTick::new(
                "BTCUSDT",
                rust_decimal::Decimal::from(i),
                Utc::now(),
            )))
            .await
            .unwrap();
    }
    drop(sender);
    let _ = handle.await.unwrap();

    assert_eq!(
        windows.read().await.current_price("BTCUSDT"),
        rust_decimal::Decimal::from(200u32)
    );
    assert_eq!(windows.read().await.sample_count("BTCUSDT"), 200);
}
