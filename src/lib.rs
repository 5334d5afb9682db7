//! Tickline Library
//!
//! An event-driven trading engine: market ticks and text signals flow
//! through one bounded pipeline into a simulated position ledger, with
//! model-scored decisions gating entries and an optional bridge mirroring
//! them to a real venue.

pub mod common;
pub mod config;
pub mod execution;
pub mod gate;
pub mod ledger;
pub mod market;
pub mod pipeline;
pub mod scoring;
pub mod signal;

// Re-export commonly used types
pub use common::errors::{EngineError, Refusal, Result};
pub use common::types::{EngineEvent, MarketTick, Side, Signal};
pub use config::types::AppConfig;
pub use execution::{EntryOrder, ExecutionBridge, RestVenueClient, VenueClient};
pub use gate::{DecisionGate, TradeSizing};
pub use ledger::{LedgerEvent, OpenRequest, PositionLedger};
pub use market::{RollingWindows, SharedWindows};
pub use pipeline::{EventSource, PipelineConsumer};
pub use scoring::{Action, Decision, LlmScoringClient, ScoreRequest, ScoringClient};
pub use signal::SignalDeduplicator;
