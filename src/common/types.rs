//! Unified event and domain types shared across the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// The order side that closes a position of this side.
    pub fn closing(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// A single market price update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    /// Tradeable symbol identifier, e.g. `"BTCUSDT"`
    pub instrument: String,
    /// Last traded price
    pub price: Decimal,
    /// When the source recorded this tick
    pub timestamp: DateTime<Utc>,
}

impl MarketTick {
    pub fn new(instrument: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            timestamp,
        }
    }
}

/// An external textual event that may imply a trading opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Where the signal came from (channel name, feed id, "manual", ...)
    pub source: String,
    /// Raw signal text
    pub text: String,
    /// When the source produced the signal
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn new(source: impl Into<String>, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            timestamp,
        }
    }
}

/// Unified ingress event from any producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A market price update
    Tick(MarketTick),
    /// An external textual signal
    Signal(Signal),
}

impl EngineEvent {
    /// Name of the event kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Tick(_) => "tick",
            EngineEvent::Signal(_) => "signal",
        }
    }
}
