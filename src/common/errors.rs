//! Error types for the engine

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// A structured refusal: the requested operation was understood but not
/// performed, and no state was mutated.
///
/// Refusals are ordinary control flow, not failures. Callers log them and
/// move on.
#[derive(Debug, Clone, PartialEq)]
pub enum Refusal {
    /// An open position already exists for this instrument.
    AlreadyOpen { instrument: String },
    /// The account balance cannot cover the requested margin.
    InsufficientBalance {
        balance: rust_decimal::Decimal,
        margin: rust_decimal::Decimal,
    },
    /// Trading is administratively paused.
    TradingPaused,
    /// The sized quantity is below the venue's minimum tradeable quantity.
    BelowMinimumQuantity {
        quantity: rust_decimal::Decimal,
        minimum: rust_decimal::Decimal,
    },
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::AlreadyOpen { instrument } => {
                write!(f, "position already open for {instrument}")
            }
            Refusal::InsufficientBalance { balance, margin } => {
                write!(f, "insufficient balance: {balance} available, {margin} required")
            }
            Refusal::TradingPaused => write!(f, "trading is paused"),
            Refusal::BelowMinimumQuantity { quantity, minimum } => {
                write!(f, "quantity {quantity} below venue minimum {minimum}")
            }
        }
    }
}

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// The operation was refused without mutating any state
    #[error("Operation refused: {0}")]
    OrderRefused(Refusal),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Scoring collaborator returned an error or malformed data
    #[error("Scoring collaborator error: {0}")]
    Scoring(String),

    /// Venue API call failed
    #[error("Venue error: {0}")]
    Venue(String),

    /// Entry order filled but protective orders could not be placed.
    /// A real, unprotected position exists at the venue.
    #[error("CRITICAL: entry filled for {instrument} but protective orders failed: {detail}")]
    UnprotectedPosition { instrument: String, detail: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Channel receive errors
    #[error("Channel receive error: {0}")]
    ChannelReceive(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Returns the refusal if this error is a structured refusal.
    pub fn as_refusal(&self) -> Option<&Refusal> {
        match self {
            EngineError::OrderRefused(r) => Some(r),
            _ => None,
        }
    }
}
