//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Decision/position engine settings
    #[serde(default)]
    pub engine: EngineSettings,
    /// Scoring model endpoint configuration
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Real-venue configuration (optional; paper-only when absent)
    #[serde(default)]
    pub venue: Option<VenueConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            scoring: ScoringConfig::default(),
            venue: None,
        }
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Simulated starting balance
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
    /// Margin committed per trade, pre-leverage
    #[serde(default = "default_margin_per_trade")]
    pub margin_per_trade: Decimal,
    /// Leverage applied to every position
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Minimum model confidence (exclusive) for a decision to act
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: u8,
    /// Cosine-similarity threshold above which a signal is a duplicate
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    /// Ingestion channel capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Delay before restarting a failed event source, in seconds
    #[serde(default = "default_producer_backoff")]
    pub producer_backoff_seconds: u64,
    /// Interval for the expiry housekeeping sweep, in seconds
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_seconds: u64,
    /// Instruments the engine is allowed to trade
    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,
    /// Mirror accepted decisions to the real venue
    #[serde(default)]
    pub live_trading: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            margin_per_trade: default_margin_per_trade(),
            leverage: default_leverage(),
            confidence_threshold: default_confidence_threshold(),
            dedup_threshold: default_dedup_threshold(),
            queue_capacity: default_queue_capacity(),
            producer_backoff_seconds: default_producer_backoff(),
            housekeeping_interval_seconds: default_housekeeping_interval(),
            instruments: default_instruments(),
            live_trading: false,
        }
    }
}

fn default_starting_balance() -> Decimal {
    dec!(1000)
}

fn default_margin_per_trade() -> Decimal {
    dec!(100)
}

fn default_leverage() -> u32 {
    10
}

fn default_confidence_threshold() -> u8 {
    75
}

fn default_dedup_threshold() -> f64 {
    0.75
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_producer_backoff() -> u64 {
    5
}

fn default_housekeeping_interval() -> u64 {
    30
}

fn default_instruments() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

/// Scoring model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint
    #[serde(default = "default_scoring_base_url")]
    pub base_url: String,
    /// Bearer token for the endpoint
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier to request
    #[serde(default = "default_scoring_model")]
    pub model: String,
    /// Minimum spacing between scoring requests, in seconds
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval_seconds: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_url: default_scoring_base_url(),
            api_key: None,
            model: default_scoring_model(),
            min_request_interval_seconds: default_min_request_interval(),
        }
    }
}

fn default_scoring_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_scoring_model() -> String {
    "qwen3:8b".to_string()
}

fn default_min_request_interval() -> u64 {
    3
}

/// Real-venue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Base URL of the venue's REST API
    pub base_url: String,
    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
}
