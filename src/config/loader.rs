//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{EngineError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with TICKLINE_)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("TICKLINE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Pull in a .env file when present
    dotenvy::dotenv().ok();

    let mut config = AppConfig::default();

    if let Ok(url) = std::env::var("SCORING_BASE_URL") {
        config.scoring.base_url = url;
    }
    config.scoring.api_key = std::env::var("SCORING_API_KEY").ok();
    if let Ok(model) = std::env::var("SCORING_MODEL") {
        config.scoring.model = model;
    }

    if let Ok(base_url) = std::env::var("VENUE_BASE_URL") {
        config.venue = Some(super::types::VenueConfig {
            base_url,
            api_key: std::env::var("VENUE_API_KEY").ok(),
        });
    }

    if let Ok(instruments) = std::env::var("ENGINE_INSTRUMENTS") {
        config.engine.instruments = instruments
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.engine.starting_balance, dec!(1000));
        assert_eq!(config.engine.confidence_threshold, 75);
        assert_eq!(config.engine.queue_capacity, 10_000);
        assert!(!config.engine.live_trading);
        assert!(config.venue.is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/tickline.toml")).unwrap();
        assert_eq!(config.engine.margin_per_trade, dec!(100));
    }
}
