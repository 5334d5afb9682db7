//! Configuration loading and types

pub mod loader;
pub mod types;

pub use loader::{load_config, load_from_env};
pub use types::{AppConfig, EngineSettings, ScoringConfig, VenueConfig};
