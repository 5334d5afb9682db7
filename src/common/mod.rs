//! Common types, errors and channel helpers shared across the engine

pub mod channels;
pub mod errors;
pub mod types;
