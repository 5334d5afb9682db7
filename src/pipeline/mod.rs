//! Bounded ingestion pipeline: supervised sources feeding one consumer

mod consumer;
mod source;

pub use consumer::{spawn_housekeeping, PipelineConsumer};
pub use source::{spawn_supervised, EventSource, StdinSource, DEFAULT_RESTART_BACKOFF};
