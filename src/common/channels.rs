//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use super::types::EngineEvent;

/// Default ingestion queue capacity.
///
/// Producers suspend on `send` when the queue is full; this bound is the
/// engine's only memory cap on ingress.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Create a new ingestion channel with the default capacity
pub fn create_event_channel() -> (mpsc::Sender<EngineEvent>, mpsc::Receiver<EngineEvent>) {
    mpsc::channel(DEFAULT_QUEUE_CAPACITY)
}

/// Create a new ingestion channel with a custom capacity
pub fn create_event_channel_with_capacity(
    capacity: usize,
) -> (mpsc::Sender<EngineEvent>, mpsc::Receiver<EngineEvent>) {
    mpsc::channel(capacity)
}
