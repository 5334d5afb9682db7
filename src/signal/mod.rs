//! Signal-side processing: near-duplicate suppression

mod dedup;

pub use dedup::{
    SignalDeduplicator, DEFAULT_SIMILARITY_THRESHOLD, HISTORY_HORIZON_HOURS, MAX_HISTORY_ENTRIES,
};
