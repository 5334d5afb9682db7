//! Precision sizing and real-order mirroring

mod bridge;
mod precision;
mod venue;

pub use bridge::{EntryOrder, ExecutionBridge, MirroredEntry};
pub use precision::{floor_to_step, round_to_tick};
pub use venue::{FillReport, InstrumentFilters, ProtectiveKind, RestVenueClient, VenueClient};

#[cfg(test)]
pub use venue::MockVenueClient;
