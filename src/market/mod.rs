//! Market data state: rolling per-instrument price windows

mod window;

pub use window::{PercentChanges, RollingWindows, RETENTION_SECONDS};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to the rolling windows.
///
/// The pipeline consumer is the single writer; decision-gate tasks take
/// concurrent read snapshots.
pub type SharedWindows = Arc<RwLock<RollingWindows>>;

/// Construct an empty shared window buffer.
pub fn shared_windows() -> SharedWindows {
    Arc::new(RwLock::new(RollingWindows::new()))
}
