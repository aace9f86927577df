//! Event callbacks for detection consumers.

use std::sync::Arc;

/// Events emitted while columns of a frame are being analyzed.
///
/// Callbacks fire synchronously from worker threads, so implementations must
/// be thread-safe. `Redshift` events are delivered inside the critical
/// section that appends to the per-frame collector: a callback always
/// observes collector state consistent with the event it is handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhenomenaEvent {
    /// A redshift excursion was measured in a column.
    Redshift {
        /// Detector-local column index.
        column: usize,
        /// Signed pixel shift (+toward the red wing, -toward the blue wing).
        relative_shift: i32,
    },
    /// A column was flagged as belonging to an active region.
    ActiveRegion {
        /// Detector-local column index.
        column: usize,
    },
}

/// Callback invoked for each detection event.
pub type PhenomenaCallback = Arc<dyn Fn(&PhenomenaEvent) + Send + Sync>;
