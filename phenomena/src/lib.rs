//! Phenomena detection for solar spectroheliograph captures.
//!
//! Each video frame of a scan is a 2D spectral cut: columns are positions
//! along the spectrograph slit, rows sample the spectrum around one
//! absorption line. This crate analyzes those frames to find three kinds of
//! phenomena along the line:
//!
//! - **Redshifts**: localized Doppler excursions of the line wings,
//!   signatures of high-velocity plasma events;
//! - **Active regions**: sunspot-like areas that are simultaneously dimmer
//!   and less variable than the fitted disk baseline;
//! - **Flares / Ellerman bombs**: columns whose line wings brighten far
//!   above their neighborhood.
//!
//! # Pipeline
//!
//! Per frame, [`PhenomenaDetector::process_frame`] consumes the solar-disk
//! borders from a [`BorderLocator`], fits per-column baselines
//! ([`ColumnStatistics`]) and fans the per-column analyzers out in parallel.
//! Once all frames are processed, the query surface clusters the raw
//! detections: [`PhenomenaDetector::active_regions`] flood-fills and merges
//! the flagged columns into [`ActiveRegions`], and
//! [`PhenomenaDetector::max_redshift_areas`] clusters, ranks and labels the
//! strongest redshift events.
//!
//! Detection is best-effort over noisy data: frames without usable borders
//! or statistics simply contribute nothing.

pub mod borders;
pub mod callback;
pub mod convolve;
pub mod detector;
pub mod error;
pub mod flares;
pub mod redshift;
pub mod regions;
pub mod stats;
pub mod units;

// Re-export key functionality for easier access
pub use borders::{BorderDetection, BorderLocator, FixedBorders, FrameHeader};
pub use callback::{PhenomenaCallback, PhenomenaEvent};
pub use detector::{doppler_speed, PhenomenaDetector};
pub use error::DetectionError;
pub use flares::{Flare, FlareKind, Flares};
pub use redshift::{Redshift, RedshiftArea};
pub use regions::{ActiveRegion, ActiveRegions, ColumnMask};
pub use stats::ColumnStatistics;
pub use units::{Dispersion, Wavelen};
