//! Per-frame phenomena detection orchestrator.
//!
//! Drives one frame through border consumption, baseline statistics and the
//! parallel per-column analyzers, then accumulates results keyed by frame
//! id. The cross-frame clustering passes run on demand once all frames have
//! been processed.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::debug;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::borders::{BorderDetection, BorderLocator, FrameHeader};
use crate::callback::{PhenomenaCallback, PhenomenaEvent};
use crate::convolve::gaussian_blur;
use crate::error::DetectionError;
use crate::flares::{self, Flare, Flares, WingColumnStats};
use crate::redshift::{cluster_areas, rank_areas, Redshift, RedshiftArea};
use crate::regions::{build_active_regions, ActiveRegions, ColumnMask};
use crate::stats::{column_sample_stddev, ColumnStatistics};
use crate::units::{Dispersion, Wavelen};

/// Speed of light, km/s.
const SPEED_OF_LIGHT: f64 = 299_792.458;

/// A column dimmer than this fraction of the mean column average is off-disk
/// or a border artifact.
const DIM_COLUMN_THRESHOLD: f64 = 0.9;

/// A line-center value above this multiple of the mean is a saturating
/// flare, not a contained redshift feature.
const SATURATED_CENTER_THRESHOLD: f64 = 1.5;

/// A sample jumping past this multiple of its predecessor marks the true
/// wing boundary.
const WING_EDGE_JUMP: f64 = 1.2;

/// Active-region gate on the column average vs. the fitted baseline.
const AR_AVG_THRESHOLD: f64 = 0.95;

/// Active-region gate on the column spread vs. the fitted baseline.
const AR_STDDEV_THRESHOLD: f64 = 0.85;

/// Fraction of the disk span shaved off each border to avoid edge artifacts.
const BORDER_MARGIN_DIVISOR: usize = 40;

/// Narrowed disk ranges below this width carry too few samples for flare
/// normalization.
const MIN_RANGE_FOR_FLARES: usize = 64;

/// Detects redshift events, active regions and flares across the frames of
/// one capture.
///
/// One instance accumulates results for one video; frames may be processed
/// concurrently as long as no two calls share a frame id. Query methods are
/// meaningful once all frames have been processed.
pub struct PhenomenaDetector {
    dispersion: Dispersion,
    lambda0: Wavelen,
    reconstructed_width: usize,
    border_locator: Arc<dyn BorderLocator>,
    listener: Option<PhenomenaCallback>,
    detect_active_regions: bool,
    detect_redshifts: bool,
    detect_flares: bool,
    detect_borders: bool,
    state: Mutex<DetectorState>,
}

#[derive(Default)]
struct DetectorState {
    redshifts_per_frame: BTreeMap<usize, Vec<Redshift>>,
    active_regions_per_frame: BTreeMap<usize, ColumnMask>,
    flare_candidates: Vec<Flare>,
    reduced_flares: Option<Vec<Flare>>,
    border_detection: Option<BorderDetection>,
}

/// Per-column results carried back from the parallel fan-out.
#[derive(Default)]
struct ColumnOutcome {
    active_region: Option<usize>,
    flare: Option<Flare>,
}

/// Precomputed per-frame inputs for flare scoring.
struct FlareContext {
    column_stats: Vec<Option<WingColumnStats>>,
    global_line_avg: f64,
    global_wing_avg: f64,
}

impl PhenomenaDetector {
    /// Create a detector for one capture.
    ///
    /// `reconstructed_width` is the width of the final reconstructed image,
    /// needed to remap detector-local columns into its coordinate system.
    pub fn new(
        dispersion: Dispersion,
        lambda0: Wavelen,
        reconstructed_width: usize,
        border_locator: Arc<dyn BorderLocator>,
    ) -> Self {
        Self {
            dispersion,
            lambda0,
            reconstructed_width,
            border_locator,
            listener: None,
            detect_active_regions: true,
            detect_redshifts: true,
            detect_flares: true,
            detect_borders: true,
            state: Mutex::new(DetectorState::default()),
        }
    }

    /// Register a listener notified synchronously as detections are made.
    pub fn set_listener(&mut self, listener: PhenomenaCallback) {
        self.listener = Some(listener);
    }

    /// Enable or disable active-region detection.
    pub fn set_detect_active_regions(&mut self, enabled: bool) {
        self.detect_active_regions = enabled;
    }

    /// Enable or disable redshift detection.
    pub fn set_detect_redshifts(&mut self, enabled: bool) {
        self.detect_redshifts = enabled;
    }

    /// Enable or disable flare / Ellerman bomb detection.
    pub fn set_detect_flares(&mut self, enabled: bool) {
        self.detect_flares = enabled;
    }

    /// Enable or disable per-frame border recording.
    pub fn set_detect_borders(&mut self, enabled: bool) {
        self.detect_borders = enabled;
    }

    /// True when redshift detection is enabled.
    pub fn is_redshift_detection_enabled(&self) -> bool {
        self.detect_redshifts
    }

    /// True when active-region detection is enabled.
    pub fn is_active_region_detection_enabled(&self) -> bool {
        self.detect_active_regions
    }

    /// True when flare detection is enabled.
    pub fn is_flare_detection_enabled(&self) -> bool {
        self.detect_flares
    }

    /// Doppler velocity (km/s) equivalent of a pixel shift.
    pub fn speed_of(&self, shift: i32) -> f64 {
        doppler_speed(shift as f64, self.dispersion, self.lambda0)
    }

    /// Analyze one frame and accumulate its detections.
    ///
    /// `frame` is indexed `[[y, x]]` with `y` the spatial axis along the
    /// slit; `polynomial` maps a column to the sub-pixel row of the spectral
    /// line center. Frames where the solar-disk borders cannot be found
    /// contribute no detections.
    ///
    /// # Errors
    /// Returns an error when the buffer shape disagrees with the declared
    /// geometry or the frame id falls outside the capture; both indicate a
    /// caller bug, not a property of the data.
    pub fn process_frame<F>(
        &self,
        frame_id: usize,
        width: usize,
        height: usize,
        frame: &ArrayView2<f32>,
        polynomial: &F,
        header: &FrameHeader,
    ) -> Result<(), DetectionError>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        if !self.detect_redshifts
            && !self.detect_active_regions
            && !self.detect_flares
            && !self.detect_borders
        {
            return Ok(());
        }
        if frame.ncols() != width || frame.nrows() != height {
            return Err(DetectionError::FrameGeometry {
                frame_id,
                width,
                height,
                actual_width: frame.ncols(),
                actual_height: frame.nrows(),
            });
        }
        if frame_id >= header.frame_count {
            return Err(DetectionError::FrameIdOutOfRange {
                frame_id,
                frame_count: header.frame_count,
            });
        }

        let borders = self.border_locator.locate(frame, header);

        if self.detect_borders {
            let mut state = self.state.lock().unwrap();
            let record = state
                .border_detection
                .get_or_insert_with(|| BorderDetection::new(header.frame_count));
            if let Some((left, right)) = borders {
                record.record(frame_id, left, right);
            }
        }
        if !self.detect_redshifts && !self.detect_active_regions && !self.detect_flares {
            return Ok(());
        }

        let Some((disk_left, disk_right)) = borders else {
            debug!("frame {frame_id}: no solar disk borders, skipping");
            return Ok(());
        };

        // Shave the edges of the disk: border columns carry limb artifacts
        let span = disk_right.saturating_sub(disk_left);
        let left = disk_left + span / BORDER_MARGIN_DIVISOR;
        let right = disk_right.saturating_sub(span / BORDER_MARGIN_DIVISOR);
        if left >= right {
            debug!("frame {frame_id}: degenerate disk range, skipping");
            return Ok(());
        }

        let Some(stats) = ColumnStatistics::compute(frame, left, right.min(width), polynomial)
        else {
            debug!("frame {frame_id}: column statistics unavailable, skipping");
            return Ok(());
        };
        let (left, right) = stats.range();

        // Half-angstrom window converted to pixels
        let wing_shift = (0.5 / self.dispersion.angstroms_per_pixel()).floor() as i64;

        let flare_context = if self.detect_flares {
            self.prepare_flare_context(frame, left, right, polynomial)
        } else {
            None
        };
        let flare_budget = if flare_context.is_some() {
            let pending = self.state.lock().unwrap().flare_candidates.len();
            flares::MAX_PENDING_CANDIDATES.saturating_sub(pending)
        } else {
            0
        };

        let collector = Mutex::new(Vec::new());
        let outcomes: Vec<ColumnOutcome> = (left..right)
            .into_par_iter()
            .map(|x| {
                let mut outcome = ColumnOutcome::default();
                if self.detect_active_regions && is_active_region_column(&stats, x) {
                    if let Some(listener) = &self.listener {
                        listener(&PhenomenaEvent::ActiveRegion { column: x });
                    }
                    outcome.active_region = Some(x);
                }
                if self.detect_redshifts {
                    self.scan_column_for_redshift(
                        frame_id, x, height, frame, polynomial, wing_shift, &stats, &collector,
                    );
                }
                if let Some(context) = &flare_context {
                    if flare_budget > 0 && x > left + 2 * flares::LOCAL_RANGE
                        && x + 2 * flares::LOCAL_RANGE < right
                    {
                        outcome.flare = flares::score_column(
                            frame_id,
                            x,
                            width,
                            left,
                            right,
                            polynomial(x as f64),
                            &context.column_stats,
                            context.global_line_avg,
                            context.global_wing_avg,
                            self.dispersion,
                        );
                    }
                }
                outcome
            })
            .collect();

        let redshifts = collector.into_inner().unwrap();

        let mut mask = ColumnMask::new(width);
        let mut frame_flares = Vec::new();
        for outcome in outcomes {
            if let Some(column) = outcome.active_region {
                mask.set(column);
            }
            if let Some(flare) = outcome.flare {
                frame_flares.push(flare);
            }
        }
        frame_flares.truncate(flare_budget);

        debug!(
            "frame {frame_id}: {} redshifts, {} active-region columns, {} flare candidates",
            redshifts.len(),
            mask.cardinality(),
            frame_flares.len()
        );

        // Frame-level commit: either everything for this frame lands, or
        // (on earlier return) nothing does
        let mut state = self.state.lock().unwrap();
        if !redshifts.is_empty() {
            state.redshifts_per_frame.insert(frame_id, redshifts);
        }
        if !mask.is_empty() {
            state.active_regions_per_frame.insert(frame_id, mask);
        }
        state.flare_candidates.extend(frame_flares);
        Ok(())
    }

    fn prepare_flare_context<F>(
        &self,
        frame: &ArrayView2<f32>,
        left: usize,
        right: usize,
        polynomial: &F,
    ) -> Option<FlareContext>
    where
        F: Fn(f64) -> f64,
    {
        // Too few columns to normalize against
        if right - left < MIN_RANGE_FOR_FLARES {
            return None;
        }
        let blurred = gaussian_blur(frame);
        let width = frame.ncols();
        let mut column_stats: Vec<Option<WingColumnStats>> = vec![None; width];
        let mut line_sum = 0.0;
        let mut wing_sum = 0.0;
        let mut count = 0usize;
        for x in left..right {
            let stats =
                flares::column_wing_stats(&blurred.view(), x, polynomial(x as f64), self.dispersion);
            line_sum += stats.line.average;
            wing_sum += stats.wing.average;
            count += 1;
            column_stats[x] = Some(stats);
        }
        if count == 0 || wing_sum <= 0.0 {
            return None;
        }
        Some(FlareContext {
            column_stats,
            global_line_avg: line_sum / count as f64,
            global_wing_avg: wing_sum / count as f64,
        })
    }

    /// Measure the wing excursion of one column and emit a redshift when it
    /// clears the minimum-shift gate.
    #[allow(clippy::too_many_arguments)]
    fn scan_column_for_redshift<F>(
        &self,
        frame_id: usize,
        x: usize,
        height: usize,
        frame: &ArrayView2<f32>,
        polynomial: &F,
        wing_shift: i64,
        stats: &ColumnStatistics,
        collector: &Mutex<Vec<Redshift>>,
    ) where
        F: Fn(f64) -> f64,
    {
        let yi = polynomial(x as f64).round() as i64;
        if yi - wing_shift < 0 || yi + wing_shift >= height as i64 {
            return;
        }
        if stats.column_average(x) < DIM_COLUMN_THRESHOLD * stats.avg_of_column_averages() {
            return;
        }
        let center_value = frame[[yi as usize, x]] as f64;
        if center_value > SATURATED_CENTER_THRESHOLD * stats.avg_center_line_value() {
            // Most likely a flare saturating the line center
            return;
        }

        let threshold =
            stats.avg_center_line_value() + 2.0 * column_sample_stddev(frame, x);

        let Some(up) = wing_excursion(frame, x, yi, wing_shift, 1, threshold) else {
            return;
        };
        let Some(down) = wing_excursion(frame, x, yi, wing_shift, -1, threshold) else {
            return;
        };

        // Ties go to the red wing
        let (max_shift, rel_shift) = if down > up { (down, -down) } else { (up, up) };

        if max_shift >= 2 * wing_shift {
            let redshift = Redshift {
                pixel_shift: max_shift as i32,
                rel_pixel_shift: rel_shift as i32,
                km_per_sec: doppler_speed(max_shift as f64, self.dispersion, self.lambda0),
                frame_id,
                // The final image is rotated 90 degrees and flipped
                // vertically relative to detector-local coordinates
                column: self.reconstructed_width - x - 1,
            };
            let mut collector = collector.lock().unwrap();
            if let Some(listener) = &self.listener {
                listener(&PhenomenaEvent::Redshift {
                    column: x,
                    relative_shift: redshift.rel_pixel_shift,
                });
            }
            collector.push(redshift);
        }
    }

    /// All raw redshifts, keyed by frame id.
    pub fn redshifts(&self) -> BTreeMap<usize, Vec<Redshift>> {
        self.state.lock().unwrap().redshifts_per_frame.clone()
    }

    /// True when any frame produced a redshift.
    pub fn has_redshifts(&self) -> bool {
        !self.state.lock().unwrap().redshifts_per_frame.is_empty()
    }

    /// True when any frame flagged active-region columns.
    pub fn has_active_regions(&self) -> bool {
        !self.state.lock().unwrap().active_regions_per_frame.is_empty()
    }

    /// The strongest redshift areas after clustering, ranked by shift
    /// magnitude and labeled `A..Z, A2..`.
    pub fn max_redshift_areas(&self, limit: usize) -> Vec<RedshiftArea> {
        let all: Vec<Redshift> = {
            let state = self.state.lock().unwrap();
            state
                .redshifts_per_frame
                .values()
                .flatten()
                .copied()
                .collect()
        };
        rank_areas(cluster_areas(&all), limit)
    }

    /// Clustered active regions across all processed frames.
    pub fn active_regions(&self) -> ActiveRegions {
        let state = self.state.lock().unwrap();
        build_active_regions(&state.active_regions_per_frame)
    }

    /// Flare detections across all processed frames, strongest first.
    ///
    /// The reduction is computed once and memoized.
    pub fn flares(&self) -> Flares {
        let mut state = self.state.lock().unwrap();
        if state.reduced_flares.is_none() {
            let reduced = flares::reduce_candidates(state.flare_candidates.clone());
            state.reduced_flares = Some(reduced);
        }
        Flares::new(state.reduced_flares.clone().unwrap_or_default())
    }

    /// Raw per-frame border columns, when border recording ran.
    pub fn border_detection(&self) -> Option<BorderDetection> {
        self.state.lock().unwrap().border_detection.clone()
    }
}

/// Doppler velocity (km/s) of a pixel shift under the given calibration.
pub fn doppler_speed(shift: f64, dispersion: Dispersion, lambda0: Wavelen) -> f64 {
    SPEED_OF_LIGHT * shift * dispersion.angstroms_per_pixel() / lambda0.angstroms()
}

/// Active-region gate: a column must be simultaneously dimmer and less
/// variable than its fitted baselines.
fn is_active_region_column(stats: &ColumnStatistics, x: usize) -> bool {
    stats.column_average(x) < AR_AVG_THRESHOLD * stats.expected_average(x)
        && stats.column_stddev(x) < AR_STDDEV_THRESHOLD * stats.expected_stddev(x)
}

/// Walk away from the line core until the intensity returns to the
/// continuum threshold or jumps across a wing edge.
///
/// `direction` is `+1` toward the red wing (increasing rows), `-1` toward
/// the blue wing. Returns the furthest shift reached, or `None` when the
/// scan ran off the frame edge: a truncated excursion is not a trustworthy
/// measurement.
fn wing_excursion(
    frame: &ArrayView2<f32>,
    x: usize,
    yi: i64,
    wing_shift: i64,
    direction: i64,
    threshold: f64,
) -> Option<i64> {
    let height = frame.nrows() as i64;
    let start = yi + direction * (wing_shift + 1);
    if start < 0 || start >= height {
        // Nothing to scan; the window ends at the frame edge
        return Some(0);
    }

    let mut max_shift = 0;
    let mut prev = -1.0;
    let mut y = start;
    while y >= 0 && y < height {
        let v = frame[[y as usize, x]] as f64;
        if v >= threshold || (prev > 0.0 && v > WING_EDGE_JUMP * prev) {
            return Some(max_shift);
        }
        let shift = (y - yi) * direction;
        if shift > max_shift {
            max_shift = shift;
        }
        prev = v;
        y += direction;
    }
    None
}
