//! Ellerman bomb and flare detection over smoothed column statistics.
//!
//! Works on a Gaussian-blurred copy of the frame: each column's spectral
//! profile splits into a line core (within ~0.35 Å of the center) and wings
//! (out to ~5 Å). A column whose brightest wing sample stands well above its
//! neighborhood scores as a candidate; the line-core brightening separates
//! contained Ellerman bombs from full flares.

use helio_math::Point2d;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::units::Dispersion;

/// Half-width of the line core, in angstroms.
const WING_LIMIT_ANGSTROMS: f64 = 0.35;

/// Maximum distance from the line center considered at all, in angstroms.
const MAX_RANGE_ANGSTROMS: f64 = 5.0;

/// Columns on each side contributing to the local neighborhood average.
pub(crate) const LOCAL_RANGE: usize = 8;

/// Minimum narrowed disk width for scoring to be meaningful.
pub(crate) const MIN_WIDTH_FOR_DETECTION: usize = 12 * LOCAL_RANGE;

/// Candidate collection stops growing past this bound.
pub(crate) const MAX_PENDING_CANDIDATES: usize = 20;

/// More surviving detections than this is judged a misdetection.
const MAX_FLARE_COUNT: usize = 5;

/// Minimum score for a column to become a candidate.
const SCORE_THRESHOLD: f64 = 12.0;

/// Classification of a bright-wing detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlareKind {
    /// Localized wing brightening with a quiet line core.
    EllermanBomb,
    /// Wing brightening accompanied by strong line-core brightening.
    Flare,
}

/// A scored flare or Ellerman bomb detection site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flare {
    /// Classification of the detection.
    pub kind: FlareKind,
    /// Frame the detection was made in.
    pub frame_id: usize,
    /// Detector-local column of the detection.
    pub column: usize,
    /// Detection score; higher is stronger.
    pub score: f64,
}

impl Flare {
    fn position(&self) -> Point2d {
        Point2d::new(self.column as f64, self.frame_id as f64)
    }
}

/// Scored flare detections, strongest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Flares {
    flares: Vec<Flare>,
}

impl Flares {
    pub(crate) fn new(flares: Vec<Flare>) -> Self {
        Self { flares }
    }

    /// The detections, strongest first.
    pub fn flares(&self) -> &[Flare] {
        &self.flares
    }

    /// True when nothing was detected.
    pub fn is_empty(&self) -> bool {
        self.flares.is_empty()
    }
}

/// Mean and sample standard deviation of a pixel population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PixelStats {
    pub average: f64,
    pub stddev: f64,
}

/// Line-core and wing statistics of one blurred column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WingColumnStats {
    pub line: PixelStats,
    pub wing: PixelStats,
    /// Row of the brightest monotonically-reached wing sample.
    pub wing_max_y: i64,
    pub wing_max_value: f64,
    pub wing_min_value: f64,
}

/// Compute line/wing statistics for one column of the blurred frame.
///
/// Rows within 5% of either frame edge are ignored, as is anything farther
/// than [`MAX_RANGE_ANGSTROMS`] from the line center.
pub(crate) fn column_wing_stats(
    blurred: &ArrayView2<f32>,
    column: usize,
    center: f64,
    dispersion: Dispersion,
) -> WingColumnStats {
    let height = blurred.nrows();
    let wing_limit = WING_LIMIT_ANGSTROMS / dispersion.angstroms_per_pixel();
    let max_range = MAX_RANGE_ANGSTROMS / dispersion.angstroms_per_pixel();
    let offset = 5 * height / 100;

    let mut line_sum = 0.0;
    let mut wing_sum = 0.0;
    let mut line_count = 0.0;
    let mut wing_count = 0.0;
    for y in offset..height - offset {
        let distance = (y as f64 - center).abs();
        if distance > max_range {
            continue;
        }
        let v = blurred[[y, column]] as f64;
        if distance < wing_limit {
            line_sum += v;
            line_count += 1.0;
        } else {
            wing_sum += v;
            wing_count += 1.0;
        }
    }
    let line_avg = if line_count > 0.0 { line_sum / line_count } else { 0.0 };
    let wing_avg = if wing_count > 0.0 { wing_sum / wing_count } else { 0.0 };

    let mut line_variance = 0.0;
    let mut wing_variance = 0.0;
    let mut wing_min_value = f64::MAX;
    for y in offset..height - offset {
        let distance = (y as f64 - center).abs();
        if distance > max_range {
            continue;
        }
        let v = blurred[[y, column]] as f64;
        if distance < wing_limit {
            let delta = v - line_avg;
            line_variance += delta * delta;
        } else {
            let delta = v - wing_avg;
            wing_variance += delta * delta;
            if v < wing_min_value {
                wing_min_value = v;
            }
        }
    }

    // Walk outward from the core while the profile keeps rising; the last
    // rising sample is the brightest wing point worth attributing.
    let mut wing_max_value = 0.0;
    let mut wing_max_y = i64::MIN;
    let up_start = (center + wing_limit + 1.0) as i64;
    let up_end = ((center + max_range) as i64).min(height as i64);
    let mut y = up_start;
    while y >= 0 && y < up_end {
        let v = blurred[[y as usize, column]] as f64;
        if v > wing_max_value {
            wing_max_value = v;
            wing_max_y = y;
        } else {
            break;
        }
        y += 1;
    }
    let down_start = (center - wing_limit - 1.0) as i64;
    let down_end = ((center - max_range) as i64).max(0);
    let mut y = down_start;
    while y >= down_end && (y as usize) < height {
        let v = blurred[[y as usize, column]] as f64;
        if v > wing_max_value {
            wing_max_value = v;
            wing_max_y = y;
        } else {
            break;
        }
        y -= 1;
    }

    WingColumnStats {
        line: PixelStats {
            average: line_avg,
            stddev: if line_count > 1.0 {
                (line_variance / (line_count - 1.0)).sqrt()
            } else {
                0.0
            },
        },
        wing: PixelStats {
            average: wing_avg,
            stddev: if wing_count > 1.0 {
                (wing_variance / (wing_count - 1.0)).sqrt()
            } else {
                0.0
            },
        },
        wing_max_y,
        wing_max_value,
        wing_min_value,
    }
}

/// Score one column against its neighborhood, yielding a candidate when the
/// wing excess is strong enough.
#[allow(clippy::too_many_arguments)]
pub(crate) fn score_column(
    frame_id: usize,
    x: usize,
    width: usize,
    left: usize,
    right: usize,
    line_center: f64,
    column_stats: &[Option<WingColumnStats>],
    global_line_avg: f64,
    global_wing_avg: f64,
    dispersion: Dispersion,
) -> Option<Flare> {
    if right - left < MIN_WIDTH_FOR_DETECTION {
        return None;
    }
    let col_stats = column_stats[x].as_ref()?;

    let mut neighborhood_line_avg = 0.0;
    let mut neighborhood_wing_avg = 0.0;
    let mut count = 0usize;
    for k in -(LOCAL_RANGE as i64)..=(LOCAL_RANGE as i64) {
        let neighbor = x as i64 + k;
        if k == 0 || neighbor < 0 || neighbor >= width as i64 {
            continue;
        }
        if let Some(stats) = column_stats[neighbor as usize].as_ref() {
            if stats.wing.average > 0.9 * global_wing_avg {
                neighborhood_line_avg += stats.line.average;
                neighborhood_wing_avg += stats.wing.average;
                count += 1;
            }
        }
    }
    if count == 0 {
        return None;
    }
    neighborhood_line_avg /= count as f64;
    neighborhood_wing_avg /= count as f64;

    // Flares brighten the line core; Ellerman bombs do not, so the core
    // brightening doubles as the classification axis
    let line_brightening =
        1.0f64.max(col_stats.line.average / neighborhood_line_avg.min(global_line_avg));
    let mut score = 1.0 + col_stats.wing_max_value / neighborhood_wing_avg.min(global_wing_avg);
    score *= count as f64 / (2.0 * LOCAL_RANGE as f64);

    let wing_rel_diff = col_stats.wing_max_value / neighborhood_wing_avg;
    if wing_rel_diff <= 1.05 {
        return None;
    }
    score = score.powf(wing_rel_diff.exp());
    score *= (col_stats.wing_max_value / col_stats.line.average).sqrt();

    // A genuine Ellerman bomb peaks around 1 A from the line center
    let shift_angstroms =
        (col_stats.wing_max_y as f64 - line_center).abs() * dispersion.angstroms_per_pixel();
    score /= 1.0 + (1.0 - shift_angstroms).abs();

    if score > SCORE_THRESHOLD {
        if line_brightening < 1.5 {
            return Some(Flare {
                kind: FlareKind::EllermanBomb,
                frame_id,
                column: x,
                score,
            });
        } else if line_brightening > 2.0 {
            return Some(Flare {
                kind: FlareKind::Flare,
                frame_id,
                column: x,
                score,
            });
        }
    }
    None
}

/// Reduce raw candidates to the final detection set.
///
/// Candidates sort strongest-first; anything within [`LOCAL_RANGE`] of a
/// stronger candidate is dropped as the same site. A set that still has
/// more than [`MAX_FLARE_COUNT`] survivors is judged a misdetection and
/// cleared entirely.
pub(crate) fn reduce_candidates(mut candidates: Vec<Flare>) -> Vec<Flare> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut i = 0;
    while i < candidates.len() {
        let anchor = candidates[i].position();
        let mut j = candidates.len() - 1;
        while j > i {
            if anchor.distance_to(&candidates[j].position()) < LOCAL_RANGE as f64 {
                candidates.remove(j);
            }
            j -= 1;
        }
        i += 1;
    }
    if candidates.len() > MAX_FLARE_COUNT {
        return Vec::new();
    }
    candidates
}
