//! Active-region reconstruction: flood fill, size filtering, merging.
//!
//! Per-frame column masks flatten into a point cloud with the column index
//! as one axis and the frame id as the other. Connected components of that
//! cloud become candidate regions, which are filtered by size, merged while
//! their centroids stay close, and finally screened for degenerate shapes.

use std::collections::{BTreeMap, HashSet};

use helio_math::{symmetric_eigenvalues, Point2d};
use serde::{Deserialize, Serialize};

/// Minimum bounding-box span (both axes) for a region to survive filtering.
const MIN_REGION_SPAN: f64 = 8.0;

/// Regions with a principal-axis ratio above this are discarded as artifacts.
const MAX_ASPECT_RATIO: f64 = 5.0;

/// Defensive cap on merge passes; the merge count strictly decreases, so
/// this is never reached by a correct pass.
const MAX_MERGE_PASSES: usize = 64;

/// Frame-local set of flagged columns, one bit per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMask {
    bits: Vec<bool>,
}

impl ColumnMask {
    /// Create an empty mask for a frame of the given width.
    pub fn new(width: usize) -> Self {
        Self {
            bits: vec![false; width],
        }
    }

    /// Flag a column.
    pub fn set(&mut self, column: usize) {
        self.bits[column] = true;
    }

    /// Number of flagged columns.
    pub fn cardinality(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// True when no column is flagged.
    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Iterate over flagged column indices, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
    }
}

/// A connected group of detection points with its bounding box.
///
/// Points are sorted by `(x, y)`; the bounding box is derived from them at
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRegion {
    points: Vec<Point2d>,
    top_left: Point2d,
    bottom_right: Point2d,
}

impl ActiveRegion {
    /// Create a region from its member points.
    pub fn of(mut points: Vec<Point2d>) -> Self {
        points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for point in &points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Self {
            points,
            top_left: Point2d::new(min_x, min_y),
            bottom_right: Point2d::new(max_x, max_y),
        }
    }

    /// Member points, sorted by `(x, y)`.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// Top-left corner of the bounding box.
    pub fn top_left(&self) -> Point2d {
        self.top_left
    }

    /// Bottom-right corner of the bounding box.
    pub fn bottom_right(&self) -> Point2d {
        self.bottom_right
    }

    /// Bounding-box width.
    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    /// Bounding-box height.
    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    /// Bounding-box area.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    fn centroid(&self) -> Point2d {
        Point2d::new(
            (self.top_left.x + self.bottom_right.x) / 2.0,
            (self.top_left.y + self.bottom_right.y) / 2.0,
        )
    }

    fn diagonal(&self) -> f64 {
        (self.width().powi(2) + self.height().powi(2)).sqrt()
    }

    /// Ratio of the principal-axis extents of the member point cloud.
    fn aspect_ratio(&self) -> f64 {
        let n = self.points.len() as f64;
        let mut mean_x = 0.0;
        let mut mean_y = 0.0;
        for p in &self.points {
            mean_x += p.x;
            mean_y += p.y;
        }
        mean_x /= n;
        mean_y /= n;

        let mut var_xx = 0.0;
        let mut var_yy = 0.0;
        let mut cov_xy = 0.0;
        for p in &self.points {
            let dx = p.x - mean_x;
            let dy = p.y - mean_y;
            var_xx += dx * dx;
            var_yy += dy * dy;
            cov_xy += dx * dy;
        }
        var_xx /= n;
        var_yy /= n;
        cov_xy /= n;

        let (major, minor) = symmetric_eigenvalues(var_xx, var_yy, cov_xy);
        major.max(0.0).sqrt() / minor.max(0.0).sqrt()
    }
}

/// A collection of active regions, sorted by area in descending order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActiveRegions {
    regions: Vec<ActiveRegion>,
}

impl ActiveRegions {
    /// Create a collection; regions are re-sorted by descending area.
    pub fn new(mut regions: Vec<ActiveRegion>) -> Self {
        regions.sort_by(|a, b| b.area().total_cmp(&a.area()));
        Self { regions }
    }

    /// The regions, largest first.
    pub fn regions(&self) -> &[ActiveRegion] {
        &self.regions
    }

    /// True when no region was found.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Transform all region points, re-deriving bounding boxes.
    ///
    /// Used to remap regions from frame-local to reconstructed-image
    /// coordinates when the output image is rotated or flipped relative to
    /// capture orientation.
    pub fn transform<F>(&self, transformer: F) -> Self
    where
        F: Fn(Point2d) -> Point2d,
    {
        Self::new(
            self.regions
                .iter()
                .map(|region| {
                    ActiveRegion::of(region.points.iter().map(|&p| transformer(p)).collect())
                })
                .collect(),
        )
    }

    /// Translate all regions by the given offset.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        self.transform(|p| p.translate(dx, dy))
    }
}

/// Reconstruct clustered active regions from per-frame column masks.
pub(crate) fn build_active_regions(masks: &BTreeMap<usize, ColumnMask>) -> ActiveRegions {
    let points: Vec<(i64, i64)> = masks
        .iter()
        .filter(|(_, mask)| !mask.is_empty())
        .flat_map(|(&frame_id, mask)| mask.ones().map(move |x| (x as i64, frame_id as i64)))
        .collect();

    let mut components = connected_components(&points);
    components.sort_by(|a, b| b.len().cmp(&a.len()));

    let candidates: Vec<ActiveRegion> = components
        .into_iter()
        .map(|component| {
            ActiveRegion::of(
                component
                    .into_iter()
                    .map(|(x, y)| Point2d::new(x as f64, y as f64))
                    .collect(),
            )
        })
        .filter(|region| region.width() >= MIN_REGION_SPAN && region.height() >= MIN_REGION_SPAN)
        .collect();

    let merged = merge_until_stable(candidates);
    ActiveRegions::new(
        merged
            .into_iter()
            .filter(|region| region.aspect_ratio() <= MAX_ASPECT_RATIO)
            .collect(),
    )
}

/// Extract 4-connected components from a point set.
///
/// Iterative flood fill over an explicit stack; recursion depth would be
/// unbounded on large regions.
fn connected_components(points: &[(i64, i64)]) -> Vec<Vec<(i64, i64)>> {
    let point_set: HashSet<(i64, i64)> = points.iter().copied().collect();
    let mut visited: HashSet<(i64, i64)> = HashSet::with_capacity(points.len());
    let mut components = Vec::new();

    for &start in points {
        if visited.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            component.push(current);
            let (x, y) = current;
            for neighbor in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                if point_set.contains(&neighbor) && !visited.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        components.push(component);
    }

    components
}

/// Merge regions until a pass produces no reduction.
///
/// A single pass can create a region that now overlaps a previously
/// unmergeable one, so the pass repeats to a fixed point.
fn merge_until_stable(mut regions: Vec<ActiveRegion>) -> Vec<ActiveRegion> {
    for _ in 0..MAX_MERGE_PASSES {
        let before = regions.len();
        regions = merge_pass(regions);
        if regions.len() == before {
            return regions;
        }
    }
    debug_assert!(false, "active-region merge did not converge");
    regions
}

fn merge_pass(mut regions: Vec<ActiveRegion>) -> Vec<ActiveRegion> {
    regions.sort_by(|a, b| {
        a.top_left
            .x
            .total_cmp(&b.top_left.x)
            .then(a.top_left.y.total_cmp(&b.top_left.y))
    });

    let mut deleted = vec![false; regions.len()];
    let mut clusters = Vec::new();
    for i in 0..regions.len() {
        if deleted[i] {
            continue;
        }
        let mut current = regions[i].clone();
        for j in (i + 1)..regions.len() {
            if deleted[j] {
                continue;
            }
            if should_merge(&current, &regions[j]) {
                let mut points = current.points;
                points.extend_from_slice(regions[j].points());
                current = ActiveRegion::of(points);
                deleted[j] = true;
            }
        }
        clusters.push(current);
    }
    clusters
}

/// Two regions merge when their centroids are closer than the mean of
/// their diagonal extents.
fn should_merge(a: &ActiveRegion, b: &ActiveRegion) -> bool {
    a.centroid().distance_to(&b.centroid()) < (a.diagonal() + b.diagonal()) / 2.0
}
