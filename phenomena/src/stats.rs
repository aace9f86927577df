//! Per-column statistics and smooth baselines for one spectral frame.
//!
//! For every column of the narrowed disk range this computes the mean and
//! spread of pixel intensity over all rows, then fits third-order polynomial
//! baselines to both series. The fitted models are the "expected" values a
//! column is compared against when classifying anomalies.

use helio_math::{polynomial_regression, Point2d, Polynomial};
use ndarray::ArrayView2;

/// Polynomial order of the fitted baselines.
const BASELINE_ORDER: usize = 3;

/// Column statistics over a narrowed disk range, with fitted baselines.
#[derive(Debug, Clone)]
pub struct ColumnStatistics {
    left: usize,
    right: usize,
    column_averages: Vec<f64>,
    column_stddevs: Vec<f64>,
    avg_model: Polynomial,
    stddev_model: Polynomial,
    avg_of_column_averages: f64,
    avg_center_line_value: f64,
}

impl ColumnStatistics {
    /// Compute statistics for every column of `[left, right)`.
    ///
    /// `polynomial` maps a column to the sub-pixel row of the spectral line
    /// center. Returns `None` when the range is degenerate or the baseline
    /// fit is singular; the frame then contributes no detections.
    pub fn compute<F>(
        frame: &ArrayView2<f32>,
        left: usize,
        right: usize,
        polynomial: &F,
    ) -> Option<Self>
    where
        F: Fn(f64) -> f64,
    {
        let (height, width) = frame.dim();
        if left >= right || right > width || height == 0 {
            return None;
        }

        let mut column_averages = vec![0.0; width];
        let mut column_stddevs = vec![0.0; width];
        let mut sum_of_averages = 0.0;
        let mut center_sum = 0.0;
        let mut center_count = 0usize;

        for x in left..right {
            let avg = column_average(frame, x);
            column_averages[x] = avg;
            sum_of_averages += avg;

            let y = polynomial(x as f64).round() as i64;
            if y >= 0 && (y as usize) < height {
                center_sum += frame[[y as usize, x]] as f64;
                center_count += 1;
            }
        }

        let mut avg_points = Vec::with_capacity(right - left);
        let mut stddev_points = Vec::with_capacity(right - left);
        for x in left..right {
            let avg = column_averages[x];
            let mut variance_sum = 0.0;
            for y in 0..height {
                let delta = frame[[y, x]] as f64 - avg;
                variance_sum += delta * delta;
            }
            column_stddevs[x] = (variance_sum / height as f64).sqrt();

            avg_points.push(Point2d::new(x as f64, avg));
            stddev_points.push(Point2d::new(x as f64, column_stddevs[x]));
        }

        let avg_model = polynomial_regression(&avg_points, BASELINE_ORDER).ok()?;
        let stddev_model = polynomial_regression(&stddev_points, BASELINE_ORDER).ok()?;

        let avg_center_line_value = if center_count > 0 {
            center_sum / center_count as f64
        } else {
            0.0
        };

        Some(Self {
            left,
            right,
            column_averages,
            column_stddevs,
            avg_model,
            stddev_model,
            avg_of_column_averages: sum_of_averages / (right - left) as f64,
            avg_center_line_value,
        })
    }

    /// Narrowed column range these statistics cover.
    pub fn range(&self) -> (usize, usize) {
        (self.left, self.right)
    }

    /// Mean pixel value of a column over all rows.
    pub fn column_average(&self, x: usize) -> f64 {
        self.column_averages[x]
    }

    /// Population standard deviation of a column over all rows.
    pub fn column_stddev(&self, x: usize) -> f64 {
        self.column_stddevs[x]
    }

    /// Fitted baseline for column averages, evaluated at `x`.
    pub fn expected_average(&self, x: usize) -> f64 {
        self.avg_model.eval(x as f64)
    }

    /// Fitted baseline for column standard deviations, evaluated at `x`.
    pub fn expected_stddev(&self, x: usize) -> f64 {
        self.stddev_model.eval(x as f64)
    }

    /// Mean of all column averages in range.
    pub fn avg_of_column_averages(&self) -> f64 {
        self.avg_of_column_averages
    }

    /// Mean pixel value at the line-center row, over columns in range.
    pub fn avg_center_line_value(&self) -> f64 {
        self.avg_center_line_value
    }
}

/// Mean pixel value of one column over all rows.
pub(crate) fn column_average(frame: &ArrayView2<f32>, x: usize) -> f64 {
    let height = frame.nrows();
    let mut sum = 0.0;
    for y in 0..height {
        sum += frame[[y, x]] as f64;
    }
    sum / height as f64
}

/// Sample standard deviation (divisor `n - 1`) of one column over all rows.
///
/// This is the spread estimate the wing scan thresholds against; the
/// population form is reserved for the fitted baseline series.
pub(crate) fn column_sample_stddev(frame: &ArrayView2<f32>, x: usize) -> f64 {
    let height = frame.nrows();
    let avg = column_average(frame, x);
    let mut variance_sum = 0.0;
    for y in 0..height {
        let delta = frame[[y, x]] as f64 - avg;
        variance_sum += delta * delta;
    }
    (variance_sum / (height as f64 - 1.0)).sqrt()
}
