//! Polynomial least-squares regression.
//!
//! Fits a polynomial of arbitrary order to a series of points by solving the
//! normal equations of the Vandermonde design matrix. Used to model smooth
//! per-column baselines (mean and spread) across a spectral frame.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::point::Point2d;

/// Error when a polynomial fit cannot be computed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// Fewer sample points than polynomial coefficients.
    #[error("not enough points for order-{order} fit: {actual} given, {required} required")]
    NotEnoughPoints {
        /// Requested polynomial order.
        order: usize,
        /// Minimum number of points needed.
        required: usize,
        /// Number of points supplied.
        actual: usize,
    },

    /// The normal matrix is singular (degenerate sample positions).
    #[error("singular normal matrix: sample positions are degenerate")]
    SingularSystem,
}

/// A polynomial in one variable.
///
/// Coefficients are ordered by descending power: `coefficients[0]` is the
/// coefficient of the highest-order term.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Create a polynomial from coefficients ordered by descending power.
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// Coefficients by descending power.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Evaluate the polynomial at `x` (Horner's method).
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
    }
}

/// Fit a polynomial of the given order to a series of points.
///
/// Builds the Vandermonde design matrix and solves the least-squares normal
/// equations `(XᵀX) c = Xᵀy` by LU decomposition.
///
/// # Arguments
/// * `points` - Sample points `(x, y)`
/// * `order` - Polynomial order (3 for the cubic baselines used in detection)
///
/// # Errors
/// Returns [`FitError::NotEnoughPoints`] when the system is underdetermined
/// and [`FitError::SingularSystem`] when the sample positions are degenerate
/// (e.g. all identical x).
pub fn polynomial_regression(points: &[Point2d], order: usize) -> Result<Polynomial, FitError> {
    let unknowns = order + 1;
    if points.len() < unknowns {
        return Err(FitError::NotEnoughPoints {
            order,
            required: unknowns,
            actual: points.len(),
        });
    }

    let design = DMatrix::from_fn(points.len(), unknowns, |i, j| points[i].x.powi(j as i32));
    let observed = DVector::from_fn(points.len(), |i, _| points[i].y);

    let normal = design.transpose() * &design;
    let moment = design.transpose() * observed;

    let solution = normal.lu().solve(&moment).ok_or(FitError::SingularSystem)?;

    // Solution comes out in ascending power order
    let mut coefficients: Vec<f64> = solution.iter().copied().collect();
    coefficients.reverse();
    Ok(Polynomial::new(coefficients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(f: impl Fn(f64) -> f64, n: usize) -> Vec<Point2d> {
        (0..n).map(|x| Point2d::new(x as f64, f(x as f64))).collect()
    }

    #[test]
    fn test_cubic_round_trip() {
        let points = sample(|x| 0.5 * x * x * x - 2.0 * x * x + 3.0 * x - 7.0, 64);
        let model = polynomial_regression(&points, 3).unwrap();

        let coeffs = model.coefficients();
        assert_eq!(coeffs.len(), 4);
        assert_relative_eq!(coeffs[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(coeffs[1], -2.0, epsilon = 1e-6);
        assert_relative_eq!(coeffs[2], 3.0, epsilon = 1e-6);
        assert_relative_eq!(coeffs[3], -7.0, epsilon = 1e-6);
    }

    #[test]
    fn test_constant_series_fits_flat() {
        let points = sample(|_| 42.0, 32);
        let model = polynomial_regression(&points, 3).unwrap();

        for x in [0.0, 7.5, 31.0] {
            assert_relative_eq!(model.eval(x), 42.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_noisy_linear_trend() {
        // Alternating +-1 residuals around a line average out
        let points: Vec<Point2d> = (0..100)
            .map(|x| {
                let noise = if x % 2 == 0 { 1.0 } else { -1.0 };
                Point2d::new(x as f64, 3.0 * x as f64 + 10.0 + noise)
            })
            .collect();
        let model = polynomial_regression(&points, 1).unwrap();

        assert_relative_eq!(model.coefficients()[0], 3.0, epsilon = 1e-2);
        assert_relative_eq!(model.coefficients()[1], 10.0, epsilon = 1.0);
    }

    #[test]
    fn test_not_enough_points() {
        let points = sample(|x| x, 3);
        let err = polynomial_regression(&points, 3).unwrap_err();
        assert_eq!(
            err,
            FitError::NotEnoughPoints {
                order: 3,
                required: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_degenerate_positions() {
        // All samples at the same x: the normal matrix is singular
        let points: Vec<Point2d> = (0..10).map(|y| Point2d::new(5.0, y as f64)).collect();
        let err = polynomial_regression(&points, 3).unwrap_err();
        assert_eq!(err, FitError::SingularSystem);
    }

    #[test]
    fn test_horner_eval() {
        // 2x^2 + 3x + 4 at x = 5
        let poly = Polynomial::new(vec![2.0, 3.0, 4.0]);
        assert_relative_eq!(poly.eval(5.0), 69.0);
        assert_relative_eq!(poly.eval(0.0), 4.0);
    }
}
