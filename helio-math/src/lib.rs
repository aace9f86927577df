//! helio-math - Mathematical utilities for solar spectrum analysis
//!
//! This crate provides the small, well-defined numerical pieces used by the
//! phenomena detection engine:
//!
//! - **Point2d** - double-precision 2D points with affine helpers
//! - **Regression** - polynomial least-squares fitting for baseline models
//! - **Matrix** - symmetric 2x2 eigenvalue extraction for shape analysis
//!
//! # Example
//!
//! ```
//! use helio_math::{polynomial_regression, Point2d};
//!
//! let points: Vec<Point2d> = (0..32)
//!     .map(|x| {
//!         let x = x as f64;
//!         Point2d::new(x, 2.0 * x * x + 3.0 * x + 1.0)
//!     })
//!     .collect();
//! let model = polynomial_regression(&points, 2).unwrap();
//! assert!((model.eval(10.0) - 231.0).abs() < 1e-6);
//! ```

pub mod matrix2;
pub mod point;
pub mod regression;

// Re-export commonly used types
pub use matrix2::symmetric_eigenvalues;
pub use point::Point2d;
pub use regression::{polynomial_regression, FitError, Polynomial};
