//! Symmetric 2x2 matrix utilities using nalgebra.

use nalgebra::Matrix2;

/// Eigenvalues of the symmetric 2x2 matrix `[[xx, xy], [xy, yy]]`.
///
/// Returns `(largest, smallest)`. Useful for shape analysis of point clouds,
/// where the matrix is a covariance matrix and the square roots of the
/// eigenvalues give the principal-axis extents.
pub fn symmetric_eigenvalues(xx: f64, yy: f64, xy: f64) -> (f64, f64) {
    let matrix = Matrix2::new(xx, xy, xy, yy);
    let eigen = matrix.symmetric_eigen();
    let a = eigen.eigenvalues[0];
    let b = eigen.eigenvalues[1];
    (a.max(b), a.min(b))
}
