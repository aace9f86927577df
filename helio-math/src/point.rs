//! Double-precision 2D points.

use serde::{Deserialize, Serialize};

/// A point in 2D space.
///
/// Coordinates are doubles so that points survive affine remapping (e.g.
/// from frame-local to reconstructed-image coordinates) without rounding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2d {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point2d {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Return this point translated by the given offset.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translate() {
        let p = Point2d::new(3.0, 4.0).translate(-1.0, 2.0);
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 6.0);
    }

    #[test]
    fn test_distance() {
        let a = Point2d::new(0.0, 0.0);
        let b = Point2d::new(3.0, 4.0);
        assert_relative_eq!(a.distance_to(&b), 5.0);
        assert_relative_eq!(b.distance_to(&a), 5.0);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = Point2d::new(-7.5, 12.25);
        assert_relative_eq!(p.distance_to(&p), 0.0);
    }
}
