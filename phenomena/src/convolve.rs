//! Small-kernel convolution for frame preprocessing.

use ndarray::{Array2, ArrayView2};

/// 3x3 Gaussian blur weights, normalized to 1.
const GAUSSIAN_3X3: [[f32; 3]; 3] = [
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
    [2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0],
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
];

/// Smooth a frame with a 3x3 Gaussian kernel.
///
/// Edge pixels are handled by clamping sample coordinates to the frame, so
/// the output has the same shape as the input and no energy is lost at the
/// borders.
pub fn gaussian_blur(frame: &ArrayView2<f32>) -> Array2<f32> {
    let (height, width) = frame.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        let mut sum = 0.0;
        for (ky, row) in GAUSSIAN_3X3.iter().enumerate() {
            for (kx, &weight) in row.iter().enumerate() {
                let sy = (y + ky).saturating_sub(1).min(height - 1);
                let sx = (x + kx).saturating_sub(1).min(width - 1);
                sum += weight * frame[[sy, sx]];
            }
        }
        sum
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_frame_unchanged() {
        let frame = Array2::<f32>::from_elem((8, 8), 100.0);
        let blurred = gaussian_blur(&frame.view());

        for &v in blurred.iter() {
            assert_relative_eq!(v, 100.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_single_pixel_spreads() {
        let mut frame = Array2::<f32>::zeros((5, 5));
        frame[[2, 2]] = 16.0;
        let blurred = gaussian_blur(&frame.view());

        assert_relative_eq!(blurred[[2, 2]], 4.0, epsilon = 1e-6);
        assert_relative_eq!(blurred[[1, 2]], 2.0, epsilon = 1e-6);
        assert_relative_eq!(blurred[[1, 1]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(blurred[[0, 0]], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_energy_preserved() {
        let mut frame = Array2::<f32>::zeros((7, 7));
        frame[[3, 3]] = 32.0;
        let blurred = gaussian_blur(&frame.view());

        let total: f32 = blurred.iter().sum();
        assert_relative_eq!(total, 32.0, epsilon = 1e-4);
    }
}
