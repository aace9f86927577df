//! Solar-disk border consumption.
//!
//! Locating the left/right borders of the solar disk within a spectral frame
//! is the job of an external analyzer; this module defines the seam the
//! detector consumes it through, plus the per-frame record of raw borders.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Capture metadata forwarded to the border locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Total number of frames in the capture.
    pub frame_count: usize,
    /// Whether the capture was trimmed to the solar disk beforehand.
    pub trimmed: bool,
}

/// Locates the solar-disk borders within one spectral frame.
///
/// Returns the `(left, right)` column range of the disk, or `None` when one
/// or both borders cannot be found; such a frame contributes no detections.
pub trait BorderLocator: Send + Sync {
    /// Locate the disk borders in `frame`.
    fn locate(&self, frame: &ArrayView2<f32>, header: &FrameHeader) -> Option<(usize, usize)>;
}

/// Border locator for captures whose borders are known up front,
/// e.g. pre-trimmed captures spanning the full frame width.
#[derive(Debug, Clone, Copy)]
pub struct FixedBorders {
    /// Left border column.
    pub left: usize,
    /// Right border column (exclusive).
    pub right: usize,
}

impl BorderLocator for FixedBorders {
    fn locate(&self, _frame: &ArrayView2<f32>, _header: &FrameHeader) -> Option<(usize, usize)> {
        Some((self.left, self.right))
    }
}

/// Raw border columns recorded per frame, `-1` where none was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorderDetection {
    left: Vec<i32>,
    right: Vec<i32>,
}

impl BorderDetection {
    pub(crate) fn new(frame_count: usize) -> Self {
        Self {
            left: vec![-1; frame_count],
            right: vec![-1; frame_count],
        }
    }

    pub(crate) fn record(&mut self, frame_id: usize, left: usize, right: usize) {
        self.left[frame_id] = left as i32;
        self.right[frame_id] = right as i32;
    }

    /// Left border per frame, `-1` where detection failed.
    pub fn left(&self) -> &[i32] {
        &self.left
    }

    /// Right border per frame, `-1` where detection failed.
    pub fn right(&self) -> &[i32] {
        &self.right
    }
}
