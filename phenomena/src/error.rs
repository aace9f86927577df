use thiserror::Error;

/// Errors produced by the phenomena detection pipeline.
///
/// These are caller-contract violations; statistical rejections (missing
/// borders, dim columns, degenerate ranges) are silent skips, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// Frame buffer shape does not match the declared geometry.
    #[error("frame {frame_id}: buffer is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameGeometry {
        /// Frame identifier.
        frame_id: usize,
        /// Declared frame width.
        width: usize,
        /// Declared frame height.
        height: usize,
        /// Width of the supplied buffer.
        actual_width: usize,
        /// Height of the supplied buffer.
        actual_height: usize,
    },

    /// Frame identifier is outside the capture declared by the header.
    #[error("frame id {frame_id} out of range for capture of {frame_count} frames")]
    FrameIdOutOfRange {
        /// Frame identifier.
        frame_id: usize,
        /// Number of frames in the capture.
        frame_count: usize,
    },
}
