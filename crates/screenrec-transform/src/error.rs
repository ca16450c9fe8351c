//! Error types for frame transformation

use thiserror::Error;

/// Errors raised while planning or running a frame transform
///
/// Geometry problems are configuration faults: they surface when the
/// transformer is built during session setup. The mismatch variants are the
/// only ones a steady-state `transform()` call can return, and only when the
/// capture source changes its output under our feet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Geometry parameters cannot describe a valid output frame
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Output row pitch cannot hold a full video row
    #[error("Output stride {stride} smaller than video width {width}")]
    StrideTooSmall {
        /// Output stride in pixels
        stride: u32,
        /// Video width in pixels
        width: u32,
    },

    /// The captured frame no longer matches the planned input size
    #[error("Frame is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    FrameMismatch {
        /// Planned input width
        expected_width: u32,
        /// Planned input height
        expected_height: u32,
        /// Width of the frame received
        actual_width: u32,
        /// Height of the frame received
        actual_height: u32,
    },

    /// The destination buffer was allocated for a different layout
    #[error("Destination buffer mismatch: {0}")]
    BufferMismatch(String),
}

/// Result type for transform operations
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    pub(crate) fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    pub(crate) fn buffer_mismatch(msg: impl Into<String>) -> Self {
        Self::BufferMismatch(msg.into())
    }

    /// `true` for errors that can only come from setup-time parameters
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidGeometry(_) | Self::StrideTooSmall { .. })
    }
}
