//! Error types for capture sources

use thiserror::Error;

/// Errors raised by a [`FrameSource`](crate::FrameSource)
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The capture device could not be opened
    #[error("Failed to open capture device {path}: {source}")]
    DeviceOpen {
        /// Device path that failed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Querying the device geometry failed
    #[error("Device query failed: {0}")]
    DeviceQuery(String),

    /// Mapping the device memory failed
    #[error("Memory map failed: {0}")]
    MapFailed(String),

    /// The source delivers a pixel layout we cannot consume
    #[error("Unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// A refresh of the current frame failed
    #[error("Frame refresh failed: {0}")]
    RefreshFailed(String),

    /// The pixel storage is smaller than the declared geometry
    #[error("Frame data too small: need {needed} bytes, got {actual}")]
    BufferTooSmall {
        /// Bytes required by width/height/stride
        needed: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Declared geometry is inconsistent (zero size or stride < width)
    #[error("Invalid frame geometry: {0}")]
    InvalidGeometry(String),

    /// The source was used after [`FrameSource::release`](crate::FrameSource::release)
    #[error("Capture source already released")]
    Released,
}

/// Result type for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

impl CaptureError {
    pub(crate) fn refresh_failed(msg: impl Into<String>) -> Self {
        Self::RefreshFailed(msg.into())
    }

    pub(crate) fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }
}
