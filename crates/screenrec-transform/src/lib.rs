//! # screenrec-transform
//!
//! Geometry and colour conversion from captured display frames to encoder
//! input frames.
//!
//! # Pipeline position
//!
//! ```text
//! ┌────────────────────┐
//! │  screenrec-capture │  RawFrame (RGBA/BGRA, any stride)
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │  Geometry          │ ◄── output size, padding, rotate view
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │  FrameTransformer  │ ◄── orientation x colour conversion
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │  VideoFrameBuffer  │  RGBA/BGRA or YUV 4:2:0 (I420/NV12)
//! └────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use screenrec_capture::{FrameSize, FrameSource, SyntheticSource};
//! use screenrec_transform::{FrameTransformer, Geometry, OutputFormat, Padding};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut source = SyntheticSource::new(480, 640);
//! source.refresh(FrameSize::default())?;
//! let frame = source.current_frame().ok_or("no frame")?;
//!
//! // Portrait source, landscape output
//! let geometry = Geometry::resolve(FrameSize::new(480, 640), Padding::default(), 0, false)?;
//! let transformer = FrameTransformer::new(geometry, OutputFormat::Yuv420Planar)?;
//!
//! let mut out = transformer.allocate()?;
//! transformer.transform(&frame, &mut out)?;
//! assert_eq!((out.width(), out.height()), (640, 480));
//! # Ok(())
//! # }
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod buffer;
pub mod color;
pub mod convert;
pub mod error;
pub mod format;
pub mod geometry;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use buffer::VideoFrameBuffer;
pub use color::{rgb_to_yuv, swap_red_blue};
pub use convert::FrameTransformer;
pub use error::{Result, TransformError};
pub use format::{ChromaLayout, OutputFormat};
pub use geometry::{Geometry, Padding};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
