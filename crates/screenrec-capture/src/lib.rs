//! # screenrec-capture
//!
//! Raw display frame sources for the screenrec recording pipeline.
//!
//! A recording session never talks to the display directly. It asks a
//! [`FrameSource`] to refresh and then borrows the resulting [`RawFrame`]: a
//! non-owning view of pixel memory (base, width, height, stride, byte order)
//! that is valid until the next refresh or release.
//!
//! # Sources
//!
//! | Source | Platform | Description |
//! |--------|----------|-------------|
//! | [`SyntheticSource`] | any | Moving gradient generated in memory |
//! | `FramebufferSource` | Linux (`fbdev` feature) | Memory-mapped `/dev/fbN` |
//!
//! Platform snapshot APIs (compositor screenshots, GPU surfaces) plug in by
//! implementing [`FrameSource`].
//!
//! # Quick Start
//!
//! ```rust
//! use screenrec_capture::{FrameSize, FrameSource, SyntheticSource};
//!
//! # fn main() -> Result<(), screenrec_capture::CaptureError> {
//! let mut source = SyntheticSource::new(640, 480);
//! source.refresh(FrameSize::default())?;
//!
//! if let Some(frame) = source.current_frame() {
//!     println!("{}x{} stride {}", frame.width(), frame.height(), frame.stride());
//! }
//!
//! source.release();
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `fbdev` | Yes | Linux framebuffer device source |

#![cfg_attr(docsrs, feature(doc_cfg))]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod error;
pub mod format;
pub mod frame;
pub mod source;
pub mod synthetic;

// =============================================================================
// FEATURE MODULES
// =============================================================================

/// Linux framebuffer capture
///
/// Requires the `fbdev` feature.
#[cfg(all(feature = "fbdev", target_os = "linux"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "fbdev", target_os = "linux"))))]
pub mod framebuffer;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use error::{CaptureError, Result};
pub use format::PixelLayout;
pub use frame::RawFrame;
pub use source::{FrameSize, FrameSource};
pub use synthetic::{gradient_pixel, SyntheticSource};

#[cfg(all(feature = "fbdev", target_os = "linux"))]
pub use framebuffer::{FramebufferSource, DEFAULT_FB_DEVICE};

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
