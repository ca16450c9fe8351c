//! # screenrec
//!
//! Screen recording core: frame capture, geometry and color transform, paced
//! encoding with an interleaved audio track.
//!
//! This crate provides a unified interface to the screenrec libraries:
//!
//! - **[`capture`]** - Raw display frame sources (synthetic, Linux framebuffer)
//! - **[`transform`]** - Rotation, padding and RGBA/BGRA/YUV 4:2:0 conversion
//! - **[`pipeline`]** - Capture loop, double-buffered encoding, audio ring buffer, session lifecycle
//!
//! # Features
//!
//! All core features are enabled by default. You can selectively enable only what you need:
//!
//! ```toml
//! # Use everything (default)
//! screenrec = "0.1"
//!
//! # Pixel conversion only
//! screenrec = { version = "0.1", default-features = false, features = ["transform"] }
//!
//! # All features including test doubles
//! screenrec = { version = "0.1", features = ["full"] }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `capture` | Yes | Frame sources |
//! | `transform` | Yes | Geometry and pixel conversion |
//! | `pipeline` | Yes | Recording sessions (implies `capture` and `transform`) |
//! | `full` | No | All features from all sub-crates |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use screenrec::prelude::*;
//!
//! # fn main() -> Result<(), RecorderError> {
//! let config = RecorderConfig::builder()
//!     .frame_rate(FrameRate::Capped(15))
//!     .rotation_degrees(90)
//!     .padding(0, 16)
//!     .build();
//!
//! let backend = Y4mBackend::create("screen.y4m")?;
//! let recorder = Recorder::setup(config, SyntheticSource::new(1080, 1920), SinkTarget::encoder(backend), None)?;
//!
//! let outcome = recorder.run();
//! println!("exit code {}", outcome.exit_code);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           screenrec                             │
//! ├──────────────────┬─────────────────────┬────────────────────────┤
//! │ screenrec-capture│ screenrec-transform │   screenrec-pipeline   │
//! │                  │                     │                        │
//! │  FrameSource     │  Geometry           │  Recorder              │
//! │  RawFrame        │  FrameTransformer   │  EncodePipeline        │
//! │  SyntheticSource │  VideoFrameBuffer   │  AudioRingBuffer       │
//! └────────┬─────────┴──────────┬──────────┴───────────┬────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//!   Display pixels      Encoder input format    EncoderBackend / AudioCapture
//! ```
//!
//! # Platform Support
//!
//! The transform and pipeline crates are portable. The framebuffer source
//! needs Linux `/dev/fb*`.
//!
//! # Related Crates
//!
//! You can also use the individual crates directly:
//!
//! - `screenrec-capture` - Frame sources only
//! - `screenrec-transform` - Pixel conversion only
//! - `screenrec-pipeline` - Recording sessions

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// Raw display frame sources.
///
/// - [`FrameSource`](screenrec_capture::FrameSource) trait with a borrowed
///   [`RawFrame`](screenrec_capture::RawFrame) view
/// - Deterministic synthetic gradient source
/// - Linux framebuffer source (`fbdev` feature)
///
/// See [`screenrec_capture`] documentation for details.
#[cfg(feature = "capture")]
#[cfg_attr(docsrs, doc(cfg(feature = "capture")))]
pub use screenrec_capture as capture;

/// Geometry resolution and pixel conversion.
///
/// See [`screenrec_transform`] documentation for details.
#[cfg(feature = "transform")]
#[cfg_attr(docsrs, doc(cfg(feature = "transform")))]
pub use screenrec_transform as transform;

/// Recording sessions.
///
/// - Frame-rate governor and wall-clock timestamps
/// - Single- or double-buffered encode pipeline
/// - Audio ring buffer drained in step with video
/// - `Init → Capturing → Stopping → Stopped` lifecycle with exit codes
///
/// See [`screenrec_pipeline`] documentation for details.
#[cfg(feature = "pipeline")]
#[cfg_attr(docsrs, doc(cfg(feature = "pipeline")))]
pub use screenrec_pipeline as pipeline;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use screenrec::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "capture")]
    pub use screenrec_capture::{CaptureError, FrameSize, FrameSource, PixelLayout, RawFrame, SyntheticSource};

    #[cfg(feature = "transform")]
    pub use screenrec_transform::{FrameTransformer, Geometry, OutputFormat, Padding, TransformError, VideoFrameBuffer};

    #[cfg(feature = "pipeline")]
    pub use screenrec_pipeline::{
        AudioCapture, AudioConfig, BufferingMode, EncoderBackend, ExternalRecorder, FrameRate, Recorder,
        RecorderConfig, RecorderError, RecorderState, SessionOutcome, SinkTarget, StopHandle, Y4mBackend,
    };
}
