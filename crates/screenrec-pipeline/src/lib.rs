//! # screenrec-pipeline
//!
//! Paced screen capture, frame hand-off, encoding and audio interleaving for
//! a single recording session.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐ refresh  ┌──────────────────┐ render ┌──────────────────┐
//!  │ FrameSource  │◄─────────│     Recorder     │───────►│    FrameSink     │
//!  │ (capture)    │ RawFrame │ governor + state │        │ Encoder/External │
//!  └──────────────┘─────────►└──────────────────┘        └────────┬─────────┘
//!                                                                 │ packets
//!  ┌──────────────┐ samples  ┌──────────────────┐  drain  ┌────────▼─────────┐
//!  │ AudioCapture │─────────►│ AudioRingBuffer  │────────►│  EncoderBackend  │
//!  │ (callback)   │          │  (overwrite old) │         │  (one writer)    │
//!  └──────────────┘          └──────────────────┘         └──────────────────┘
//! ```
//!
//! # Threads
//!
//! - **Capture thread**: the caller of [`Recorder::step`] / [`Recorder::run`];
//!   waits only in the [`FrameGovernor`]
//! - **Encode thread**: [`BufferingMode::Double`] only; fed slot indices over a
//!   bounded channel of depth 2
//! - **Audio thread**: owned by the [`AudioCapture`] device; never blocks on
//!   anything but the ring buffer lock
//! - **Stop thread**: short-lived, finishes the sink while the capture thread
//!   keeps rendering
//!
//! # Errors
//!
//! The first fatal error stops the session and its
//! [`code`](RecorderError::code) becomes the [`SessionOutcome::exit_code`].
//! Audio codec failures and ring buffer overruns are logged and recording
//! continues. See [`error::codes`] for the numeric values.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use screenrec_capture::SyntheticSource;
//! use screenrec_pipeline::{FrameRate, Recorder, RecorderConfig, SinkTarget, Y4mBackend};
//! use screenrec_transform::OutputFormat;
//!
//! # fn main() -> Result<(), screenrec_pipeline::RecorderError> {
//! let config = RecorderConfig::builder()
//!     .frame_rate(FrameRate::Capped(30))
//!     .output_format(OutputFormat::Yuv420Planar)
//!     .build();
//!
//! let backend = Y4mBackend::create("capture.y4m")?;
//! let recorder = Recorder::setup(config, SyntheticSource::new(1280, 720), SinkTarget::encoder(backend), None)?;
//!
//! let stop = recorder.stop_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     stop.stop();
//! });
//!
//! let outcome = recorder.run();
//! std::process::exit(outcome.exit_code);
//! # }
//! ```
//!
//! # Cargo Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `y4m` | Yes | YUV4MPEG2 file backend |
//! | `test-util` | No | In-memory backend, manual audio device, mock external recorder |

#![cfg_attr(docsrs, feature(doc_cfg))]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod backend;
pub mod config;
pub mod error;
pub mod external;
pub mod governor;
pub mod pipeline;
pub mod recorder;
pub mod ring;
pub mod session;
pub mod sink;

// =============================================================================
// FEATURE MODULES
// =============================================================================

/// YUV4MPEG2 file output
///
/// Requires the `y4m` feature.
#[cfg(feature = "y4m")]
#[cfg_attr(docsrs, doc(cfg(feature = "y4m")))]
pub mod y4m;

/// Test doubles
///
/// Requires the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use backend::{
    AudioCallback, AudioCapture, AudioStream, AudioStreamParams, EncodePayload, EncoderBackend, Packet,
    StreamHandle, StreamKind, TimeBase, VideoStreamParams,
};
pub use config::{AudioConfig, BufferingMode, FrameRate, RecorderConfig, RecorderConfigBuilder};
pub use error::{codes, AudioError, BackendError, ErrorKind, RecorderError, Result};
pub use external::{ExternalRecorder, ExternalSink};
pub use governor::{FrameGovernor, PtsClock};
pub use pipeline::EncodePipeline;
pub use recorder::{Recorder, SinkTarget};
pub use ring::AudioRingBuffer;
pub use session::{RecorderState, SessionControl, SessionOutcome, SessionStats, StatsSnapshot, StopHandle};
pub use sink::FrameSink;

#[cfg(feature = "y4m")]
pub use y4m::Y4mBackend;

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
