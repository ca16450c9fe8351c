//! Frame sinks
//!
//! The capture loop hands every frame to exactly one sink, chosen at setup.

use std::time::Duration;

use screenrec_capture::RawFrame;

use crate::error::Result;
use crate::external::ExternalSink;
use crate::pipeline::EncodePipeline;

/// Destination of captured frames
pub enum FrameSink {
    /// Own encoder and container writer
    Encoder(EncodePipeline),
    /// Recorder with its own compression pipeline
    External(ExternalSink),
}

impl FrameSink {
    /// Submit the frame captured `elapsed` after session start
    pub fn render(&self, frame: &RawFrame<'_>, elapsed: Duration) -> Result<()> {
        match self {
            Self::Encoder(pipeline) => pipeline.render(frame, elapsed),
            Self::External(sink) => sink.render(frame, elapsed),
        }
    }

    /// Flush and close the output
    pub fn finish(&self) -> Result<()> {
        match self {
            Self::Encoder(pipeline) => pipeline.finish(),
            Self::External(sink) => sink.finish(),
        }
    }

    /// `true` when `finish` must run beside a live render loop
    #[must_use]
    pub const fn finishes_async(&self) -> bool {
        match self {
            Self::Encoder(pipeline) => pipeline.is_threaded(),
            Self::External(_) => true,
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Encoder(_) => "encoder",
            Self::External(_) => "external",
        }
    }
}
