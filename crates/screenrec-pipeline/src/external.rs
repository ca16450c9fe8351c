//! Sink for recorders that own their compression pipeline
//!
//! Some platforms expose a complete recorder (encoder, muxer and audio) that
//! only wants raw frames pushed into it. Its `stop()` typically blocks until
//! it has consumed a few more frames, so it must be called while the capture
//! loop keeps rendering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use screenrec_capture::RawFrame;
use screenrec_transform::{FrameTransformer, VideoFrameBuffer};
use tracing::{debug, info};

use crate::backend::TimeBase;
use crate::error::{BackendError, RecorderError, Result};
use crate::governor::PtsClock;
use crate::session::SessionStats;

/// A recorder accepting transformed frames
///
/// `submit` and `stop` are called from different threads during shutdown.
pub trait ExternalRecorder: Send + Sync {
    /// Push one frame; its pts is in milliseconds since session start
    fn submit(&self, frame: &VideoFrameBuffer) -> std::result::Result<(), BackendError>;

    /// Finish the recording, blocking until the output is complete
    fn stop(&self) -> std::result::Result<(), BackendError>;
}

/// Frame sink feeding an [`ExternalRecorder`]
pub struct ExternalSink {
    recorder: Box<dyn ExternalRecorder>,
    transformer: FrameTransformer,
    buffer: Mutex<VideoFrameBuffer>,
    clock: PtsClock,
    stats: Arc<SessionStats>,
    stopped: AtomicBool,
}

impl ExternalSink {
    /// Wrap `recorder`, allocating one frame buffer
    pub fn new(
        recorder: Box<dyn ExternalRecorder>,
        transformer: FrameTransformer,
        stats: Arc<SessionStats>,
    ) -> Result<Self> {
        let buffer = transformer.allocate()?;
        info!("External recorder sink ready ({}x{})", buffer.width(), buffer.height());
        Ok(Self {
            recorder,
            transformer,
            buffer: Mutex::new(buffer),
            clock: PtsClock::new(TimeBase::MILLIS),
            stats,
            stopped: AtomicBool::new(false),
        })
    }

    /// Transform and push a frame
    pub fn render(&self, frame: &RawFrame<'_>, elapsed: Duration) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut buffer = self.buffer.lock();
        self.transformer.transform(frame, &mut buffer)?;
        buffer.set_pts(self.clock.stamp(elapsed));
        SessionStats::bump(&self.stats.frames_rendered);

        self.recorder.submit(&buffer).map_err(RecorderError::ExternalRecorder)?;
        SessionStats::bump(&self.stats.frames_encoded);
        Ok(())
    }

    /// Stop the recorder; keeps accepting frames until it returns
    pub fn finish(&self) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }
        debug!("Stopping external recorder");
        let result = self.recorder.stop().map_err(RecorderError::ExternalRecorder);
        self.stopped.store(true, Ordering::Release);
        info!("External recorder stopped");
        result
    }
}
