//! Recording session lifecycle
//!
//! A [`Recorder`] owns one capture source and one frame sink for the whole
//! session:
//!
//! ```text
//! Init ──setup ok──► Capturing ──stop / fault / max duration──► Stopping ──teardown──► Stopped
//!   └──────────────── setup failure ───────────────────────────────┘
//! ```
//!
//! # Teardown
//!
//! 1. Stop feeding new frames and stop the audio device
//! 2. Finish the sink (join the encode thread, flush audio, write the trailer)
//! 3. Release the capture source
//! 4. Release the audio ring buffer
//!
//! When the sink finishes asynchronously, step 2 runs on its own thread while
//! the calling thread keeps capturing and rendering: a recorder may need more
//! frames before its stop call returns.
//!
//! # Examples
//!
//! ```rust
//! use screenrec_capture::SyntheticSource;
//! use screenrec_pipeline::testing::MemoryBackend;
//! use screenrec_pipeline::{BufferingMode, FrameRate, Recorder, RecorderConfig, SinkTarget};
//!
//! # fn main() -> Result<(), screenrec_pipeline::RecorderError> {
//! let config = RecorderConfig::builder()
//!     .frame_rate(FrameRate::Uncapped)
//!     .buffering(BufferingMode::Single)
//!     .build();
//! let (backend, output) = MemoryBackend::new();
//!
//! let mut recorder = Recorder::setup(config, SyntheticSource::new(64, 48), SinkTarget::encoder(backend), None)?;
//! for _ in 0..3 {
//!     recorder.step();
//! }
//! let outcome = recorder.finish();
//!
//! assert!(outcome.is_clean());
//! assert_eq!(output.video_frames(), 3);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use screenrec_capture::{CaptureError, FrameSize, FrameSource};
use screenrec_transform::{FrameTransformer, Geometry};
use tracing::{debug, error, info, warn};

use crate::backend::{AudioCapture, EncoderBackend};
use crate::config::RecorderConfig;
use crate::error::{codes, AudioError, BackendError, RecorderError, Result};
use crate::external::{ExternalRecorder, ExternalSink};
use crate::governor::FrameGovernor;
use crate::pipeline::EncodePipeline;
use crate::ring::AudioRingBuffer;
use crate::session::{RecorderState, SessionControl, SessionOutcome, SessionStats, StatsSnapshot, StopHandle};
use crate::sink::FrameSink;

/// Pause after a failed render while finishing without a frame governor
const FINISH_FAULT_BACKOFF: Duration = Duration::from_millis(5);

/// Where captured frames end up
pub enum SinkTarget {
    /// Encode and mux through a backend
    Encoder(Box<dyn EncoderBackend>),
    /// Push transformed frames into a recorder with its own codec
    External(Box<dyn ExternalRecorder>),
}

impl SinkTarget {
    /// Encode through `backend`
    pub fn encoder(backend: impl EncoderBackend + 'static) -> Self {
        Self::Encoder(Box::new(backend))
    }

    /// Feed `recorder`
    pub fn external(recorder: impl ExternalRecorder + 'static) -> Self {
        Self::External(Box::new(recorder))
    }
}

/// Capture side of the session: source, pacing and error tolerance
struct CaptureLoop<S> {
    source: S,
    governor: FrameGovernor,
    requested: FrameSize,
    max_errors: u32,
    consecutive_errors: u32,
    stats: Arc<SessionStats>,
}

impl<S: FrameSource> CaptureLoop<S> {
    /// Wait for the next tick and return its time since `started`
    fn next_tick(&mut self, started: Instant) -> Duration {
        self.governor.wait().saturating_duration_since(started)
    }

    /// Refresh the source and hand the frame to `sink`
    ///
    /// Isolated refresh failures are skipped; more than `max_errors` in a row
    /// are reported as a capture fault.
    fn capture(&mut self, sink: &FrameSink, elapsed: Duration) -> Result<()> {
        if let Err(e) = self.source.refresh(self.requested) {
            SessionStats::bump(&self.stats.capture_errors);
            self.consecutive_errors += 1;
            if self.consecutive_errors > self.max_errors {
                return Err(RecorderError::Capture(e));
            }
            warn!(
                "Capture refresh failed ({} in a row): {}",
                self.consecutive_errors, e
            );
            return Ok(());
        }
        self.consecutive_errors = 0;

        match self.source.current_frame() {
            Some(frame) => sink.render(&frame, elapsed),
            None => {
                debug!("Source refreshed without a frame");
                Ok(())
            }
        }
    }
}

/// A recording session
pub struct Recorder<S: FrameSource> {
    config: Arc<RecorderConfig>,
    capture: CaptureLoop<S>,
    sink: FrameSink,
    geometry: Geometry,
    audio_device: Option<Box<dyn AudioCapture>>,
    ring: Option<Arc<AudioRingBuffer>>,
    control: Arc<SessionControl>,
    stats: Arc<SessionStats>,
    started: Instant,
}

impl<S: FrameSource> Recorder<S> {
    /// Build every session resource and start capturing
    ///
    /// On failure everything already acquired is released again and the
    /// error's [`code`](RecorderError::code) is the session's exit code.
    pub fn setup(
        config: RecorderConfig,
        mut source: S,
        target: SinkTarget,
        audio_device: Option<Box<dyn AudioCapture>>,
    ) -> Result<Self> {
        let control = Arc::new(SessionControl::new());
        let stats = Arc::new(SessionStats::default());
        let config = Arc::new(config);

        let prepared = prepare(&config, &mut source, target, audio_device, &control, &stats);
        let (requested, geometry, sink, ring, audio_device) = match prepared {
            Ok(parts) => parts,
            Err(e) => {
                error!("Recorder setup failed: {} (code {})", e, e.code());
                control.request_stop(e.code());
                source.release();
                control.mark_stopped();
                return Err(e);
            }
        };

        control.mark_capturing();
        info!(
            "Recording {}x{} into {} sink at {:?} per frame",
            geometry.video().width,
            geometry.video().height,
            sink.name(),
            config.frame_rate.interval()
        );

        Ok(Self {
            capture: CaptureLoop {
                source,
                governor: FrameGovernor::new(config.frame_rate),
                requested,
                max_errors: config.max_capture_errors,
                consecutive_errors: 0,
                stats: Arc::clone(&stats),
            },
            config,
            sink,
            geometry,
            audio_device,
            ring,
            control,
            stats,
            started: Instant::now(),
        })
    }

    /// Handle for stopping the session from another thread
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.control))
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> RecorderState {
        self.control.state()
    }

    /// Resolved output geometry
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// `true` when an audio track is being recorded
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.ring.is_some()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one governor tick: wait, capture, render
    ///
    /// Returns `false` once the session has left `Capturing`.
    pub fn step(&mut self) -> bool {
        if !self.control.is_capturing() {
            return false;
        }

        let elapsed = self.capture.next_tick(self.started);
        if let Some(limit) = self.config.max_duration {
            if elapsed >= limit {
                info!("Maximum duration {:?} reached", limit);
                self.control.request_stop(codes::MAX_DURATION);
                return false;
            }
        }

        if let Err(e) = self.capture.capture(&self.sink, elapsed) {
            if e.kind().is_fatal() {
                error!("{} (code {})", e, e.code());
                self.control.request_stop(e.code());
            } else {
                warn!("{}", e);
            }
        }

        self.control.is_capturing()
    }

    /// Capture until stopped, then tear down
    pub fn run(mut self) -> SessionOutcome {
        while self.step() {}
        self.finish()
    }

    /// Stop (if still capturing) and tear the session down
    pub fn finish(mut self) -> SessionOutcome {
        self.control.request_stop(codes::CLEAN);
        if let Some(device) = self.audio_device.as_mut() {
            device.stop();
        }

        let finished = if self.sink.finishes_async() {
            self.finish_while_rendering()
        } else {
            self.sink.finish()
        };
        if let Err(e) = finished {
            error!("Finishing {} sink failed: {} (code {})", self.sink.name(), e, e.code());
            self.control.request_stop(e.code());
        }

        self.capture.source.release();
        if let Some(ring) = self.ring.take() {
            self.stats
                .audio_overruns
                .store(ring.overruns(), Ordering::Relaxed);
        }
        self.control.mark_stopped();

        let outcome = SessionOutcome {
            exit_code: self.control.error_code(),
            stats: self.stats.snapshot(),
            duration: self.started.elapsed(),
        };
        match outcome.fps() {
            Some(fps) => info!(
                "Recording stopped with code {}: {} frames in {:?} ({:.1} fps), {} dropped",
                outcome.exit_code,
                outcome.stats.frames_rendered,
                outcome.duration,
                fps,
                outcome.stats.frames_dropped
            ),
            None => info!("Recording stopped with code {}", outcome.exit_code),
        }
        outcome
    }

    /// Finish the sink on a helper thread while this thread keeps rendering
    ///
    /// Render faults are recorded as the exit code; rendering continues until
    /// the sink is done.
    fn finish_while_rendering(&mut self) -> Result<()> {
        let done = AtomicBool::new(false);
        let sink = &self.sink;
        let capture = &mut self.capture;
        let control = &self.control;
        let started = self.started;

        std::thread::scope(|scope| {
            let spawned = std::thread::Builder::new()
                .name("screenrec-stop".to_string())
                .spawn_scoped(scope, || {
                    let result = sink.finish();
                    done.store(true, Ordering::Release);
                    result
                });

            let finisher = match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    warn!("Can't create stop thread ({}), finishing inline", e);
                    return sink.finish();
                }
            };

            let mut rendered = 0u64;
            let mut failed = 0u64;
            while !done.load(Ordering::Acquire) {
                let elapsed = capture.next_tick(started);
                match capture.capture(sink, elapsed) {
                    Ok(()) => rendered += 1,
                    Err(e) => {
                        if failed == 0 {
                            error!("Rendering while finishing failed: {} (code {})", e, e.code());
                        }
                        failed += 1;
                        if e.kind().is_fatal() {
                            control.request_stop(e.code());
                        }
                        if capture.governor.interval().is_none() {
                            std::thread::sleep(FINISH_FAULT_BACKOFF);
                        }
                    }
                }
            }
            debug!("Rendered {} frames while finishing, {} failed", rendered, failed);

            finisher
                .join()
                .unwrap_or_else(|_| Err(RecorderError::Container(BackendError::finalize("stop thread panicked"))))
        })
    }
}

type Prepared = (
    FrameSize,
    Geometry,
    FrameSink,
    Option<Arc<AudioRingBuffer>>,
    Option<Box<dyn AudioCapture>>,
);

fn prepare<S: FrameSource>(
    config: &RecorderConfig,
    source: &mut S,
    target: SinkTarget,
    audio_device: Option<Box<dyn AudioCapture>>,
    control: &Arc<SessionControl>,
    stats: &Arc<SessionStats>,
) -> Result<Prepared> {
    config.validate().map_err(RecorderError::InvalidConfig)?;

    let requested = match source.native_size() {
        Some(native) => config.requested_size.oriented_like(native),
        None => config.requested_size,
    };
    source.refresh(requested).map_err(RecorderError::SourceOpen)?;
    let input = source
        .current_frame()
        .map(|frame| FrameSize::new(frame.width(), frame.height()))
        .ok_or_else(|| RecorderError::SourceOpen(CaptureError::RefreshFailed("no frame after first refresh".to_string())))?;
    debug!("Source delivers {}x{} (requested {}x{})", input.width, input.height, requested.width, requested.height);

    let geometry = Geometry::resolve(
        input,
        config.padding,
        config.rotation_degrees,
        config.allow_vertical_frames,
    )?;
    let transformer = FrameTransformer::new(geometry, config.output_format)?;

    match target {
        SinkTarget::Encoder(backend) => {
            let (ring, device) = match (config.audio, audio_device) {
                (Some(audio), Some(device)) => (
                    Some(Arc::new(AudioRingBuffer::for_sample_rate(
                        audio.effective_sample_rate(),
                        audio.channels,
                    ))),
                    Some(device),
                ),
                (Some(_), None) => {
                    return Err(RecorderError::AudioStart(AudioError::DeviceUnavailable(
                        "audio enabled without a capture device".to_string(),
                    )));
                }
                (None, device) => {
                    if device.is_some() {
                        debug!("Audio disabled, ignoring capture device");
                    }
                    (None, None)
                }
            };

            let pipeline = EncodePipeline::open(
                backend,
                transformer,
                config,
                ring.clone(),
                Arc::clone(control),
                Arc::clone(stats),
            )?;
            let sink = FrameSink::Encoder(pipeline);

            let (ring, device) = if sink_has_audio(&sink) { (ring, device) } else { (None, None) };
            let device = match (ring.as_ref(), device) {
                (Some(ring), Some(device)) => Some(start_audio(config, ring, device, &sink)?),
                _ => None,
            };
            Ok((requested, geometry, sink, ring, device))
        }
        SinkTarget::External(recorder) => {
            if audio_device.is_some() {
                debug!("External recorder captures its own audio, ignoring capture device");
            }
            let sink = FrameSink::External(ExternalSink::new(recorder, transformer, Arc::clone(stats))?);
            Ok((requested, geometry, sink, None, None))
        }
    }
}

fn sink_has_audio(sink: &FrameSink) -> bool {
    match sink {
        FrameSink::Encoder(pipeline) => pipeline.has_audio(),
        FrameSink::External(_) => false,
    }
}

/// Start `device` feeding `ring`; finishes `sink` again when it refuses
fn start_audio(
    config: &RecorderConfig,
    ring: &Arc<AudioRingBuffer>,
    mut device: Box<dyn AudioCapture>,
    sink: &FrameSink,
) -> Result<Box<dyn AudioCapture>> {
    let Some(audio) = config.audio else {
        return Ok(device);
    };

    let writer = Arc::clone(ring);
    let started = device.start(
        audio.effective_sample_rate(),
        audio.channels,
        Box::new(move |samples: &[f32]| {
            writer.write(samples);
        }),
    );

    match started {
        Ok(()) => {
            info!("Audio capture started: {} Hz, {} channel(s)", audio.effective_sample_rate(), audio.channels);
            Ok(device)
        }
        Err(e) => {
            if let Err(finish_err) = sink.finish() {
                warn!("Error closing output after audio failure: {}", finish_err);
            }
            Err(e.into())
        }
    }
}
