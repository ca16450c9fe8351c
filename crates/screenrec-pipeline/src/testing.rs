//! Test doubles for recording sessions
//!
//! Available behind the `test-util` feature or in `#[cfg(test)]` within
//! screenrec-pipeline. Each double comes with a probe that stays usable after
//! the double itself has been moved into a recorder.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use screenrec_transform::VideoFrameBuffer;

use crate::backend::{
    AudioCallback, AudioCapture, AudioStream, AudioStreamParams, EncodePayload, EncoderBackend, Packet, StreamHandle,
    StreamKind, TimeBase, VideoStreamParams,
};
use crate::error::{AudioError, BackendError};
use crate::external::ExternalRecorder;

/// Default audio frame size of [`MemoryBackend`] (samples per channel)
pub const MEMORY_AUDIO_FRAME_SIZE: usize = 160;

/// Initialise a tracing subscriber for tests.
///
/// Respects the `RUST_LOG` environment variable, defaults to `debug`.
/// Uses `with_test_writer()` to integrate with `cargo test` output capture.
/// Safe to call multiple times; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Everything a [`MemoryBackend`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct Recording {
    /// Parameters of the opened video stream
    pub video_params: Option<VideoStreamParams>,
    /// Parameters of the opened audio stream
    pub audio_params: Option<AudioStreamParams>,
    /// Header written
    pub started: bool,
    /// Trailer written
    pub finalized: bool,
    /// Output released
    pub closed: bool,
    /// Written packets in write order
    pub packets: Vec<(StreamKind, i64)>,
    /// Samples received across all audio packets
    pub audio_samples: usize,
    /// Copy of the last video frame submitted
    pub last_frame: Option<VideoFrameBuffer>,
}

impl Recording {
    /// Video pts in write order
    #[must_use]
    pub fn video_pts(&self) -> Vec<i64> {
        self.pts_of(StreamKind::Video)
    }

    /// Audio pts in write order
    #[must_use]
    pub fn audio_pts(&self) -> Vec<i64> {
        self.pts_of(StreamKind::Audio)
    }

    fn pts_of(&self, kind: StreamKind) -> Vec<i64> {
        self.packets
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, pts)| *pts)
            .collect()
    }
}

/// Shared view of a [`MemoryBackend`]'s output
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput(Arc<Mutex<Recording>>);

impl MemoryOutput {
    /// Copy of the recording so far
    #[must_use]
    pub fn snapshot(&self) -> Recording {
        self.0.lock().clone()
    }

    /// Number of video packets written
    #[must_use]
    pub fn video_frames(&self) -> usize {
        self.0.lock().packets.iter().filter(|(k, _)| *k == StreamKind::Video).count()
    }
}

/// Backend that records packets in memory
///
/// Video uses a millisecond time base, audio `1 / sample_rate`.
#[derive(Debug)]
pub struct MemoryBackend {
    output: MemoryOutput,
    encode_delay: Option<Duration>,
    fail_video_at: Option<usize>,
    fail_audio_at: Option<usize>,
    fail_video_stream: bool,
    fail_start: bool,
    audio_enabled: bool,
    audio_frame_size: usize,
    video_calls: usize,
    audio_calls: usize,
}

impl MemoryBackend {
    /// Create a backend and a probe onto its output
    #[must_use]
    pub fn new() -> (Self, MemoryOutput) {
        let output = MemoryOutput::default();
        let backend = Self {
            output: output.clone(),
            encode_delay: None,
            fail_video_at: None,
            fail_audio_at: None,
            fail_video_stream: false,
            fail_start: false,
            audio_enabled: true,
            audio_frame_size: MEMORY_AUDIO_FRAME_SIZE,
            video_calls: 0,
            audio_calls: 0,
        };
        (backend, output)
    }

    /// Sleep this long in every video encode call
    #[must_use]
    pub fn with_encode_delay(mut self, delay: Duration) -> Self {
        self.encode_delay = Some(delay);
        self
    }

    /// Fail the video encode call with this zero-based index
    #[must_use]
    pub fn failing_video_at(mut self, call: usize) -> Self {
        self.fail_video_at = Some(call);
        self
    }

    /// Fail the audio encode call with this zero-based index
    #[must_use]
    pub fn failing_audio_at(mut self, call: usize) -> Self {
        self.fail_audio_at = Some(call);
        self
    }

    /// Refuse to open the video stream
    #[must_use]
    pub fn failing_video_stream(mut self) -> Self {
        self.fail_video_stream = true;
        self
    }

    /// Fail writing the header
    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Behave like a container without audio support
    #[must_use]
    pub fn without_audio(mut self) -> Self {
        self.audio_enabled = false;
        self
    }

    /// Samples per channel per audio encode call
    #[must_use]
    pub fn with_audio_frame_size(mut self, frame_size: usize) -> Self {
        self.audio_frame_size = frame_size;
        self
    }
}

impl EncoderBackend for MemoryBackend {
    fn open_video_stream(&mut self, params: &VideoStreamParams) -> Result<StreamHandle, BackendError> {
        if self.fail_video_stream {
            return Err(BackendError::stream_setup("video stream refused"));
        }
        self.output.0.lock().video_params = Some(*params);
        Ok(StreamHandle {
            index: 0,
            kind: StreamKind::Video,
            time_base: TimeBase::MILLIS,
        })
    }

    fn open_audio_stream(&mut self, params: &AudioStreamParams) -> Result<Option<AudioStream>, BackendError> {
        if !self.audio_enabled {
            return Ok(None);
        }
        self.output.0.lock().audio_params = Some(*params);
        Ok(Some(AudioStream {
            handle: StreamHandle {
                index: 1,
                kind: StreamKind::Audio,
                time_base: TimeBase::new(1, params.sample_rate),
            },
            frame_size: self.audio_frame_size,
        }))
    }

    fn start(&mut self) -> Result<(), BackendError> {
        if self.fail_start {
            return Err(BackendError::Header("header refused".to_string()));
        }
        self.output.0.lock().started = true;
        Ok(())
    }

    fn encode(
        &mut self,
        stream: &StreamHandle,
        payload: EncodePayload<'_>,
        pts: i64,
    ) -> Result<Option<Packet>, BackendError> {
        match payload {
            EncodePayload::Video(frame) => {
                let call = self.video_calls;
                self.video_calls += 1;
                if let Some(delay) = self.encode_delay {
                    std::thread::sleep(delay);
                }
                if self.fail_video_at == Some(call) {
                    return Err(BackendError::encode(format!("video encode {} refused", call)));
                }
                self.output.0.lock().last_frame = Some(frame.clone());
                Ok(Some(Packet {
                    stream: stream.index,
                    pts,
                    data: frame.luma().iter().take(16).copied().collect(),
                }))
            }
            EncodePayload::Audio(samples) => {
                let call = self.audio_calls;
                self.audio_calls += 1;
                if self.fail_audio_at == Some(call) {
                    return Err(BackendError::encode(format!("audio encode {} refused", call)));
                }
                self.output.0.lock().audio_samples += samples.len();
                Ok(Some(Packet {
                    stream: stream.index,
                    pts,
                    data: Vec::new(),
                }))
            }
        }
    }

    fn write_packet(&mut self, packet: Packet) -> Result<(), BackendError> {
        let kind = if packet.stream == 0 {
            StreamKind::Video
        } else {
            StreamKind::Audio
        };
        self.output.0.lock().packets.push((kind, packet.pts));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), BackendError> {
        self.output.0.lock().finalized = true;
        Ok(())
    }

    fn close(&mut self) {
        self.output.0.lock().closed = true;
    }
}

type SharedCallback = Arc<Mutex<Option<AudioCallback>>>;

/// Audio device driven by hand from the test
pub struct ManualAudioCapture {
    callback: SharedCallback,
    fail_start: bool,
}

/// Pushes samples into a started [`ManualAudioCapture`]
#[derive(Clone)]
pub struct AudioFeeder {
    callback: SharedCallback,
}

impl ManualAudioCapture {
    /// Create a device and its feeder
    #[must_use]
    pub fn new() -> (Self, AudioFeeder) {
        let callback: SharedCallback = Arc::default();
        (
            Self {
                callback: Arc::clone(&callback),
                fail_start: false,
            },
            AudioFeeder { callback },
        )
    }

    /// Refuse to start
    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

impl AudioCapture for ManualAudioCapture {
    fn start(&mut self, sample_rate: u32, channels: u16, callback: AudioCallback) -> Result<(), AudioError> {
        if self.fail_start {
            return Err(AudioError::StartFailed(format!("{} Hz x{} refused", sample_rate, channels)));
        }
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn stop(&mut self) {
        self.callback.lock().take();
    }
}

impl AudioFeeder {
    /// Deliver samples; `false` when the device is not running
    pub fn push(&self, samples: &[f32]) -> bool {
        match self.callback.lock().as_mut() {
            Some(callback) => {
                callback(samples);
                true
            }
            None => false,
        }
    }

    /// `true` between start and stop
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.callback.lock().is_some()
    }
}

#[derive(Debug, Default)]
struct ExternalState {
    attempts: u64,
    submitted: u64,
    stop_requested_at: Option<u64>,
    stopped: bool,
    pts: Vec<i64>,
}

type SharedExternal = Arc<(Mutex<ExternalState>, Condvar)>;

/// External recorder whose `stop()` needs more frames before it returns
pub struct MockExternalRecorder {
    state: SharedExternal,
    frames_to_stop: u64,
    reject_at: Option<u64>,
    stop_timeout: Duration,
}

/// Read access to a [`MockExternalRecorder`]
#[derive(Clone)]
pub struct ExternalProbe {
    state: SharedExternal,
}

impl MockExternalRecorder {
    /// Recorder whose stop returns after `frames_to_stop` further frames
    #[must_use]
    pub fn new(frames_to_stop: u64) -> (Self, ExternalProbe) {
        let state: SharedExternal = Arc::default();
        (
            Self {
                state: Arc::clone(&state),
                frames_to_stop,
                reject_at: None,
                stop_timeout: Duration::from_secs(5),
            },
            ExternalProbe { state },
        )
    }

    /// Reject the submission attempt with this zero-based index
    ///
    /// Later frames are accepted again.
    #[must_use]
    pub fn rejecting_at(mut self, frame: u64) -> Self {
        self.reject_at = Some(frame);
        self
    }

    /// Give up stopping after this long
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}

impl ExternalRecorder for MockExternalRecorder {
    fn submit(&self, frame: &VideoFrameBuffer) -> Result<(), BackendError> {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        let attempt = state.attempts;
        state.attempts += 1;
        if self.reject_at == Some(attempt) {
            return Err(BackendError::encode("frame rejected"));
        }
        state.submitted += 1;
        state.pts.push(frame.pts());
        cvar.notify_all();
        Ok(())
    }

    fn stop(&self) -> Result<(), BackendError> {
        let (lock, cvar) = &*self.state;
        let deadline = Instant::now() + self.stop_timeout;
        let mut state = lock.lock();
        let requested_at = state.submitted;
        let target = requested_at.saturating_add(self.frames_to_stop);
        state.stop_requested_at = Some(requested_at);

        while state.submitted < target {
            if cvar.wait_until(&mut state, deadline).timed_out() {
                return Err(BackendError::finalize(format!(
                    "stop timed out after {} of {} frames",
                    state.submitted - requested_at,
                    self.frames_to_stop
                )));
            }
        }
        state.stopped = true;
        Ok(())
    }
}

impl ExternalProbe {
    /// Frames accepted so far
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.state.0.lock().submitted
    }

    /// Frames accepted after `stop()` was called
    #[must_use]
    pub fn frames_after_stop(&self) -> u64 {
        let state = self.state.0.lock();
        state.stop_requested_at.map_or(0, |at| state.submitted - at)
    }

    /// `true` once `stop()` completed
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.0.lock().stopped
    }

    /// Pts of every accepted frame
    #[must_use]
    pub fn pts(&self) -> Vec<i64> {
        self.state.0.lock().pts.clone()
    }
}
