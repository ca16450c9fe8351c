//! Encode pipeline
//!
//! Turns transformed frames and buffered audio into timestamped packets.
//!
//! # Buffering
//!
//! ```text
//!  capture thread                         encode thread
//!  ──────────────                         ─────────────
//!  render(frame)
//!    claim Free slot ──► transform ──► Queued ──sync_channel(2)──► Encoding
//!    (no Free slot: drop frame)                                    encode + write
//!                                                                  drain audio
//!                                                                  Free
//! ```
//!
//! In [`BufferingMode::Single`] the transform, encode and write all happen on
//! the capture thread. In [`BufferingMode::Double`] the producer never waits
//! for the encoder: it only holds short slot-state locks.
//!
//! All backend calls go through one mutex, so video and audio packets are
//! written by whichever thread holds it, never concurrently.
//!
//! # Audio interleave
//!
//! After each video frame, audio frames are drained from the ring buffer
//! while the audio timeline lags the last video timestamp and a full codec
//! frame is buffered. A failed audio encode drops that frame's samples and
//! recording continues.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use screenrec_capture::RawFrame;
use screenrec_transform::{FrameTransformer, VideoFrameBuffer};
use tracing::{debug, error, info, warn};

use crate::backend::{
    AudioStream, AudioStreamParams, EncodePayload, EncoderBackend, StreamHandle, TimeBase, VideoStreamParams,
};
use crate::config::{BufferingMode, RecorderConfig};
use crate::error::{RecorderError, Result};
use crate::governor::PtsClock;
use crate::ring::AudioRingBuffer;
use crate::session::{SessionControl, SessionStats};

/// Pending hand-offs between producer and encode thread
const HANDOFF_DEPTH: usize = 2;

struct AudioTrack {
    stream: AudioStream,
    ring: Arc<AudioRingBuffer>,
    scratch: Vec<f32>,
    sample_rate: u32,
    samples_encoded: u64,
}

impl AudioTrack {
    /// Timestamp of the next audio frame in the stream time base
    fn next_pts(&self) -> i64 {
        let base = self.stream.handle.time_base;
        let ticks = u128::from(self.samples_encoded) * u128::from(base.den)
            / (u128::from(base.num.max(1)) * u128::from(self.sample_rate.max(1)));
        i64::try_from(ticks).unwrap_or(i64::MAX)
    }
}

/// Backend plus per-stream state; always used under one mutex
struct EncoderCore {
    backend: Box<dyn EncoderBackend>,
    video: StreamHandle,
    audio: Option<AudioTrack>,
    last_video_pts: Option<i64>,
    stats: Arc<SessionStats>,
}

impl EncoderCore {
    fn encode_video(&mut self, frame: &VideoFrameBuffer) -> Result<()> {
        let pts = frame.pts();
        let packet = self
            .backend
            .encode(&self.video, EncodePayload::Video(frame), pts)
            .map_err(RecorderError::VideoEncode)?;
        if let Some(packet) = packet {
            self.backend.write_packet(packet).map_err(RecorderError::VideoEncode)?;
        }

        self.last_video_pts = Some(pts);
        SessionStats::bump(&self.stats.frames_encoded);
        self.drain_audio(false);
        Ok(())
    }

    /// Encode buffered audio frames
    ///
    /// Without `flush`, stops as soon as audio catches up with video.
    fn drain_audio(&mut self, flush: bool) {
        let Some(track) = self.audio.as_mut() else {
            return;
        };

        loop {
            if !flush {
                let Some(video_pts) = self.last_video_pts else {
                    break;
                };
                let order = TimeBase::compare(
                    track.next_pts(),
                    track.stream.handle.time_base,
                    video_pts,
                    self.video.time_base,
                );
                if order != CmpOrdering::Less {
                    break;
                }
            }

            if !track.ring.read_exact(&mut track.scratch) {
                break;
            }

            let pts = track.next_pts();
            track.samples_encoded += track.stream.frame_size as u64;

            let written = self
                .backend
                .encode(&track.stream.handle, EncodePayload::Audio(&track.scratch), pts)
                .and_then(|packet| match packet {
                    Some(packet) => self.backend.write_packet(packet),
                    None => Ok(()),
                });

            match written {
                Ok(()) => SessionStats::bump(&self.stats.audio_frames),
                Err(e) => {
                    let err = RecorderError::AudioEncode(e);
                    warn!("{} (code {}), dropping {} samples", err, err.code(), track.scratch.len());
                }
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.drain_audio(true);
        let result = self.backend.finalize().map_err(RecorderError::Container);
        self.backend.close();
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Filling,
    Queued,
    Encoding,
}

struct FrameSlots {
    buffers: [Mutex<VideoFrameBuffer>; 2],
    states: Mutex<[SlotState; 2]>,
}

impl FrameSlots {
    fn claim(&self) -> Option<usize> {
        let mut states = self.states.lock();
        let index = states.iter().position(|s| *s == SlotState::Free)?;
        states[index] = SlotState::Filling;
        Some(index)
    }

    fn set(&self, index: usize, state: SlotState) {
        self.states.lock()[index] = state;
    }
}

struct Threaded {
    slots: Arc<FrameSlots>,
    sender: Mutex<Option<SyncSender<usize>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

enum Handoff {
    Inline(Mutex<VideoFrameBuffer>),
    Threaded(Threaded),
}

/// Video/audio encoding front end of a recording session
pub struct EncodePipeline {
    transformer: FrameTransformer,
    clock: PtsClock,
    core: Arc<Mutex<EncoderCore>>,
    handoff: Handoff,
    stats: Arc<SessionStats>,
    accepting: AtomicBool,
    finished: AtomicBool,
    has_audio: bool,
}

impl EncodePipeline {
    /// Open streams on `backend`, write the header and start encoding
    ///
    /// `ring` enables the audio track; it is dropped when the backend has no
    /// audio stream to offer. The backend is closed again if setup fails.
    pub fn open(
        mut backend: Box<dyn EncoderBackend>,
        transformer: FrameTransformer,
        config: &RecorderConfig,
        ring: Option<Arc<AudioRingBuffer>>,
        control: Arc<SessionControl>,
        stats: Arc<SessionStats>,
    ) -> Result<Self> {
        let (video, audio) = match open_streams(backend.as_mut(), &transformer, config, ring) {
            Ok(streams) => streams,
            Err(e) => {
                backend.close();
                return Err(e);
            }
        };

        let has_audio = audio.is_some();
        let core = Arc::new(Mutex::new(EncoderCore {
            backend,
            video,
            audio,
            last_video_pts: None,
            stats: Arc::clone(&stats),
        }));

        let handoff = match config.buffering {
            BufferingMode::Single => Handoff::Inline(Mutex::new(transformer.allocate()?)),
            BufferingMode::Double => spawn_encoder(&transformer, &core, control)?,
        };

        info!(
            "Encode pipeline ready: {} buffering, audio {}",
            match handoff {
                Handoff::Inline(_) => "single",
                Handoff::Threaded(_) => "double",
            },
            if has_audio { "on" } else { "off" }
        );

        Ok(Self {
            clock: PtsClock::new(video.time_base),
            transformer,
            core,
            handoff,
            stats,
            accepting: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            has_audio,
        })
    }

    /// `true` when an audio stream is being written
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.has_audio
    }

    /// `true` when frames are encoded on a dedicated thread
    #[must_use]
    pub const fn is_threaded(&self) -> bool {
        matches!(self.handoff, Handoff::Threaded(_))
    }

    /// Submit the frame captured `elapsed` after session start
    ///
    /// In double-buffer mode this never waits for the encoder; when both
    /// slots are busy the frame is dropped and counted.
    pub fn render(&self, frame: &RawFrame<'_>, elapsed: Duration) -> Result<()> {
        if !self.accepting.load(Ordering::Acquire) {
            return Ok(());
        }
        SessionStats::bump(&self.stats.frames_rendered);
        let pts = self.clock.stamp(elapsed);

        match &self.handoff {
            Handoff::Inline(buffer) => {
                let mut buffer = buffer.lock();
                self.transformer.transform(frame, &mut buffer)?;
                buffer.set_pts(pts);
                self.core.lock().encode_video(&buffer)
            }
            Handoff::Threaded(threaded) => self.submit(threaded, frame, pts),
        }
    }

    fn submit(&self, threaded: &Threaded, frame: &RawFrame<'_>, pts: i64) -> Result<()> {
        let Some(index) = threaded.slots.claim() else {
            debug!("Both frame slots busy, dropping frame at pts {}", pts);
            SessionStats::bump(&self.stats.frames_dropped);
            return Ok(());
        };

        {
            let mut buffer = threaded.slots.buffers[index].lock();
            if let Err(e) = self.transformer.transform(frame, &mut buffer) {
                threaded.slots.set(index, SlotState::Free);
                return Err(e.into());
            }
            buffer.set_pts(pts);
        }

        threaded.slots.set(index, SlotState::Queued);
        let sent = threaded.sender.lock().as_ref().map(|tx| tx.try_send(index));
        match sent {
            Some(Ok(())) => Ok(()),
            Some(Err(TrySendError::Full(_) | TrySendError::Disconnected(_))) | None => {
                threaded.slots.set(index, SlotState::Free);
                SessionStats::bump(&self.stats.frames_dropped);
                Ok(())
            }
        }
    }

    /// Stop accepting frames, drain the encode thread and finalize the output
    ///
    /// Only the first call does anything.
    pub fn finish(&self) -> Result<()> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.accepting.store(false, Ordering::Release);
        info!("Finishing encode pipeline");

        if let Handoff::Threaded(threaded) = &self.handoff {
            drop(threaded.sender.lock().take());
            if let Some(worker) = threaded.worker.lock().take() {
                if worker.join().is_err() {
                    error!("Encode thread panicked");
                }
            }
        }

        let result = self.core.lock().finish();
        info!("Encode pipeline finished");
        result
    }
}

impl Drop for EncodePipeline {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Error finishing encode pipeline on drop: {}", e);
        }
    }
}

fn open_streams(
    backend: &mut dyn EncoderBackend,
    transformer: &FrameTransformer,
    config: &RecorderConfig,
    ring: Option<Arc<AudioRingBuffer>>,
) -> Result<(StreamHandle, Option<AudioTrack>)> {
    let geometry = transformer.geometry();
    let params = VideoStreamParams {
        width: geometry.video().width,
        height: geometry.video().height,
        format: transformer.format(),
        bitrate: config.effective_video_bitrate(),
        frame_rate: (config.frame_rate.nominal_fps(), 1),
        rotation_degrees: geometry.stream_rotation(config.rotation_degrees),
    };
    let video = backend.open_video_stream(&params).map_err(RecorderError::VideoStream)?;
    debug!("Video stream {} opened: {:?}", video.index, params);

    let audio = match (config.audio, ring) {
        (Some(audio), Some(ring)) => {
            let params = AudioStreamParams {
                sample_rate: audio.effective_sample_rate(),
                channels: audio.channels,
                bitrate: audio.bitrate,
            };
            match backend.open_audio_stream(&params).map_err(RecorderError::AudioStream)? {
                Some(stream) => {
                    debug!("Audio stream {} opened, frame size {}", stream.handle.index, stream.frame_size);
                    Some(AudioTrack {
                        scratch: vec![0.0; stream.frame_size.max(1) * usize::from(audio.channels)],
                        stream,
                        ring,
                        sample_rate: params.sample_rate,
                        samples_encoded: 0,
                    })
                }
                None => {
                    warn!("Output has no audio track, recording video only");
                    None
                }
            }
        }
        _ => None,
    };

    backend.start().map_err(RecorderError::Container)?;
    Ok((video, audio))
}

fn spawn_encoder(
    transformer: &FrameTransformer,
    core: &Arc<Mutex<EncoderCore>>,
    control: Arc<SessionControl>,
) -> Result<Handoff> {
    let slots = Arc::new(FrameSlots {
        buffers: [
            Mutex::new(transformer.allocate()?),
            Mutex::new(transformer.allocate()?),
        ],
        states: Mutex::new([SlotState::Free; 2]),
    });

    let (tx, rx) = mpsc::sync_channel(HANDOFF_DEPTH);
    let worker_slots = Arc::clone(&slots);
    let worker_core = Arc::clone(core);

    let spawned = std::thread::Builder::new()
        .name("screenrec-encode".to_string())
        .spawn(move || encode_loop(&rx, &worker_slots, &worker_core, &control));

    match spawned {
        Ok(worker) => Ok(Handoff::Threaded(Threaded {
            slots,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })),
        Err(e) => {
            warn!("Can't create encode thread ({}), encoding synchronously", e);
            Ok(Handoff::Inline(Mutex::new(transformer.allocate()?)))
        }
    }
}

fn encode_loop(
    rx: &Receiver<usize>,
    slots: &FrameSlots,
    core: &Mutex<EncoderCore>,
    control: &SessionControl,
) {
    debug!("Encode thread started");
    let mut faulted = false;

    while let Ok(index) = rx.recv() {
        slots.set(index, SlotState::Encoding);
        if !faulted {
            let frame = slots.buffers[index].lock();
            if let Err(e) = core.lock().encode_video(&frame) {
                error!("{}", e);
                control.request_stop(e.code());
                faulted = true;
            }
        }
        slots.set(index, SlotState::Free);
    }

    debug!("Encode thread finished");
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use screenrec_capture::{FrameSize, FrameSource, SyntheticSource};
    use screenrec_transform::{Geometry, OutputFormat, Padding};

    use super::*;
    use crate::config::{AudioConfig, BufferingMode};
    use crate::error::codes;
    use crate::testing::{init_test_tracing, MemoryBackend, MemoryOutput};

    struct Harness {
        pipeline: EncodePipeline,
        output: MemoryOutput,
        control: Arc<SessionControl>,
        stats: Arc<SessionStats>,
        source: SyntheticSource,
    }

    fn harness(
        backend: MemoryBackend,
        output: MemoryOutput,
        config: &RecorderConfig,
        ring: Option<Arc<AudioRingBuffer>>,
    ) -> Harness {
        init_test_tracing();
        let geometry = Geometry::resolve(FrameSize::new(32, 24), Padding::default(), 0, true).expect("geometry");
        let transformer = FrameTransformer::new(geometry, OutputFormat::Yuv420Planar).expect("plan");
        let control = Arc::new(SessionControl::new());
        control.mark_capturing();
        let stats = Arc::new(SessionStats::default());

        let pipeline = EncodePipeline::open(
            Box::new(backend),
            transformer,
            config,
            ring,
            Arc::clone(&control),
            Arc::clone(&stats),
        )
        .expect("open");

        Harness {
            pipeline,
            output,
            control,
            stats,
            source: SyntheticSource::new(32, 24),
        }
    }

    fn single() -> RecorderConfig {
        RecorderConfig::builder().buffering(BufferingMode::Single).build()
    }

    impl Harness {
        fn render_at(&mut self, millis: u64) -> Result<()> {
            self.source.refresh(FrameSize::default()).expect("refresh");
            let frame = self.source.current_frame().expect("frame");
            self.pipeline.render(&frame, Duration::from_millis(millis))
        }
    }

    #[test]
    fn test_single_mode_encodes_in_order() {
        let (backend, output) = MemoryBackend::new();
        let mut h = harness(backend, output, &single(), None);
        assert!(!h.pipeline.is_threaded());
        assert!(!h.pipeline.has_audio());

        for ms in [0, 66, 133, 200] {
            h.render_at(ms).expect("render");
        }
        h.pipeline.finish().expect("finish");

        let recording = h.output.snapshot();
        assert_eq!(recording.video_pts(), vec![0, 66, 133, 200]);
        assert!(recording.started && recording.finalized && recording.closed);
        assert_eq!(h.stats.snapshot().frames_encoded, 4);
    }

    #[test]
    fn test_stream_params_from_config() {
        let (backend, output) = MemoryBackend::new();
        let config = RecorderConfig::builder()
            .buffering(BufferingMode::Single)
            .video_bitrate(0)
            .rotation_degrees(180)
            .build();
        let h = harness(backend, output, &config, None);

        let params = h.output.snapshot().video_params.expect("video stream");
        assert_eq!((params.width, params.height), (32, 24));
        assert_eq!(params.bitrate, crate::config::DEFAULT_VIDEO_BITRATE);
        assert_eq!(params.frame_rate, (15, 1));
        assert_eq!(params.format, OutputFormat::Yuv420Planar);
        assert_eq!(params.rotation_degrees, 180);
    }

    #[test]
    fn test_double_mode_never_waits_for_encoder() {
        let (backend, output) = MemoryBackend::new();
        let backend = backend.with_encode_delay(Duration::from_millis(100));
        let mut h = harness(backend, output, &RecorderConfig::default(), None);
        assert!(h.pipeline.is_threaded());

        for i in 0..10 {
            let started = Instant::now();
            h.render_at(i * 10).expect("render");
            assert!(
                started.elapsed() < Duration::from_millis(50),
                "render blocked for {:?}",
                started.elapsed()
            );
        }
        h.pipeline.finish().expect("finish");

        let stats = h.stats.snapshot();
        assert_eq!(stats.frames_rendered, 10);
        assert!(stats.frames_dropped > 0);
        assert_eq!(stats.frames_encoded + stats.frames_dropped, 10);

        let pts = h.output.snapshot().video_pts();
        assert!(pts.windows(2).all(|w| w[0] < w[1]), "pts out of order: {:?}", pts);
    }

    #[test]
    fn test_audio_interleaved_behind_video() {
        let (backend, output) = MemoryBackend::new();
        let config = RecorderConfig::builder()
            .buffering(BufferingMode::Single)
            .audio(AudioConfig::default())
            .build();
        let ring = Arc::new(AudioRingBuffer::new(16_000));
        let mut h = harness(backend, output, &config, Some(Arc::clone(&ring)));
        assert!(h.pipeline.has_audio());

        // 300 ms of audio at 16 kHz in 160-sample (10 ms) frames
        ring.write(&vec![0.25; 4800]);

        h.render_at(0).expect("render");
        assert_eq!(h.output.snapshot().audio_pts().len(), 0);

        h.render_at(100).expect("render");
        h.render_at(200).expect("render");
        let audio = h.output.snapshot().audio_pts();
        assert_eq!(audio.len(), 20);
        assert_eq!(audio[1], 160);

        h.pipeline.finish().expect("finish");
        let recording = h.output.snapshot();
        assert_eq!(recording.audio_pts().len(), 30);
        assert_eq!(recording.audio_samples, 4800);
        assert_eq!(h.stats.snapshot().audio_frames, 30);
    }

    #[test]
    fn test_audio_failure_is_not_fatal() {
        let (backend, output) = MemoryBackend::new();
        let config = RecorderConfig::builder()
            .buffering(BufferingMode::Single)
            .audio(AudioConfig::default())
            .build();
        let ring = Arc::new(AudioRingBuffer::new(16_000));
        let mut h = harness(backend.failing_audio_at(0), output, &config, Some(Arc::clone(&ring)));

        ring.write(&vec![0.0; 800]);
        h.render_at(0).expect("render");
        h.render_at(50).expect("render despite audio failure");

        assert_eq!(h.stats.snapshot().audio_frames, 4);
        assert_eq!(h.control.error_code(), codes::CLEAN);
        assert!(h.control.is_capturing());
    }

    #[test]
    fn test_video_failure_single_mode() {
        let (backend, output) = MemoryBackend::new();
        let mut h = harness(backend.failing_video_at(1), output, &single(), None);

        h.render_at(0).expect("first frame");
        let err = h.render_at(66).unwrap_err();
        assert_eq!(err.code(), codes::VIDEO_ENCODE);
    }

    #[test]
    fn test_video_failure_on_encode_thread_stops_session() {
        let (backend, output) = MemoryBackend::new();
        let mut h = harness(backend.failing_video_at(0), output, &RecorderConfig::default(), None);

        h.render_at(0).expect("hand-off succeeds");
        h.pipeline.finish().expect("finish");

        assert_eq!(h.control.error_code(), codes::VIDEO_ENCODE);
        assert!(h.control.is_stopping());
    }

    #[test]
    fn test_backend_without_audio() {
        let (backend, output) = MemoryBackend::new();
        let config = RecorderConfig::builder()
            .buffering(BufferingMode::Single)
            .audio(AudioConfig::default())
            .build();
        let ring = Arc::new(AudioRingBuffer::new(1600));
        let h = harness(backend.without_audio(), output, &config, Some(ring));

        assert!(!h.pipeline.has_audio());
        assert!(h.output.snapshot().audio_params.is_none());
    }

    #[test]
    fn test_stream_setup_failure_closes_backend() {
        init_test_tracing();
        let (backend, output) = MemoryBackend::new();
        let geometry = Geometry::resolve(FrameSize::new(8, 8), Padding::default(), 0, true).expect("geometry");
        let transformer = FrameTransformer::new(geometry, OutputFormat::Yuv420Planar).expect("plan");

        let err = EncodePipeline::open(
            Box::new(backend.failing_video_stream()),
            transformer,
            &single(),
            None,
            Arc::new(SessionControl::new()),
            Arc::new(SessionStats::default()),
        )
        .err()
        .expect("open must fail");

        assert_eq!(err.code(), codes::VIDEO_STREAM);
        assert!(output.snapshot().closed);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let (backend, output) = MemoryBackend::new();
        let mut h = harness(backend, output, &RecorderConfig::default(), None);

        h.render_at(0).expect("render");
        h.pipeline.finish().expect("first finish");
        h.pipeline.finish().expect("second finish");
        h.render_at(100).expect("render after finish is ignored");

        assert_eq!(h.output.video_frames(), 1);
        assert_eq!(h.stats.snapshot().frames_rendered, 1);
    }
}
