//! Encoder/muxer and audio device interfaces
//!
//! The pipeline never compresses anything itself. An [`EncoderBackend`] turns
//! frames and samples into packets and writes them into a container; an
//! [`AudioCapture`] device pushes samples from its own thread.
//!
//! Neither interface is reentrant: the pipeline serializes every backend call
//! behind one mutex.

use std::cmp::Ordering;
use std::time::Duration;

use screenrec_transform::{OutputFormat, VideoFrameBuffer};

use crate::error::{AudioError, BackendError};

/// Rational time base of a stream (`num / den` seconds per tick)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    /// Numerator
    pub num: u32,
    /// Denominator
    pub den: u32,
}

impl TimeBase {
    /// Milliseconds
    pub const MILLIS: Self = Self::new(1, 1000);

    /// Create a time base
    #[must_use]
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Convert an elapsed wall-clock time to the nearest tick
    #[must_use]
    pub fn rescale(self, elapsed: Duration) -> i64 {
        let tick_nanos = u128::from(self.num.max(1)) * 1_000_000_000;
        let ticks = (elapsed.as_nanos() * u128::from(self.den) + tick_nanos / 2) / tick_nanos;
        i64::try_from(ticks).unwrap_or(i64::MAX)
    }

    /// Order two timestamps expressed in different time bases
    #[must_use]
    pub fn compare(a: i64, a_base: Self, b: i64, b_base: Self) -> Ordering {
        let lhs = i128::from(a) * i128::from(a_base.num) * i128::from(b_base.den);
        let rhs = i128::from(b) * i128::from(b_base.num) * i128::from(a_base.den);
        lhs.cmp(&rhs)
    }
}

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Video track
    Video,
    /// Audio track
    Audio,
}

/// Backend-assigned identity of an opened stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle {
    /// Stream index inside the container
    pub index: usize,
    /// Video or audio
    pub kind: StreamKind,
    /// Unit of the timestamps passed to [`EncoderBackend::encode`]
    pub time_base: TimeBase,
}

/// Parameters of the video stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStreamParams {
    /// Encoded width
    pub width: u32,
    /// Encoded height
    pub height: u32,
    /// Pixel format of the frames that will be submitted
    pub format: OutputFormat,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Nominal frame rate as `(num, den)` frames per second
    pub frame_rate: (u32, u32),
    /// Rotation for the player to apply, in degrees
    pub rotation_degrees: u32,
}

/// Parameters of the audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Target bitrate in bits per second
    pub bitrate: u32,
}

/// An opened audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStream {
    /// Stream identity
    pub handle: StreamHandle,
    /// Samples per channel the codec consumes per call
    pub frame_size: usize,
}

/// Input to one encode call
#[derive(Debug, Clone, Copy)]
pub enum EncodePayload<'a> {
    /// One transformed frame
    Video(&'a VideoFrameBuffer),
    /// One codec frame of interleaved samples
    Audio(&'a [f32]),
}

/// A compressed unit ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Stream index
    pub stream: usize,
    /// Presentation timestamp in the stream's time base
    pub pts: i64,
    /// Payload bytes
    pub data: Vec<u8>,
}

/// Encoder and container writer
pub trait EncoderBackend: Send {
    /// Add the video stream
    fn open_video_stream(&mut self, params: &VideoStreamParams) -> Result<StreamHandle, BackendError>;

    /// Add the audio stream, `Ok(None)` when the container carries no audio
    fn open_audio_stream(&mut self, params: &AudioStreamParams) -> Result<Option<AudioStream>, BackendError>;

    /// Write the container header once all streams are open
    fn start(&mut self) -> Result<(), BackendError>;

    /// Encode one frame or sample block
    ///
    /// A codec may buffer internally and return `Ok(None)`.
    fn encode(
        &mut self,
        stream: &StreamHandle,
        payload: EncodePayload<'_>,
        pts: i64,
    ) -> Result<Option<Packet>, BackendError>;

    /// Interleave a packet into the container
    fn write_packet(&mut self, packet: Packet) -> Result<(), BackendError>;

    /// Flush codecs and write the trailer
    fn finalize(&mut self) -> Result<(), BackendError>;

    /// Release the output
    fn close(&mut self);
}

impl<B: EncoderBackend + ?Sized> EncoderBackend for Box<B> {
    fn open_video_stream(&mut self, params: &VideoStreamParams) -> Result<StreamHandle, BackendError> {
        (**self).open_video_stream(params)
    }

    fn open_audio_stream(&mut self, params: &AudioStreamParams) -> Result<Option<AudioStream>, BackendError> {
        (**self).open_audio_stream(params)
    }

    fn start(&mut self) -> Result<(), BackendError> {
        (**self).start()
    }

    fn encode(
        &mut self,
        stream: &StreamHandle,
        payload: EncodePayload<'_>,
        pts: i64,
    ) -> Result<Option<Packet>, BackendError> {
        (**self).encode(stream, payload, pts)
    }

    fn write_packet(&mut self, packet: Packet) -> Result<(), BackendError> {
        (**self).write_packet(packet)
    }

    fn finalize(&mut self) -> Result<(), BackendError> {
        (**self).finalize()
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Sample sink handed to an audio device
pub type AudioCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Audio capture device delivering samples on its own thread
pub trait AudioCapture: Send {
    /// Start delivering interleaved normalized samples to `callback`
    fn start(&mut self, sample_rate: u32, channels: u16, callback: AudioCallback) -> Result<(), AudioError>;

    /// Stop delivery; the callback is not invoked after this returns
    fn stop(&mut self);
}
