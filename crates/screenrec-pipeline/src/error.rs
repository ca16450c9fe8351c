//! Error types for recording sessions
//!
//! Every failure is classified into an [`ErrorKind`]. Fatal kinds stop the
//! session; the numeric [`code`](RecorderError::code) of the first fatal
//! error becomes the session's exit code.

use screenrec_capture::CaptureError;
use screenrec_transform::TransformError;
use thiserror::Error;

/// Numeric exit codes reported to the supervising process
pub mod codes {
    /// Clean stop (external request or normal end)
    pub const CLEAN: i32 = 0;
    /// Output file could not be opened
    pub const OUTPUT_OPEN: i32 = 201;
    /// Capture source could not be opened
    pub const SOURCE_OPEN: i32 = 202;
    /// Capture source stopped delivering frames
    pub const CAPTURE_FAILED: i32 = 217;
    /// Maximum recording duration reached
    pub const MAX_DURATION: i32 = 230;
    /// Unsupported geometry or format combination
    pub const UNSUPPORTED: i32 = 232;
    /// Container header or output context failure
    pub const CONTAINER: i32 = 234;
    /// Video stream could not be set up
    pub const VIDEO_STREAM: i32 = 235;
    /// Audio stream could not be set up
    pub const AUDIO_STREAM: i32 = 236;
    /// Audio capture device could not be started
    pub const AUDIO_START: i32 = 237;
    /// Audio encode or write failed
    pub const AUDIO_ENCODE: i32 = 238;
    /// Video encode or write failed
    pub const VIDEO_ENCODE: i32 = 239;
    /// External recorder refused a frame
    pub const EXTERNAL_RECORDER: i32 = 242;
}

/// Failure classes of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A resource was unavailable before any frame was produced
    SetupFailure,
    /// The capture source stopped responding
    CaptureFault,
    /// Encoding or writing a video frame failed
    VideoCodecFault,
    /// Encoding or writing audio failed
    AudioCodecFault,
    /// The audio producer outran the encoder
    AudioOverrun,
    /// Geometry/format combination cannot be produced
    ConfigurationFault,
}

impl ErrorKind {
    /// `true` when the session must stop
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::AudioCodecFault | Self::AudioOverrun)
    }
}

/// Errors reported by an encoder/muxer backend
#[derive(Error, Debug)]
pub enum BackendError {
    /// The output could not be created
    #[error("Failed to open output: {0}")]
    OutputOpen(String),

    /// Writing the container header failed
    #[error("Container header failed: {0}")]
    Header(String),

    /// A stream could not be added to the container
    #[error("Stream setup failed: {0}")]
    StreamSetup(String),

    /// The codec refused a frame or samples
    #[error("Encode failed: {0}")]
    Encode(String),

    /// A packet could not be written
    #[error("Packet write failed: {0}")]
    Write(String),

    /// Flushing or finalizing the output failed
    #[error("Finalize failed: {0}")]
    Finalize(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Create a stream setup error
    pub fn stream_setup(msg: impl Into<String>) -> Self {
        Self::StreamSetup(msg.into())
    }

    /// Create an encode error
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a finalize error
    pub fn finalize(msg: impl Into<String>) -> Self {
        Self::Finalize(msg.into())
    }
}

/// Errors reported by an audio capture device
#[derive(Error, Debug)]
pub enum AudioError {
    /// No device matches the request
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device refused to start
    #[error("Audio capture failed to start: {0}")]
    StartFailed(String),
}

/// Errors of a recording session
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Configuration failed validation
    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// Capture source could not deliver a first frame
    #[error("Capture source unavailable: {0}")]
    SourceOpen(#[source] CaptureError),

    /// Capture source failed during recording
    #[error("Capture failed: {0}")]
    Capture(#[source] CaptureError),

    /// Frame transform could not be planned or applied
    #[error("Frame transform failed: {0}")]
    Transform(#[from] TransformError),

    /// Output could not be opened
    #[error("Output unavailable: {0}")]
    OutputOpen(#[source] BackendError),

    /// Container header could not be written
    #[error("Container setup failed: {0}")]
    Container(#[source] BackendError),

    /// Video stream could not be opened
    #[error("Video stream setup failed: {0}")]
    VideoStream(#[source] BackendError),

    /// Audio stream could not be opened
    #[error("Audio stream setup failed: {0}")]
    AudioStream(#[source] BackendError),

    /// Audio capture device could not be started
    #[error("Audio capture unavailable: {0}")]
    AudioStart(#[from] AudioError),

    /// Audio encode or write failed
    #[error("Audio encode failed: {0}")]
    AudioEncode(#[source] BackendError),

    /// Video encode or write failed
    #[error("Video encode failed: {0}")]
    VideoEncode(#[source] BackendError),

    /// External recorder refused a frame or failed to stop
    #[error("External recorder failed: {0}")]
    ExternalRecorder(#[source] BackendError),
}

/// Result type for recording operations
pub type Result<T> = std::result::Result<T, RecorderError>;

impl RecorderError {
    /// Failure class
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::ConfigurationFault,
            Self::Transform(e) if e.is_configuration() => ErrorKind::ConfigurationFault,
            Self::Transform(_) | Self::Capture(_) => ErrorKind::CaptureFault,
            Self::SourceOpen(_)
            | Self::OutputOpen(_)
            | Self::Container(_)
            | Self::VideoStream(_)
            | Self::AudioStream(_)
            | Self::AudioStart(_) => ErrorKind::SetupFailure,
            Self::AudioEncode(_) => ErrorKind::AudioCodecFault,
            Self::VideoEncode(_) | Self::ExternalRecorder(_) => ErrorKind::VideoCodecFault,
        }
    }

    /// Exit code reported when this error stops the session
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) => codes::UNSUPPORTED,
            Self::Transform(e) if e.is_configuration() => codes::UNSUPPORTED,
            Self::Transform(_) | Self::Capture(_) => codes::CAPTURE_FAILED,
            Self::SourceOpen(_) => codes::SOURCE_OPEN,
            Self::OutputOpen(_) => codes::OUTPUT_OPEN,
            Self::Container(_) => codes::CONTAINER,
            Self::VideoStream(_) => codes::VIDEO_STREAM,
            Self::AudioStream(_) => codes::AUDIO_STREAM,
            Self::AudioStart(_) => codes::AUDIO_START,
            Self::AudioEncode(_) => codes::AUDIO_ENCODE,
            Self::VideoEncode(_) => codes::VIDEO_ENCODE,
            Self::ExternalRecorder(_) => codes::EXTERNAL_RECORDER,
        }
    }
}
