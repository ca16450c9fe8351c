//! Recording Configuration
//!
//! One immutable [`RecorderConfig`] is resolved before a session starts and
//! shared by every component. Use [`RecorderConfig::builder()`] or struct
//! literal syntax with [`Default::default()`].
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use screenrec_pipeline::{AudioConfig, BufferingMode, FrameRate, RecorderConfig};
//! use screenrec_transform::OutputFormat;
//!
//! let config = RecorderConfig::builder()
//!     .frame_rate(FrameRate::from_raw(30))
//!     .output_format(OutputFormat::Yuv420SemiPlanar)
//!     .audio(AudioConfig::default())
//!     .max_duration(Duration::from_secs(200))
//!     .buffering(BufferingMode::Single)
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use screenrec_capture::FrameSize;
use screenrec_transform::{OutputFormat, Padding};

/// Default video bitrate in bits per second
pub const DEFAULT_VIDEO_BITRATE: u32 = 10_000_000;

/// Default audio sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default audio bitrate in bits per second
pub const DEFAULT_AUDIO_BITRATE: u32 = 64_000;

/// Capture pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRate {
    /// Tick at most this many times per second
    Capped(u32),
    /// Capture as fast as the loop allows
    Uncapped,
}

impl FrameRate {
    /// Rate used when none (or an out-of-range one) is given
    pub const DEFAULT_FPS: u32 = 15;

    /// Highest accepted capped rate
    pub const MAX_FPS: u32 = 100;

    /// Interpret a raw command-line rate
    ///
    /// `-1` disables pacing. Any other value outside `1..=100` falls back to
    /// [`DEFAULT_FPS`](Self::DEFAULT_FPS).
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        if raw == -1 {
            Self::Uncapped
        } else if raw <= 0 || raw > Self::MAX_FPS as i32 {
            Self::Capped(Self::DEFAULT_FPS)
        } else {
            Self::Capped(raw as u32)
        }
    }

    /// Target time between ticks, `None` when uncapped
    #[must_use]
    pub fn interval(self) -> Option<Duration> {
        match self {
            Self::Capped(fps) if fps > 0 => Some(Duration::from_micros(1_000_000 / u64::from(fps))),
            Self::Capped(_) | Self::Uncapped => None,
        }
    }

    /// Rate advertised in stream metadata
    #[must_use]
    pub const fn nominal_fps(self) -> u32 {
        match self {
            Self::Capped(fps) if fps > 0 => fps,
            Self::Capped(_) | Self::Uncapped => Self::DEFAULT_FPS,
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::Capped(Self::DEFAULT_FPS)
    }
}

/// How captured frames reach the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferingMode {
    /// Transform and encode on the capture thread
    Single,
    /// Two frame slots handed to a dedicated encode thread
    #[default]
    Double,
}

/// Audio track settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 16000, 0 means default)
    pub sample_rate: u32,

    /// Interleaved channel count (default: 1)
    pub channels: u16,

    /// Encoder bitrate in bits per second (default: 64000)
    pub bitrate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            bitrate: DEFAULT_AUDIO_BITRATE,
        }
    }
}

impl AudioConfig {
    /// Mono audio at `sample_rate` (0 selects the default rate)
    #[must_use]
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Sample rate with the 0 placeholder resolved
    #[must_use]
    pub const fn effective_sample_rate(&self) -> u32 {
        if self.sample_rate == 0 {
            DEFAULT_SAMPLE_RATE
        } else {
            self.sample_rate
        }
    }
}

/// Configuration for a recording session
///
/// Resolved once before the session leaves `Init`; nothing changes it
/// afterwards.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Requested capture size, 0x0 for native (default: 0x0)
    ///
    /// Swapped when its orientation disagrees with the display.
    pub requested_size: FrameSize,

    /// Letterbox border on each axis (default: none)
    pub padding: Padding,

    /// Capture pacing (default: 15 fps)
    pub frame_rate: FrameRate,

    /// Display rotation in degrees: 0, 90, 180 or 270 (default: 0)
    pub rotation_degrees: u32,

    /// Keep portrait output instead of normalizing to landscape (default: true)
    pub allow_vertical_frames: bool,

    /// Encoder input format (default: planar YUV 4:2:0)
    pub output_format: OutputFormat,

    /// Video bitrate in bits per second (default: 10 Mbit/s, 0 means default)
    pub video_bitrate: u32,

    /// Audio track, `None` records video only (default: None)
    pub audio: Option<AudioConfig>,

    /// Stop automatically after this long (default: unlimited)
    pub max_duration: Option<Duration>,

    /// Frame hand-off mode (default: double-buffered)
    pub buffering: BufferingMode,

    /// Consecutive capture failures tolerated before stopping (default: 10)
    pub max_capture_errors: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            requested_size: FrameSize::default(),
            padding: Padding::default(),
            frame_rate: FrameRate::default(),
            rotation_degrees: 0,
            allow_vertical_frames: true,
            output_format: OutputFormat::default(),
            video_bitrate: DEFAULT_VIDEO_BITRATE,
            audio: None,
            max_duration: None,
            buffering: BufferingMode::default(),
            max_capture_errors: 10,
        }
    }
}

impl RecorderConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> RecorderConfigBuilder {
        RecorderConfigBuilder::default()
    }

    /// Video bitrate with the 0 placeholder resolved
    #[must_use]
    pub const fn effective_video_bitrate(&self) -> u32 {
        if self.video_bitrate == 0 {
            DEFAULT_VIDEO_BITRATE
        } else {
            self.video_bitrate
        }
    }

    /// Validate configuration and return any issues
    ///
    /// Returns `Ok(())` if configuration is valid, or a list of issues.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.rotation_degrees % 90 != 0 || self.rotation_degrees >= 360 {
            issues.push(format!(
                "rotation_degrees must be 0, 90, 180 or 270 (got {})",
                self.rotation_degrees
            ));
        }

        if let FrameRate::Capped(fps) = self.frame_rate {
            if fps == 0 || fps > FrameRate::MAX_FPS {
                issues.push(format!("frame_rate must be 1-{} fps (got {})", FrameRate::MAX_FPS, fps));
            }
        }

        let size = self.requested_size;
        if (size.width == 0) != (size.height == 0) {
            issues.push(format!(
                "requested_size must be 0x0 or fully specified (got {}x{})",
                size.width, size.height
            ));
        }

        if let Some(audio) = &self.audio {
            if audio.channels == 0 || audio.channels > 2 {
                issues.push(format!("audio channels must be 1 or 2 (got {})", audio.channels));
            }
            if audio.bitrate == 0 {
                issues.push("audio bitrate must be positive".to_string());
            }
        }

        if self.max_duration.is_some_and(|d| d.is_zero()) {
            issues.push("max_duration must be positive".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`RecorderConfig`]
#[derive(Debug, Default)]
pub struct RecorderConfigBuilder {
    requested_size: Option<FrameSize>,
    padding: Option<Padding>,
    frame_rate: Option<FrameRate>,
    rotation_degrees: Option<u32>,
    allow_vertical_frames: Option<bool>,
    output_format: Option<OutputFormat>,
    video_bitrate: Option<u32>,
    audio: Option<AudioConfig>,
    max_duration: Option<Duration>,
    buffering: Option<BufferingMode>,
    max_capture_errors: Option<u32>,
}

impl RecorderConfigBuilder {
    /// Set requested capture size (0x0 = native)
    #[must_use]
    pub fn requested_size(mut self, width: u32, height: u32) -> Self {
        self.requested_size = Some(FrameSize::new(width, height));
        self
    }

    /// Set letterbox padding
    #[must_use]
    pub fn padding(mut self, width: u32, height: u32) -> Self {
        self.padding = Some(Padding::new(width, height));
        self
    }

    /// Set capture pacing
    #[must_use]
    pub fn frame_rate(mut self, rate: FrameRate) -> Self {
        self.frame_rate = Some(rate);
        self
    }

    /// Set display rotation
    #[must_use]
    pub fn rotation_degrees(mut self, degrees: u32) -> Self {
        self.rotation_degrees = Some(degrees);
        self
    }

    /// Set whether portrait output is kept
    #[must_use]
    pub fn allow_vertical_frames(mut self, allow: bool) -> Self {
        self.allow_vertical_frames = Some(allow);
        self
    }

    /// Set encoder input format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Set video bitrate (0 = default)
    #[must_use]
    pub fn video_bitrate(mut self, bitrate: u32) -> Self {
        self.video_bitrate = Some(bitrate);
        self
    }

    /// Enable the audio track
    #[must_use]
    pub fn audio(mut self, audio: AudioConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Set the maximum recording duration
    #[must_use]
    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Set frame hand-off mode
    #[must_use]
    pub fn buffering(mut self, mode: BufferingMode) -> Self {
        self.buffering = Some(mode);
        self
    }

    /// Set tolerated consecutive capture failures
    #[must_use]
    pub fn max_capture_errors(mut self, count: u32) -> Self {
        self.max_capture_errors = Some(count);
        self
    }

    /// Build the configuration
    ///
    /// Returns a [`RecorderConfig`] with builder values overriding defaults.
    /// Zero bitrates and sample rates are replaced by their defaults.
    #[must_use]
    pub fn build(self) -> RecorderConfig {
        let defaults = RecorderConfig::default();

        RecorderConfig {
            requested_size: self.requested_size.unwrap_or(defaults.requested_size),
            padding: self.padding.unwrap_or(defaults.padding),
            frame_rate: self.frame_rate.unwrap_or(defaults.frame_rate),
            rotation_degrees: self.rotation_degrees.unwrap_or(defaults.rotation_degrees),
            allow_vertical_frames: self.allow_vertical_frames.unwrap_or(defaults.allow_vertical_frames),
            output_format: self.output_format.unwrap_or(defaults.output_format),
            video_bitrate: self
                .video_bitrate
                .filter(|b| *b > 0)
                .unwrap_or(defaults.video_bitrate),
            audio: self.audio.map(|a| AudioConfig {
                sample_rate: a.effective_sample_rate(),
                ..a
            }),
            max_duration: self.max_duration.or(defaults.max_duration),
            buffering: self.buffering.unwrap_or(defaults.buffering),
            max_capture_errors: self.max_capture_errors.unwrap_or(defaults.max_capture_errors),
        }
    }
}
