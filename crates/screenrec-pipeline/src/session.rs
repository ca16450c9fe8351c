//! Session state shared between the capture loop, the encode thread and
//! external controllers

use std::sync::atomic::{AtomicI32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::{codes, RecorderError};

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RecorderState {
    /// Resources are being set up
    Init = 0,
    /// Frames are being captured and encoded
    Capturing = 1,
    /// Teardown in progress
    Stopping = 2,
    /// Terminal
    Stopped = 3,
}

impl RecorderState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Init,
            1 => Self::Capturing,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// State machine plus the first-error-wins exit code
#[derive(Debug)]
pub struct SessionControl {
    state: AtomicU8,
    error_code: AtomicI32,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    /// Fresh control in `Init`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(RecorderState::Init as u8),
            error_code: AtomicI32::new(codes::CLEAN),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RecorderState {
        RecorderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` while frames should be produced
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.state() == RecorderState::Capturing
    }

    /// `true` once a stop has been requested
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.state() >= RecorderState::Stopping
    }

    /// Recorded exit code (0 until a fault is reported)
    #[must_use]
    pub fn error_code(&self) -> i32 {
        self.error_code.load(Ordering::Acquire)
    }

    /// Request a stop with `code` (0 for a clean stop)
    ///
    /// The first nonzero code is kept; later codes are ignored. Returns `true`
    /// for the call that moved the session into `Stopping`.
    pub fn request_stop(&self, code: i32) -> bool {
        if code != codes::CLEAN {
            let _ = self
                .error_code
                .compare_exchange(codes::CLEAN, code, Ordering::AcqRel, Ordering::Acquire);
        }

        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= RecorderState::Stopping as u8 {
                debug!("Already stopping, stop code {} recorded only if first", code);
                return false;
            }
            match self.state.compare_exchange(
                current,
                RecorderState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        if code == codes::CLEAN {
            info!("Stop requested");
        } else {
            error!("Stopping with error code {}", code);
        }
        true
    }

    pub(crate) fn mark_capturing(&self) -> bool {
        self.state
            .compare_exchange(
                RecorderState::Init as u8,
                RecorderState::Capturing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_stopped(&self) {
        self.state.store(RecorderState::Stopped as u8, Ordering::Release);
    }
}

/// Cloneable handle for stopping a session from another thread
#[derive(Debug, Clone)]
pub struct StopHandle {
    control: Arc<SessionControl>,
}

impl StopHandle {
    pub(crate) fn new(control: Arc<SessionControl>) -> Self {
        Self { control }
    }

    /// Request a clean stop
    pub fn stop(&self) -> bool {
        self.control.request_stop(codes::CLEAN)
    }

    /// Request a stop reporting `code`
    pub fn stop_with(&self, code: i32) -> bool {
        self.control.request_stop(code)
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> RecorderState {
        self.control.state()
    }

    /// Recorded exit code so far
    #[must_use]
    pub fn error_code(&self) -> i32 {
        self.control.error_code()
    }
}

/// Live counters of a session
#[derive(Debug, Default)]
pub struct SessionStats {
    pub(crate) frames_rendered: AtomicU64,
    pub(crate) frames_encoded: AtomicU64,
    pub(crate) frames_dropped: AtomicU64,
    pub(crate) audio_frames: AtomicU64,
    pub(crate) audio_overruns: AtomicU64,
    pub(crate) capture_errors: AtomicU64,
}

impl SessionStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            frames_encoded: self.frames_encoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            audio_frames: self.audio_frames.load(Ordering::Relaxed),
            audio_overruns: self.audio_overruns.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Captured frames handed to the sink
    pub frames_rendered: u64,
    /// Video frames accepted by the encoder
    pub frames_encoded: u64,
    /// Frames discarded because no buffer slot was free
    pub frames_dropped: u64,
    /// Audio codec frames encoded
    pub audio_frames: u64,
    /// Audio samples lost to ring buffer overruns
    pub audio_overruns: u64,
    /// Failed capture refreshes
    pub capture_errors: u64,
}

/// Result of a finished session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOutcome {
    /// First fatal error code, 0 for a clean stop
    pub exit_code: i32,
    /// Final counters
    pub stats: StatsSnapshot,
    /// Wall-clock time spent capturing
    pub duration: Duration,
}

impl SessionOutcome {
    /// Outcome of a session that never left setup
    #[must_use]
    pub const fn failed(error: &RecorderError) -> Self {
        Self {
            exit_code: error.code(),
            stats: StatsSnapshot {
                frames_rendered: 0,
                frames_encoded: 0,
                frames_dropped: 0,
                audio_frames: 0,
                audio_overruns: 0,
                capture_errors: 0,
            },
            duration: Duration::ZERO,
        }
    }

    /// Average capture rate, `None` for an empty session
    #[must_use]
    pub fn fps(&self) -> Option<f64> {
        let millis = self.duration.as_millis();
        (millis > 0).then(|| 1000.0 * self.stats.frames_rendered as f64 / millis as f64)
    }

    /// `true` for a clean stop
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.exit_code == codes::CLEAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let control = SessionControl::new();
        assert!(control.mark_capturing());

        assert!(control.request_stop(codes::VIDEO_ENCODE));
        assert!(!control.request_stop(codes::CAPTURE_FAILED));
        assert_eq!(control.error_code(), codes::VIDEO_ENCODE);
        assert_eq!(control.state(), RecorderState::Stopping);
    }

    #[test]
    fn test_clean_stop_upgraded_by_later_fault() {
        let control = SessionControl::new();
        control.mark_capturing();

        assert!(control.request_stop(codes::CLEAN));
        assert!(!control.request_stop(codes::EXTERNAL_RECORDER));
        assert!(!control.request_stop(codes::VIDEO_ENCODE));
        assert_eq!(control.error_code(), codes::EXTERNAL_RECORDER);
    }

    #[test]
    fn test_stop_during_init() {
        let control = SessionControl::new();
        assert!(control.request_stop(codes::SOURCE_OPEN));
        assert!(!control.mark_capturing());
        control.mark_stopped();
        assert_eq!(control.state(), RecorderState::Stopped);
        assert!(!control.request_stop(codes::CLEAN));
    }

    #[test]
    fn test_stop_handle_from_threads() {
        let control = Arc::new(SessionControl::new());
        control.mark_capturing();
        let handle = StopHandle::new(Arc::clone(&control));

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.stop_with(300 + i))
            })
            .collect();
        let initiated = threads
            .into_iter()
            .map(|t| t.join().expect("stop thread"))
            .filter(|started| *started)
            .count();
        assert_eq!(initiated, 1);

        assert!(control.is_stopping());
        assert!((300..304).contains(&handle.error_code()));
    }

    #[test]
    fn test_outcome_fps() {
        let outcome = SessionOutcome {
            exit_code: 0,
            stats: StatsSnapshot {
                frames_rendered: 30,
                ..StatsSnapshot::default()
            },
            duration: Duration::from_secs(2),
        };
        assert_eq!(outcome.fps(), Some(15.0));
        assert!(outcome.is_clean());
    }
}
