//! Capture pacing and video timestamps

use std::time::{Duration, Instant};

use tracing::trace;

use crate::backend::TimeBase;
use crate::config::FrameRate;

/// Paces the capture loop to a fixed tick interval
///
/// Ticks are scheduled from the previous tick, not from when the caller got
/// around to asking, so oversleeping by the OS does not push every later tick
/// back. A caller that is already late gets its tick immediately.
#[derive(Debug)]
pub struct FrameGovernor {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FrameGovernor {
    /// Create a governor for `rate`
    #[must_use]
    pub fn new(rate: FrameRate) -> Self {
        Self {
            interval: rate.interval(),
            last: None,
        }
    }

    /// Tick interval, `None` when pacing is disabled
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until the next tick and return its scheduled instant
    pub fn wait(&mut self) -> Instant {
        let now = Instant::now();
        let Some(interval) = self.interval else {
            return now;
        };

        let tick = match self.last {
            Some(last) if now < last + interval => {
                let target = last + interval;
                std::thread::sleep(target - now);
                target
            }
            Some(last) => {
                trace!("Governor behind schedule by {:?}", now - (last + interval));
                now
            }
            None => now,
        };

        self.last = Some(tick);
        tick
    }
}

/// Converts session-relative wall-clock time into stream timestamps
///
/// Frames closer together than one time-base tick share a pts. Backends that
/// need strictly increasing timestamps drop the later frame.
#[derive(Debug, Clone, Copy)]
pub struct PtsClock {
    time_base: TimeBase,
}

impl PtsClock {
    /// Create a clock for a stream time base
    #[must_use]
    pub const fn new(time_base: TimeBase) -> Self {
        Self { time_base }
    }

    /// Time base of the produced timestamps
    #[must_use]
    pub const fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Timestamp for a frame captured `elapsed` after session start
    #[must_use]
    pub fn stamp(&self, elapsed: Duration) -> i64 {
        self.time_base.rescale(elapsed)
    }
}
