//! Audio sample ring buffer
//!
//! Decouples the audio device callback (any thread, any batch size) from the
//! encoder, which consumes fixed-size frames. One mutex covers both sides.
//!
//! When the writer catches up with the reader the oldest unread sample is
//! overwritten and counted as an overrun. Overruns are logged and never
//! fatal.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use tracing::warn;

struct RingState {
    samples: HeapRb<f32>,
    overruns: u64,
}

/// Fixed-capacity circular buffer of normalized `f32` samples
pub struct AudioRingBuffer {
    inner: Mutex<RingState>,
    capacity: usize,
}

impl std::fmt::Debug for AudioRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRingBuffer")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

impl AudioRingBuffer {
    /// Create a buffer holding `capacity` samples (at least 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(RingState {
                samples: HeapRb::new(capacity),
                overruns: 0,
            }),
            capacity,
        }
    }

    /// Create a buffer holding one second of interleaved audio
    #[must_use]
    pub fn for_sample_rate(sample_rate: u32, channels: u16) -> Self {
        Self::new(sample_rate as usize * usize::from(channels.max(1)))
    }

    /// Maximum number of unread samples
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append samples, overwriting the oldest unread ones when full
    ///
    /// Returns the number of unread samples that were lost.
    pub fn write(&self, input: &[f32]) -> usize {
        let mut state = self.inner.lock();
        let lost = input
            .iter()
            .filter(|&&sample| state.samples.push_overwrite(sample).is_some())
            .count();

        if lost > 0 {
            state.overruns += lost as u64;
            let total = state.overruns;
            drop(state);
            warn!("Audio ring buffer overrun: {} samples dropped ({} total)", lost, total);
        }
        lost
    }

    /// Number of unread samples
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.lock().samples.occupied_len()
    }

    /// Fill `out` completely with the oldest unread samples
    ///
    /// Returns `false` and reads nothing when fewer than `out.len()` samples
    /// are buffered.
    pub fn read_exact(&self, out: &mut [f32]) -> bool {
        let mut state = self.inner.lock();
        if state.samples.occupied_len() < out.len() {
            return false;
        }
        state.samples.pop_slice(out) == out.len()
    }

    /// Total samples lost to overruns
    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.inner.lock().overruns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(from: usize, count: usize) -> Vec<f32> {
        (from..from + count).map(|i| i as f32).collect()
    }

    #[test]
    fn test_available_tracks_writes_and_reads() {
        let ring = AudioRingBuffer::new(16);
        let mut written = 0;
        let mut read = 0;
        let mut out = [0.0f32; 3];

        for round in 0..20 {
            ring.write(&ramp(written, round % 5));
            written += round % 5;
            assert_eq!(ring.available(), written - read);

            while ring.read_exact(&mut out) {
                assert_eq!(out[0], read as f32);
                read += 3;
                assert_eq!(ring.available(), written - read);
            }
        }
        assert_eq!(ring.overruns(), 0);
    }

    #[test]
    fn test_read_requires_full_frame() {
        let ring = AudioRingBuffer::new(8);
        ring.write(&[0.5, 0.25]);
        let mut out = [0.0f32; 3];
        assert!(!ring.read_exact(&mut out));
        assert_eq!(ring.available(), 2);
    }

    #[test]
    fn test_wraparound_read() {
        let ring = AudioRingBuffer::new(5);
        let mut out = [0.0f32; 4];
        ring.write(&ramp(0, 4));
        assert!(ring.read_exact(&mut out));
        ring.write(&ramp(4, 4));
        assert!(ring.read_exact(&mut out));
        assert_eq!(out, [4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_overrun_only_when_unread_overwritten() {
        let ring = AudioRingBuffer::new(4);
        assert_eq!(ring.write(&ramp(0, 4)), 0);
        assert_eq!(ring.overruns(), 0);

        assert_eq!(ring.write(&ramp(4, 2)), 2);
        assert_eq!(ring.overruns(), 2);
        assert_eq!(ring.available(), 4);

        let mut out = [0.0f32; 4];
        assert!(ring.read_exact(&mut out));
        assert_eq!(out, [2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_batch_larger_than_capacity_keeps_newest() {
        let ring = AudioRingBuffer::new(3);
        assert_eq!(ring.write(&ramp(0, 5)), 2);

        let mut out = [0.0f32; 3];
        assert!(ring.read_exact(&mut out));
        assert_eq!(out, [2.0, 3.0, 4.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn test_capacity_for_sample_rate() {
        assert_eq!(AudioRingBuffer::for_sample_rate(16_000, 1).capacity(), 16_000);
        assert_eq!(AudioRingBuffer::for_sample_rate(48_000, 2).capacity(), 96_000);
    }
}
