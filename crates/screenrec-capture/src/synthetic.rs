//! Deterministic synthetic frame source
//!
//! Produces a moving gradient without touching any display hardware. Used by
//! tests and demos, and handy for checking an encoder setup on a headless box.
//!
//! # Examples
//!
//! ```rust
//! use screenrec_capture::{FrameSize, FrameSource, PixelLayout, SyntheticSource};
//!
//! let mut source = SyntheticSource::new(64, 48).with_layout(PixelLayout::Bgra);
//! source.refresh(FrameSize::default()).unwrap();
//!
//! let frame = source.current_frame().unwrap();
//! assert_eq!((frame.width(), frame.height()), (64, 48));
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{CaptureError, Result};
use crate::format::PixelLayout;
use crate::frame::RawFrame;
use crate::source::{FrameSize, FrameSource};

/// Gradient value of pixel `(x, y)` on refresh number `tick`
#[must_use]
pub fn gradient_pixel(x: u32, y: u32, tick: u64) -> (u8, u8, u8) {
    let r = (x as u64).wrapping_add(tick) as u8;
    let g = y as u8;
    let b = (x ^ y) as u8;
    (r, g, b)
}

/// Frame source generating a gradient pattern in memory
pub struct SyntheticSource {
    width: u32,
    height: u32,
    stride: u32,
    layout: PixelLayout,
    buffer: Vec<u8>,
    ready: bool,
    released: bool,
    refreshes: Arc<AtomicU64>,
    fail_after: Option<u64>,
    fail_at: BTreeSet<u64>,
}

impl SyntheticSource {
    /// Create a tightly packed RGBA source
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width,
            layout: PixelLayout::Rgba,
            buffer: Vec::new(),
            ready: false,
            released: false,
            refreshes: Arc::new(AtomicU64::new(0)),
            fail_after: None,
            fail_at: BTreeSet::new(),
        }
    }

    /// Use a row pitch larger than the width
    #[must_use]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride.max(self.width);
        self
    }

    /// Emit pixels in the given byte order
    #[must_use]
    pub fn with_layout(mut self, layout: PixelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Fail every refresh once `count` refreshes have succeeded
    #[must_use]
    pub fn failing_after(mut self, count: u64) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Fail the refreshes with these zero-based attempt numbers
    #[must_use]
    pub fn failing_at(mut self, attempts: impl IntoIterator<Item = u64>) -> Self {
        self.fail_at.extend(attempts);
        self
    }

    /// Shared counter of refresh attempts (successful or not)
    ///
    /// Stays readable after the source has been moved into a recorder.
    #[must_use]
    pub fn refresh_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.refreshes)
    }

    fn paint(&mut self, tick: u64) {
        let stride = self.stride as usize;
        let len = stride * self.height as usize * 4;
        if self.buffer.len() != len {
            self.buffer = vec![0u8; len];
        }

        for y in 0..self.height {
            let row = y as usize * stride;
            for x in 0..self.width {
                let (r, g, b) = gradient_pixel(x, y, tick);
                let idx = (row + x as usize) * 4;
                let px = match self.layout {
                    PixelLayout::Rgba => [r, g, b, 255],
                    PixelLayout::Bgra => [b, g, r, 255],
                };
                self.buffer[idx..idx + 4].copy_from_slice(&px);
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn refresh(&mut self, requested: FrameSize) -> Result<()> {
        if self.released {
            return Err(CaptureError::Released);
        }

        let attempt = self.refreshes.fetch_add(1, Ordering::SeqCst);
        let over_budget = self.fail_after.is_some_and(|limit| attempt >= limit);
        if over_budget || self.fail_at.contains(&attempt) {
            debug!("Synthetic refresh {} failing on request", attempt);
            self.ready = false;
            return Err(CaptureError::refresh_failed(format!("synthetic failure at refresh {}", attempt)));
        }

        if !requested.is_native() {
            trace!(
                "Synthetic source ignores requested size {}x{}",
                requested.width,
                requested.height
            );
        }

        self.paint(attempt);
        self.ready = true;
        Ok(())
    }

    fn current_frame(&self) -> Option<RawFrame<'_>> {
        if !self.ready || self.released {
            return None;
        }
        RawFrame::new(&self.buffer, self.width, self.height, self.stride, self.layout).ok()
    }

    fn native_size(&self) -> Option<FrameSize> {
        Some(FrameSize::new(self.width, self.height))
    }

    fn release(&mut self) {
        debug!("Releasing synthetic source");
        self.released = true;
        self.ready = false;
        self.buffer = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[test]
    fn test_no_frame_before_refresh() {
        let source = SyntheticSource::new(8, 8);
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn test_gradient_pattern() {
        let mut source = SyntheticSource::new(16, 8).with_stride(20).with_layout(PixelLayout::Bgra);
        source.refresh(FrameSize::default()).expect("refresh");

        let frame = source.current_frame().expect("frame");
        assert_eq!(frame.stride(), 20);
        let (r, g, b) = frame.layout().rgb(frame.pixel(5, 3));
        assert_eq!((r, g, b), gradient_pixel(5, 3, 0));
    }

    #[test]
    fn test_pattern_moves_between_refreshes() {
        let mut source = SyntheticSource::new(4, 4);
        source.refresh(FrameSize::default()).expect("first");
        let first = source.current_frame().expect("frame").pixel(1, 1).to_vec();
        source.refresh(FrameSize::default()).expect("second");
        let second = source.current_frame().expect("frame").pixel(1, 1).to_vec();
        assert_ne!(first, second);
    }

    #[test]
    fn test_failure_injection() {
        init_tracing();
        let mut source = SyntheticSource::new(4, 4).failing_at([1]).failing_after(3);
        assert!(source.refresh(FrameSize::default()).is_ok());
        assert!(source.refresh(FrameSize::default()).is_err());
        assert!(source.current_frame().is_none());
        assert!(source.refresh(FrameSize::default()).is_ok());
        assert!(source.refresh(FrameSize::default()).is_err());
        assert_eq!(source.refresh_counter().load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_release() {
        let mut source = SyntheticSource::new(4, 4);
        source.refresh(FrameSize::default()).expect("refresh");
        source.release();
        assert!(source.current_frame().is_none());
        assert!(matches!(source.refresh(FrameSize::default()), Err(CaptureError::Released)));
    }
}
