//! Frame source interface
//!
//! Recording sessions only ever see display pixels through this trait, so the
//! platform acquisition (framebuffer polling, compositor snapshot, GPU buffer)
//! stays behind one call.

use crate::error::Result;
use crate::frame::RawFrame;

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSize {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl FrameSize {
    /// Create a size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` for the "native resolution" request (0x0)
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// `true` when height exceeds width
    #[must_use]
    pub const fn is_portrait(&self) -> bool {
        self.width < self.height
    }

    /// Size with the axes exchanged
    #[must_use]
    pub const fn transposed(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Swap the requested axes when their orientation disagrees with `native`
    ///
    /// Capture requests are expressed by the user in one orientation; the
    /// display may currently be in the other one.
    #[must_use]
    pub const fn oriented_like(&self, native: Self) -> Self {
        if self.is_native() || native.is_portrait() == self.is_portrait() {
            *self
        } else {
            self.transposed()
        }
    }
}

/// A display surface that can be snapshotted on demand
///
/// # Validity
///
/// The frame returned by [`current_frame`](Self::current_frame) borrows the
/// source and is only valid until the next [`refresh`](Self::refresh) or
/// [`release`](Self::release).
pub trait FrameSource: Send {
    /// Capture a new frame, optionally scaled to `requested` (0x0 = native)
    fn refresh(&mut self, requested: FrameSize) -> Result<()>;

    /// The most recently captured frame
    ///
    /// `None` before the first successful refresh or after release.
    fn current_frame(&self) -> Option<RawFrame<'_>>;

    /// Native display size, if known without capturing
    fn native_size(&self) -> Option<FrameSize>;

    /// Drop all platform resources
    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn refresh(&mut self, requested: FrameSize) -> Result<()> {
        (**self).refresh(requested)
    }

    fn current_frame(&self) -> Option<RawFrame<'_>> {
        (**self).current_frame()
    }

    fn native_size(&self) -> Option<FrameSize> {
        (**self).native_size()
    }

    fn release(&mut self) {
        (**self).release();
    }
}
