//! Raw frame view
//!
//! A [`RawFrame`] borrows pixel memory owned by the capture source. The borrow
//! is tied to the source (`FrameSource::current_frame(&self)`), so the frame
//! cannot outlive the next `refresh()` or `release()`: both need `&mut self`.

use crate::error::{CaptureError, Result};
use crate::format::PixelLayout;

/// Non-owning view of the most recently captured display pixels
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: u32,
    layout: PixelLayout,
}

impl<'a> RawFrame<'a> {
    /// Wrap borrowed pixel memory
    ///
    /// `stride` is in pixels and may exceed `width`. The slice must hold at
    /// least `stride * (height - 1) + width` pixels.
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: u32, layout: PixelLayout) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::invalid_geometry(format!("{}x{} frame", width, height)));
        }
        if stride < width {
            return Err(CaptureError::invalid_geometry(format!(
                "stride {} smaller than width {}",
                stride, width
            )));
        }

        let needed = Self::required_len(width, height, stride, layout);
        if data.len() < needed {
            return Err(CaptureError::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            stride,
            layout,
        })
    }

    /// Minimum byte length for the given geometry
    #[must_use]
    pub fn required_len(width: u32, height: u32, stride: u32, layout: PixelLayout) -> usize {
        let bpp = layout.bytes_per_pixel();
        ((height as usize - 1) * stride as usize + width as usize) * bpp
    }

    /// Frame width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in pixels
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Pixel byte order
    #[must_use]
    pub const fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Whole pixel slice
    #[must_use]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Bytes of the pixel at linear pixel index `idx` (`row * stride + col`)
    #[inline]
    #[must_use]
    pub fn pixel_at(&self, idx: usize) -> &'a [u8] {
        let start = idx * 4;
        &self.data[start..start + 4]
    }

    /// Bytes of the pixel at column `x`, row `y`
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &'a [u8] {
        self.pixel_at(y as usize * self.stride as usize + x as usize)
    }

    /// `true` when rows are tightly packed (stride equals width)
    #[must_use]
    pub const fn is_contiguous(&self) -> bool {
        self.stride == self.width
    }
}
