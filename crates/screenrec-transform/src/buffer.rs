//! Owned output frames

use crate::color::{CHROMA_NEUTRAL, Y_BLACK};
use crate::error::{Result, TransformError};
use crate::format::{ChromaLayout, OutputFormat};

/// Pixel storage in the encoder's format plus a presentation timestamp
///
/// Allocated once at setup and overwritten every tick. Padding is never
/// written by a transform, so it keeps the black fill from allocation.
#[derive(Clone)]
pub struct VideoFrameBuffer {
    data: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
    stride: u32,
    pts: i64,
}

impl std::fmt::Debug for VideoFrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrameBuffer")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("pts", &self.pts)
            .field("len", &self.data.len())
            .finish()
    }
}

impl VideoFrameBuffer {
    /// Allocate a tightly packed frame
    pub fn new(format: OutputFormat, width: u32, height: u32) -> Result<Self> {
        Self::with_stride(format, width, height, width)
    }

    /// Allocate a frame whose rows are `stride` pixels apart
    pub fn with_stride(format: OutputFormat, width: u32, height: u32, stride: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TransformError::invalid_geometry(format!(
                "{}x{} output frame",
                width, height
            )));
        }
        if stride < width {
            return Err(TransformError::StrideTooSmall { stride, width });
        }

        let mut frame = Self {
            data: vec![0u8; format.buffer_len(stride, height)],
            format,
            width,
            height,
            stride,
            pts: 0,
        };
        frame.clear();
        Ok(frame)
    }

    /// Reset every pixel (padding included) to black
    pub fn clear(&mut self) {
        if self.format.is_yuv() {
            let luma = self.stride as usize * self.height as usize;
            self.data[..luma].fill(Y_BLACK);
            self.data[luma..].fill(CHROMA_NEUTRAL);
        } else {
            self.data.fill(0);
        }
    }

    /// Pixel format
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Picture width
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Picture height
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in pixels (luma bytes for YUV)
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Presentation timestamp in stream time-base units
    #[must_use]
    pub const fn pts(&self) -> i64 {
        self.pts
    }

    /// Stamp the frame
    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    /// All planes, back to back
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to all planes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Chroma placement, `None` for packed formats
    #[must_use]
    pub const fn chroma_layout(&self) -> Option<ChromaLayout> {
        self.format.chroma_layout(self.stride, self.height)
    }

    /// Luma plane (or the packed pixels)
    #[must_use]
    pub fn luma(&self) -> &[u8] {
        if self.format.is_yuv() {
            &self.data[..self.stride as usize * self.height as usize]
        } else {
            &self.data
        }
    }

    /// Bytes of packed pixel `(x, y)`, `None` for YUV formats
    #[must_use]
    pub fn packed_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.format.packed_layout()?;
        let idx = (y as usize * self.stride as usize + x as usize) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// `(Y, U, V)` of pixel `(x, y)`, `None` for packed formats
    #[must_use]
    pub fn yuv_pixel(&self, x: u32, y: u32) -> Option<(u8, u8, u8)> {
        let chroma = self.chroma_layout()?;
        let (x, y) = (x as usize, y as usize);
        let luma = *self.data.get(y * self.stride as usize + x)?;
        let (u, v) = chroma.index(x, y);
        Some((luma, *self.data.get(u)?, *self.data.get(v)?))
    }
}
