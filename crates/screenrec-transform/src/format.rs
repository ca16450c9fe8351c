//! Output pixel formats
//!
//! The encoder side accepts either packed 32-bit pixels or YUV 4:2:0 in one of
//! two chroma arrangements:
//!
//! | Format | Planes | Chroma |
//! |--------|--------|--------|
//! | `Rgba` / `Bgra` | 1 (4 bytes/pixel) | n/a |
//! | `Yuv420Planar` (I420) | Y, U, V | separate U and V planes, half stride |
//! | `Yuv420SemiPlanar` (NV12) | Y, UV | interleaved U,V pairs |

use screenrec_capture::PixelLayout;

/// Pixel format of a [`VideoFrameBuffer`](crate::VideoFrameBuffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// Packed R, G, B, A
    Rgba,
    /// Packed B, G, R, A
    Bgra,
    /// YUV 4:2:0 with separate U and V planes
    #[default]
    Yuv420Planar,
    /// YUV 4:2:0 with one interleaved UV plane
    Yuv420SemiPlanar,
}

impl OutputFormat {
    /// Packed byte order, or `None` for YUV formats
    #[must_use]
    pub const fn packed_layout(self) -> Option<PixelLayout> {
        match self {
            Self::Rgba => Some(PixelLayout::Rgba),
            Self::Bgra => Some(PixelLayout::Bgra),
            Self::Yuv420Planar | Self::Yuv420SemiPlanar => None,
        }
    }

    /// `true` for the 4:2:0 formats
    #[must_use]
    pub const fn is_yuv(self) -> bool {
        matches!(self, Self::Yuv420Planar | Self::Yuv420SemiPlanar)
    }

    /// Total byte size of a frame with `stride` pixels per row
    #[must_use]
    pub const fn buffer_len(self, stride: u32, height: u32) -> usize {
        let luma = stride as usize * height as usize;
        match self {
            Self::Rgba | Self::Bgra => luma * 4,
            Self::Yuv420Planar | Self::Yuv420SemiPlanar => luma + 2 * chroma_stride(stride) * chroma_rows(height),
        }
    }

    /// Where the chroma samples of each 2x2 block live
    #[must_use]
    pub const fn chroma_layout(self, stride: u32, height: u32) -> Option<ChromaLayout> {
        let luma = stride as usize * height as usize;
        let cs = chroma_stride(stride);
        match self {
            Self::Rgba | Self::Bgra => None,
            Self::Yuv420Planar => Some(ChromaLayout {
                u_offset: luma,
                v_offset: luma + cs * chroma_rows(height),
                row_pitch: cs,
                step: 1,
            }),
            Self::Yuv420SemiPlanar => Some(ChromaLayout {
                u_offset: luma,
                v_offset: luma + 1,
                row_pitch: cs * 2,
                step: 2,
            }),
        }
    }

    /// Short name as used by Y4M and in logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Yuv420Planar => "i420",
            Self::Yuv420SemiPlanar => "nv12",
        }
    }
}

const fn chroma_stride(stride: u32) -> usize {
    (stride as usize + 1) / 2
}

const fn chroma_rows(height: u32) -> usize {
    (height as usize + 1) / 2
}

/// Byte offsets of the chroma samples inside a 4:2:0 buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaLayout {
    /// Start of the first U sample
    pub u_offset: usize,
    /// Start of the first V sample
    pub v_offset: usize,
    /// Bytes between chroma rows
    pub row_pitch: usize,
    /// Bytes between horizontally adjacent chroma samples of one channel
    pub step: usize,
}

impl ChromaLayout {
    /// `(u, v)` byte indices for the block containing luma pixel `(x, y)`
    #[inline]
    #[must_use]
    pub const fn index(&self, x: usize, y: usize) -> (usize, usize) {
        let base = (y / 2) * self.row_pitch + (x / 2) * self.step;
        (self.u_offset + base, self.v_offset + base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len() {
        assert_eq!(OutputFormat::Rgba.buffer_len(4, 2), 32);
        assert_eq!(OutputFormat::Yuv420Planar.buffer_len(4, 2), 8 + 2 + 2);
        // odd dimensions round the chroma planes up
        assert_eq!(OutputFormat::Yuv420SemiPlanar.buffer_len(5, 3), 15 + 2 * 3 * 2);
    }

    #[test]
    fn test_planar_chroma_offsets() {
        // 8x4: Y = 32 bytes, U = 4x2, V = 4x2
        let layout = OutputFormat::Yuv420Planar.chroma_layout(8, 4).expect("yuv");
        assert_eq!(layout.index(0, 0), (32, 40));
        assert_eq!(layout.index(6, 2), (32 + 4 + 3, 40 + 4 + 3));
    }

    #[test]
    fn test_semi_planar_chroma_offsets() {
        let layout = OutputFormat::Yuv420SemiPlanar.chroma_layout(8, 4).expect("yuv");
        assert_eq!(layout.index(0, 0), (32, 33));
        // row 1 of the UV plane starts one luma stride later
        assert_eq!(layout.index(2, 2), (32 + 8 + 2, 33 + 8 + 2));
    }

    #[test]
    fn test_packed_has_no_chroma() {
        assert!(OutputFormat::Bgra.chroma_layout(8, 4).is_none());
        assert_eq!(OutputFormat::Bgra.packed_layout(), Some(PixelLayout::Bgra));
        assert!(OutputFormat::Yuv420Planar.is_yuv());
    }
}
