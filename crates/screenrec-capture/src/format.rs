//! Source pixel layouts
//!
//! Display surfaces hand out 32-bit packed pixels. The only thing that varies
//! between compositors and framebuffer drivers is where red and blue sit
//! inside the word.

/// Byte order of a packed 32-bit source pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelLayout {
    /// Bytes in memory: R, G, B, A
    #[default]
    Rgba,
    /// Bytes in memory: B, G, R, A
    Bgra,
}

impl PixelLayout {
    /// Bytes per pixel (always 4 for packed layouts)
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Split a pixel into `(r, g, b)` according to this layout
    #[inline]
    #[must_use]
    pub fn rgb(self, px: &[u8]) -> (u8, u8, u8) {
        match self {
            Self::Rgba => (px[0], px[1], px[2]),
            Self::Bgra => (px[2], px[1], px[0]),
        }
    }

    /// Detect the layout from the red channel bit offset of a 32 bpp surface
    ///
    /// Returns `None` for offsets that are neither RGBA (0) nor BGRA (16).
    #[must_use]
    pub const fn from_red_offset(offset: u32) -> Option<Self> {
        match offset {
            0 => Some(Self::Rgba),
            16 => Some(Self::Bgra),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_extraction() {
        let px = [10u8, 20, 30, 255];
        assert_eq!(PixelLayout::Rgba.rgb(&px), (10, 20, 30));
        assert_eq!(PixelLayout::Bgra.rgb(&px), (30, 20, 10));
    }

    #[test]
    fn test_from_red_offset() {
        assert_eq!(PixelLayout::from_red_offset(0), Some(PixelLayout::Rgba));
        assert_eq!(PixelLayout::from_red_offset(16), Some(PixelLayout::Bgra));
        assert_eq!(PixelLayout::from_red_offset(8), None);
    }
}
