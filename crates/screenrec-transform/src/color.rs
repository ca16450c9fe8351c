//! Colour arithmetic
//!
//! Integer BT.601 studio-swing RGB to YUV, and the red/blue channel swap for
//! packed pixels. Both are bit-exact: output is fully determined by the input
//! bytes.

/// Convert one RGB pixel to `(Y, U, V)`
///
/// ```text
/// Y = ((  66R + 129G +  25B + 128) >> 8) +  16
/// U = (( -38R -  74G + 112B + 128) >> 8) + 128
/// V = (( 112R -  94G -  18B + 128) >> 8) + 128
/// ```
///
/// The shift is arithmetic, so negative intermediates round toward minus
/// infinity. Results always land in `16..=240`.
#[inline]
#[must_use]
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));

    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;

    (y as u8, u as u8, v as u8)
}

/// Exchange the bytes at positions 0 and 2 of a little-endian pixel word
#[inline]
#[must_use]
pub const fn swap_red_blue(color: u32) -> u32 {
    (color & 0xFF00_FF00) | ((color >> 16) & 0xFF) | ((color << 16) & 0x00FF_0000)
}

/// Luma of black
pub const Y_BLACK: u8 = 16;

/// Chroma of any grey
pub const CHROMA_NEUTRAL: u8 = 128;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primaries() {
        assert_eq!(rgb_to_yuv(255, 0, 0), (82, 90, 240));
        assert_eq!(rgb_to_yuv(0, 255, 0), (144, 54, 34));
        assert_eq!(rgb_to_yuv(0, 0, 255), (41, 240, 110));
    }

    #[test]
    fn test_greys() {
        assert_eq!(rgb_to_yuv(255, 255, 255), (235, 128, 128));
        assert_eq!(rgb_to_yuv(0, 0, 0), (Y_BLACK, CHROMA_NEUTRAL, CHROMA_NEUTRAL));
    }

    #[test]
    fn test_swap_red_blue() {
        let rgba = u32::from_le_bytes([0x11, 0x22, 0x33, 0x44]);
        let swapped = swap_red_blue(rgba);
        assert_eq!(swapped.to_le_bytes(), [0x33, 0x22, 0x11, 0x44]);
        assert_eq!(swap_red_blue(swapped), rgba);
    }
}
