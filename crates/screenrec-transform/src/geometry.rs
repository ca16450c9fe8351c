//! Output geometry
//!
//! Decides how a captured surface maps into the encoded picture: output size,
//! letterbox padding and whether the axes are exchanged ("rotate view").
//!
//! # Decision table
//!
//! | Source | Rotation | Vertical allowed | Output | Rotate view |
//! |--------|----------|------------------|--------|-------------|
//! | portrait | 0 / 180 | yes | portrait, padding axes swapped | no |
//! | landscape | 90 / 270 | yes | portrait, padding axes swapped | yes |
//! | landscape | any other case | - | landscape | no |
//! | portrait or square | any other case | - | landscape | yes |
//!
//! Rotate view maps output pixel `(x, y)` to input pixel
//! `stride * (x - pad_w) + (video_height - pad_h - y - 1)`: a transpose and
//! flip that turns a portrait source into a landscape picture.

use std::ops::Range;

use screenrec_capture::FrameSize;
use tracing::debug;

use crate::error::{Result, TransformError};

/// Largest accepted video dimension
pub const MAX_DIMENSION: u32 = 16384;

/// Letterbox border added on each side of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    /// Columns added left and right
    pub width: u32,
    /// Rows added top and bottom
    pub height: u32,
}

impl Padding {
    /// Create a padding
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when no border is added
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    const fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

/// Resolved mapping from the captured surface to the encoded picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    input: FrameSize,
    padding: Padding,
    rotate_view: bool,
    video: FrameSize,
}

impl Geometry {
    /// Resolve the geometry for an input surface
    ///
    /// `rotation_degrees` is the display rotation (0, 90, 180 or 270).
    pub fn resolve(input: FrameSize, padding: Padding, rotation_degrees: u32, allow_vertical: bool) -> Result<Self> {
        if input.width == 0 || input.height == 0 {
            return Err(TransformError::invalid_geometry(format!(
                "input surface {}x{}",
                input.width, input.height
            )));
        }
        if rotation_degrees % 90 != 0 {
            return Err(TransformError::invalid_geometry(format!(
                "rotation {} is not a multiple of 90",
                rotation_degrees
            )));
        }

        let rotation = rotation_degrees % 360;
        let upright = rotation == 0 || rotation == 180;
        let (iw, ih) = (input.width, input.height);

        let (padding, rotate_view) = if allow_vertical && iw < ih && upright {
            (padding.swapped(), false)
        } else if allow_vertical && iw > ih && !upright {
            (padding.swapped(), true)
        } else if iw > ih {
            (padding, false)
        } else {
            (padding, true)
        };

        let (base_w, base_h) = if rotate_view { (ih, iw) } else { (iw, ih) };
        let video = FrameSize::new(
            padded(base_w, padding.width, "width")?,
            padded(base_h, padding.height, "height")?,
        );

        debug!(
            "Geometry: input {}x{}, rotation {}, padding {}x{}, rotate_view {}, video {}x{}",
            iw, ih, rotation, padding.width, padding.height, rotate_view, video.width, video.height
        );

        Ok(Self {
            input,
            padding,
            rotate_view,
            video,
        })
    }

    /// Captured surface size
    #[must_use]
    pub const fn input(&self) -> FrameSize {
        self.input
    }

    /// Effective padding (after any axis swap)
    #[must_use]
    pub const fn padding(&self) -> Padding {
        self.padding
    }

    /// `true` when the input axes are exchanged
    #[must_use]
    pub const fn rotate_view(&self) -> bool {
        self.rotate_view
    }

    /// Encoded picture size
    #[must_use]
    pub const fn video(&self) -> FrameSize {
        self.video
    }

    /// Rotation to record in the stream metadata
    ///
    /// Rotate view already turns the picture by a quarter, so the player must
    /// turn it one more quarter.
    #[must_use]
    pub const fn stream_rotation(&self, rotation_degrees: u32) -> u32 {
        if self.rotate_view {
            (rotation_degrees + 90) % 360
        } else {
            rotation_degrees % 360
        }
    }

    /// Output columns holding source pixels: `[pad_w, video_w - pad_w)`
    #[must_use]
    pub const fn interior_columns(&self) -> Range<u32> {
        self.padding.width..self.video.width - self.padding.width
    }

    /// Output rows holding source pixels: `[pad_h, video_h - pad_h)`
    #[must_use]
    pub const fn interior_rows(&self) -> Range<u32> {
        self.padding.height..self.video.height - self.padding.height
    }

    /// Input pixel index feeding output pixel `(x, y)` of the interior
    #[inline]
    #[must_use]
    pub const fn source_index(&self, x: u32, y: u32, input_stride: u32) -> usize {
        let col = (x - self.padding.width) as usize;
        if self.rotate_view {
            input_stride as usize * col + (self.video.height - self.padding.height - y - 1) as usize
        } else {
            (y - self.padding.height) as usize * input_stride as usize + col
        }
    }

    /// `true` when the interior is a straight copy of the whole input
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        !self.rotate_view && self.padding.is_zero()
    }
}

fn padded(base: u32, pad: u32, axis: &str) -> Result<u32> {
    pad.checked_mul(2)
        .and_then(|p| base.checked_add(p))
        .filter(|v| *v <= MAX_DIMENSION)
        .ok_or_else(|| {
            TransformError::invalid_geometry(format!(
                "video {} {} + 2x{} exceeds {}",
                axis, base, pad, MAX_DIMENSION
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(w: u32, h: u32, pad: (u32, u32), rotation: u32, vertical: bool) -> Geometry {
        Geometry::resolve(FrameSize::new(w, h), Padding::new(pad.0, pad.1), rotation, vertical).expect("valid geometry")
    }

    #[test]
    fn test_landscape_identity() {
        let g = resolve(640, 480, (0, 0), 0, true);
        assert!(!g.rotate_view());
        assert!(g.is_identity());
        assert_eq!(g.video(), FrameSize::new(640, 480));
    }

    #[test]
    fn test_portrait_kept_vertical() {
        let g = resolve(480, 640, (10, 4), 0, true);
        assert!(!g.rotate_view());
        assert_eq!(g.padding(), Padding::new(4, 10));
        assert_eq!(g.video(), FrameSize::new(488, 660));
    }

    #[test]
    fn test_portrait_normalized_to_landscape() {
        let g = resolve(480, 640, (10, 4), 0, false);
        assert!(g.rotate_view());
        assert_eq!(g.padding(), Padding::new(10, 4));
        assert_eq!(g.video(), FrameSize::new(660, 488));
    }

    #[test]
    fn test_landscape_on_rotated_display() {
        let g = resolve(640, 480, (0, 0), 90, true);
        assert!(g.rotate_view());
        assert_eq!(g.video(), FrameSize::new(480, 640));

        let g = resolve(640, 480, (0, 0), 270, false);
        assert!(!g.rotate_view());
        assert_eq!(g.video(), FrameSize::new(640, 480));
    }

    #[test]
    fn test_square_rotates() {
        let g = resolve(100, 100, (0, 0), 0, true);
        assert!(g.rotate_view());
    }

    #[test]
    fn test_stream_rotation() {
        let g = resolve(480, 640, (0, 0), 270, false);
        assert_eq!(g.stream_rotation(270), 0);
        let g = resolve(640, 480, (0, 0), 180, false);
        assert_eq!(g.stream_rotation(180), 180);
    }

    #[test]
    fn test_interior_ranges_half_open() {
        let g = resolve(8, 6, (2, 0), 0, false);
        assert_eq!(g.video(), FrameSize::new(12, 6));
        assert_eq!(g.interior_columns(), 2..10);
        assert_eq!(g.interior_rows(), 0..6);
    }

    #[test]
    fn test_source_index() {
        let g = resolve(8, 6, (1, 1), 0, false);
        assert_eq!(g.source_index(1, 1, 10), 0);
        assert_eq!(g.source_index(3, 2, 10), 12);

        // 4x6 portrait, rotate view: video 6x4
        let g = resolve(4, 6, (0, 0), 0, false);
        assert_eq!(g.video(), FrameSize::new(6, 4));
        assert_eq!(g.source_index(0, 0, 4), 3);
        assert_eq!(g.source_index(5, 3, 4), 20);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(Geometry::resolve(FrameSize::new(0, 10), Padding::default(), 0, true).is_err());
        assert!(Geometry::resolve(FrameSize::new(10, 10), Padding::default(), 45, true).is_err());
        assert!(Geometry::resolve(FrameSize::new(10, 10), Padding::new(u32::MAX, 0), 0, true).is_err());
    }
}
