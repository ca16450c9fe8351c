//! Frame conversion
//!
//! [`FrameTransformer`] is planned once per session from a [`Geometry`] and an
//! [`OutputFormat`], then applied to every captured frame. Orientation
//! (identity or rotate view) and colour conversion (packed copy, packed with
//! red/blue swap, YUV 4:2:0 planar or semi-planar) compose freely; every
//! combination is supported, with or without padding.
//!
//! When the picture is a straight copy of a tightly packed source in the same
//! byte order, a single `copy_from_slice` replaces the per-pixel loop. Both
//! paths produce identical bytes.

use screenrec_capture::RawFrame;
use tracing::{debug, info};

use crate::buffer::VideoFrameBuffer;
use crate::color::{rgb_to_yuv, swap_red_blue};
use crate::error::{Result, TransformError};
use crate::format::OutputFormat;
use crate::geometry::Geometry;

/// Per-session frame converter
#[derive(Debug, Clone)]
pub struct FrameTransformer {
    geometry: Geometry,
    format: OutputFormat,
    stride: u32,
    fast_path: bool,
}

impl FrameTransformer {
    /// Plan a conversion into tightly packed output frames
    pub fn new(geometry: Geometry, format: OutputFormat) -> Result<Self> {
        Self::with_stride(geometry, format, geometry.video().width)
    }

    /// Plan a conversion into output frames with a custom row pitch
    pub fn with_stride(geometry: Geometry, format: OutputFormat, stride: u32) -> Result<Self> {
        let video = geometry.video();
        if stride < video.width {
            return Err(TransformError::StrideTooSmall {
                stride,
                width: video.width,
            });
        }

        info!(
            "Frame transform: {}x{} -> {}x{} {} (stride {}, rotate_view {})",
            geometry.input().width,
            geometry.input().height,
            video.width,
            video.height,
            format.name(),
            stride,
            geometry.rotate_view()
        );

        Ok(Self {
            geometry,
            format,
            stride,
            fast_path: true,
        })
    }

    /// Always use the per-pixel loops
    #[must_use]
    pub fn without_fast_path(mut self) -> Self {
        self.fast_path = false;
        self
    }

    /// Geometry this transformer was planned for
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Output pixel format
    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Output row pitch
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Allocate an output frame matching this plan
    pub fn allocate(&self) -> Result<VideoFrameBuffer> {
        let video = self.geometry.video();
        VideoFrameBuffer::with_stride(self.format, video.width, video.height, self.stride)
    }

    /// `true` when `frame` can be copied with a single memcpy
    #[must_use]
    pub fn can_copy(&self, frame: &RawFrame<'_>) -> bool {
        self.fast_path
            && self.geometry.is_identity()
            && self.stride == self.geometry.video().width
            && frame.is_contiguous()
            && self.format.packed_layout() == Some(frame.layout())
    }

    /// Write `frame` into the interior of `out`
    ///
    /// Padding bytes of `out` are left untouched.
    pub fn transform(&self, frame: &RawFrame<'_>, out: &mut VideoFrameBuffer) -> Result<()> {
        self.check(frame, out)?;

        if self.can_copy(frame) {
            let len = out.data().len();
            out.data_mut().copy_from_slice(&frame.data()[..len]);
            return Ok(());
        }

        match self.format.packed_layout() {
            Some(layout) => self.copy_packed(frame, out, layout != frame.layout()),
            None => self.convert_yuv(frame, out),
        }
        Ok(())
    }

    fn check(&self, frame: &RawFrame<'_>, out: &VideoFrameBuffer) -> Result<()> {
        let input = self.geometry.input();
        if frame.width() != input.width || frame.height() != input.height {
            debug!("Captured frame changed size, refusing to transform");
            return Err(TransformError::FrameMismatch {
                expected_width: input.width,
                expected_height: input.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let video = self.geometry.video();
        if out.format() != self.format
            || out.width() != video.width
            || out.height() != video.height
            || out.stride() != self.stride
        {
            return Err(TransformError::buffer_mismatch(format!(
                "got {} {}x{} stride {}, planned {} {}x{} stride {}",
                out.format().name(),
                out.width(),
                out.height(),
                out.stride(),
                self.format.name(),
                video.width,
                video.height,
                self.stride
            )));
        }
        Ok(())
    }

    fn copy_packed(&self, frame: &RawFrame<'_>, out: &mut VideoFrameBuffer, swap: bool) {
        let in_stride = frame.stride();
        let out_stride = self.stride as usize;
        let src = frame.data();
        let dst = out.data_mut();

        for y in self.geometry.interior_rows() {
            let row = y as usize * out_stride;
            for x in self.geometry.interior_columns() {
                let s = self.geometry.source_index(x, y, in_stride) * 4;
                let color = u32::from_le_bytes([src[s], src[s + 1], src[s + 2], src[s + 3]]);
                let color = if swap { swap_red_blue(color) } else { color };

                let d = (row + x as usize) * 4;
                dst[d..d + 4].copy_from_slice(&color.to_le_bytes());
            }
        }
    }

    fn convert_yuv(&self, frame: &RawFrame<'_>, out: &mut VideoFrameBuffer) {
        let Some(chroma) = out.chroma_layout() else {
            return;
        };
        let in_stride = frame.stride();
        let out_stride = self.stride as usize;
        let layout = frame.layout();
        let dst = out.data_mut();

        for y in self.geometry.interior_rows() {
            let row = y as usize * out_stride;
            for x in self.geometry.interior_columns() {
                let s = self.geometry.source_index(x, y, in_stride);
                let (r, g, b) = layout.rgb(frame.pixel_at(s));
                let (luma, u, v) = rgb_to_yuv(r, g, b);

                dst[row + x as usize] = luma;
                if x % 2 == 0 && y % 2 == 0 {
                    let (ui, vi) = chroma.index(x as usize, y as usize);
                    dst[ui] = u;
                    dst[vi] = v;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use screenrec_capture::{gradient_pixel, FrameSize, FrameSource, PixelLayout, SyntheticSource};

    use super::*;
    use crate::color::{CHROMA_NEUTRAL, Y_BLACK};
    use crate::geometry::Padding;

    /// Packed frame bytes where each pixel is produced by `paint`
    fn frame_bytes(width: u32, height: u32, layout: PixelLayout, paint: impl Fn(u32, u32) -> (u8, u8, u8)) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let (r, g, b) = paint(x, y);
                match layout {
                    PixelLayout::Rgba => data.extend_from_slice(&[r, g, b, 255]),
                    PixelLayout::Bgra => data.extend_from_slice(&[b, g, r, 255]),
                }
            }
        }
        data
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn geometry(w: u32, h: u32, pad: (u32, u32), rotation: u32, vertical: bool) -> Geometry {
        Geometry::resolve(FrameSize::new(w, h), Padding::new(pad.0, pad.1), rotation, vertical).expect("geometry")
    }

    #[test]
    fn test_fast_path_matches_general_path() {
        init_tracing();
        for layout in [PixelLayout::Rgba, PixelLayout::Bgra] {
            let mut source = SyntheticSource::new(64, 48).with_layout(layout);
            source.refresh(FrameSize::default()).expect("refresh");
            let frame = source.current_frame().expect("frame");

            let format = match layout {
                PixelLayout::Rgba => OutputFormat::Rgba,
                PixelLayout::Bgra => OutputFormat::Bgra,
            };
            let fast = FrameTransformer::new(geometry(64, 48, (0, 0), 0, true), format).expect("plan");
            let slow = fast.clone().without_fast_path();
            assert!(fast.can_copy(&frame));
            assert!(!slow.can_copy(&frame));

            let mut a = fast.allocate().expect("alloc");
            let mut b = slow.allocate().expect("alloc");
            fast.transform(&frame, &mut a).expect("fast");
            slow.transform(&frame, &mut b).expect("slow");
            assert_eq!(a.data(), b.data());
        }
    }

    #[test]
    fn test_fast_path_not_taken_for_padded_stride() {
        let mut source = SyntheticSource::new(64, 48).with_stride(70);
        source.refresh(FrameSize::default()).expect("refresh");
        let frame = source.current_frame().expect("frame");

        let plan = FrameTransformer::new(geometry(64, 48, (0, 0), 0, true), OutputFormat::Rgba).expect("plan");
        assert!(!plan.can_copy(&frame));

        let mut out = plan.allocate().expect("alloc");
        plan.transform(&frame, &mut out).expect("transform");
        let px = out.packed_pixel(63, 47).expect("packed");
        let (r, g, b) = gradient_pixel(63, 47, 0);
        assert_eq!(px, [r, g, b, 255]);
    }

    #[test]
    fn test_rotation_follows_index_formula() {
        init_tracing();
        let marker = (255, 0, 255);
        // (input w, input h, rotation, allow vertical): odd, even and landscape-on-rotated sizes
        for (w, h, rotation, vertical) in [(5, 7, 0, false), (6, 8, 180, false), (9, 4, 90, true)] {
            let paint = |x: u32, y: u32| if (x, y) == (0, 0) { marker } else { gradient_pixel(x, y, 3) };
            let data = frame_bytes(w, h, PixelLayout::Rgba, paint);
            let frame = RawFrame::new(&data, w, h, w, PixelLayout::Rgba).expect("frame");

            let g = geometry(w, h, (0, 0), rotation, vertical);
            assert!(g.rotate_view(), "{}x{} should rotate", w, h);
            let plan = FrameTransformer::new(g, OutputFormat::Rgba).expect("plan");
            let mut out = plan.allocate().expect("alloc");
            plan.transform(&frame, &mut out).expect("transform");

            let video = g.video();
            assert_eq!(video, FrameSize::new(h, w));

            // input (0, 0) is index 0: x = 0, y = video_height - 1
            let px = out.packed_pixel(0, video.height - 1).expect("packed");
            assert_eq!(px, [marker.0, marker.1, marker.2, 255]);

            for y in 0..video.height {
                for x in 0..video.width {
                    let s = g.source_index(x, y, w) * 4;
                    assert_eq!(out.packed_pixel(x, y).expect("packed")[..], data[s..s + 4], "({}, {})", x, y);
                }
            }
        }
    }

    #[test]
    fn test_yuv_primaries_both_orders() {
        let cases = [
            ((255, 0, 0), (82, 90, 240)),
            ((0, 255, 0), (144, 54, 34)),
            ((0, 0, 255), (41, 240, 110)),
            ((255, 255, 255), (235, 128, 128)),
        ];

        for layout in [PixelLayout::Rgba, PixelLayout::Bgra] {
            for format in [OutputFormat::Yuv420Planar, OutputFormat::Yuv420SemiPlanar] {
                for (rgb, yuv) in cases {
                    let data = frame_bytes(4, 2, layout, |_, _| rgb);
                    let frame = RawFrame::new(&data, 4, 2, 4, layout).expect("frame");

                    let plan = FrameTransformer::new(geometry(4, 2, (0, 0), 0, true), format).expect("plan");
                    let mut out = plan.allocate().expect("alloc");
                    plan.transform(&frame, &mut out).expect("transform");

                    for x in 0..4 {
                        assert_eq!(out.yuv_pixel(x, 1), Some(yuv), "{:?} {:?} {:?}", layout, format, rgb);
                    }
                }
            }
        }
    }

    #[test]
    fn test_packed_channel_swap() {
        let data = frame_bytes(4, 2, PixelLayout::Rgba, |_, _| (10, 20, 30));
        let frame = RawFrame::new(&data, 4, 2, 4, PixelLayout::Rgba).expect("frame");

        let plan = FrameTransformer::new(geometry(4, 2, (0, 0), 0, true), OutputFormat::Bgra).expect("plan");
        assert!(!plan.can_copy(&frame));
        let mut out = plan.allocate().expect("alloc");
        plan.transform(&frame, &mut out).expect("transform");
        assert_eq!(out.packed_pixel(1, 1), Some([30, 20, 10, 255]));
    }

    #[test]
    fn test_padding_boundary_identity() {
        // padding on the width axis only
        let data = frame_bytes(8, 4, PixelLayout::Rgba, |_, _| (200, 100, 50));
        let frame = RawFrame::new(&data, 8, 4, 8, PixelLayout::Rgba).expect("frame");

        let g = geometry(8, 4, (2, 0), 0, false);
        let plan = FrameTransformer::new(g, OutputFormat::Rgba).expect("plan");
        let mut out = plan.allocate().expect("alloc");
        plan.transform(&frame, &mut out).expect("transform");

        assert_eq!(g.video(), FrameSize::new(12, 4));
        for y in 0..4 {
            assert_eq!(out.packed_pixel(1, y), Some([0, 0, 0, 0]));
            assert_eq!(out.packed_pixel(2, y), Some([200, 100, 50, 255]));
            assert_eq!(out.packed_pixel(9, y), Some([200, 100, 50, 255]));
            assert_eq!(out.packed_pixel(10, y), Some([0, 0, 0, 0]));
        }
    }

    #[test]
    fn test_padding_boundary_rotated_yuv() {
        // portrait 4x6 source, rotate view, padding on the height axis only
        let data = frame_bytes(4, 6, PixelLayout::Bgra, |_, _| (255, 0, 0));
        let frame = RawFrame::new(&data, 4, 6, 4, PixelLayout::Bgra).expect("frame");

        let g = geometry(4, 6, (0, 1), 0, false);
        assert!(g.rotate_view());
        assert_eq!(g.video(), FrameSize::new(6, 6));
        assert_eq!(g.interior_rows(), 1..5);

        let plan = FrameTransformer::new(g, OutputFormat::Yuv420Planar).expect("plan");
        let mut out = plan.allocate().expect("alloc");
        plan.transform(&frame, &mut out).expect("transform");

        for x in 0..6 {
            assert_eq!(out.yuv_pixel(x, 0).map(|p| p.0), Some(Y_BLACK));
            assert_eq!(out.yuv_pixel(x, 1).map(|p| p.0), Some(82));
            assert_eq!(out.yuv_pixel(x, 4).map(|p| p.0), Some(82));
            assert_eq!(out.yuv_pixel(x, 5).map(|p| p.0), Some(Y_BLACK));
        }
        // chroma row 0 covers luma rows 0-1 and is only written from even rows
        assert_eq!(out.yuv_pixel(0, 0).map(|p| p.1), Some(CHROMA_NEUTRAL));
        assert_eq!(out.yuv_pixel(0, 2).map(|p| p.1), Some(90));
    }

    #[test]
    fn test_wider_output_stride() {
        let data = frame_bytes(4, 2, PixelLayout::Rgba, |x, y| gradient_pixel(x, y, 0));
        let frame = RawFrame::new(&data, 4, 2, 4, PixelLayout::Rgba).expect("frame");

        let plan = FrameTransformer::with_stride(geometry(4, 2, (0, 0), 0, true), OutputFormat::Rgba, 6).expect("plan");
        assert!(!plan.can_copy(&frame));
        let mut out = plan.allocate().expect("alloc");
        plan.transform(&frame, &mut out).expect("transform");

        let (r, g, b) = gradient_pixel(3, 1, 0);
        assert_eq!(out.packed_pixel(3, 1), Some([r, g, b, 255]));
        assert_eq!(out.packed_pixel(5, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let plan = FrameTransformer::new(geometry(4, 2, (0, 0), 0, true), OutputFormat::Rgba).expect("plan");

        let data = frame_bytes(2, 2, PixelLayout::Rgba, |_, _| (0, 0, 0));
        let small = RawFrame::new(&data, 2, 2, 2, PixelLayout::Rgba).expect("frame");
        let mut out = plan.allocate().expect("alloc");
        assert!(matches!(plan.transform(&small, &mut out), Err(TransformError::FrameMismatch { .. })));

        let data = frame_bytes(4, 2, PixelLayout::Rgba, |_, _| (0, 0, 0));
        let frame = RawFrame::new(&data, 4, 2, 4, PixelLayout::Rgba).expect("frame");
        let mut wrong = VideoFrameBuffer::new(OutputFormat::Yuv420Planar, 4, 2).expect("alloc");
        assert!(matches!(plan.transform(&frame, &mut wrong), Err(TransformError::BufferMismatch(_))));

        assert!(FrameTransformer::with_stride(geometry(4, 2, (0, 0), 0, true), OutputFormat::Rgba, 3).is_err());
    }
}
