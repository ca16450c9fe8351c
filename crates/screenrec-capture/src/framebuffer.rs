//! Linux framebuffer device source
//!
//! Maps `/dev/fbN` read-only and exposes the visible page as a [`RawFrame`].
//! Refreshing re-reads the variable screen info so that page flipping
//! (`yoffset` panning) is followed.
//!
//! Only 32 bpp surfaces are supported. The red bitfield offset decides between
//! RGBA and BGRA byte order. Rows are `line_length` bytes apart, which may be
//! wider than the visible width.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::ptr::NonNull;

use tracing::{debug, info, warn};

use crate::error::{CaptureError, Result};
use crate::format::PixelLayout;
use crate::frame::RawFrame;
use crate::source::{FrameSize, FrameSource};

/// Default framebuffer device
pub const DEFAULT_FB_DEVICE: &str = "/dev/fb0";

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
#[allow(dead_code)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

/// `struct fb_var_screeninfo` from `<linux/fb.h>`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
#[allow(dead_code)]
struct FbVarScreenInfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// `struct fb_fix_screeninfo` from `<linux/fb.h>`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
#[allow(dead_code)]
struct FbFixScreenInfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    kind: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

mod ioctl {
    use super::{FbFixScreenInfo, FbVarScreenInfo};

    const FBIOGET_VSCREENINFO: u32 = 0x4600;
    const FBIOGET_FSCREENINFO: u32 = 0x4602;

    nix::ioctl_read_bad!(fbioget_vscreeninfo, FBIOGET_VSCREENINFO, FbVarScreenInfo);
    nix::ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, FbFixScreenInfo);
}

/// Row pitch in pixels
///
/// Taken from `line_length`; drivers that leave it at zero get the virtual
/// width.
fn stride_pixels(fix: &FbFixScreenInfo, var: &FbVarScreenInfo) -> u32 {
    let bytes_pp = (var.bits_per_pixel / 8).max(1);
    match fix.line_length / bytes_pp {
        0 => var.xres_virtual.max(var.xres),
        pitch => pitch.max(var.xres),
    }
}

/// Byte offset of the visible page inside the mapping
fn page_offset(var: &FbVarScreenInfo, stride: u32) -> usize {
    let bytes_pp = (var.bits_per_pixel / 8) as usize;
    (var.yoffset as usize * stride as usize + var.xoffset as usize) * bytes_pp
}

/// Read-only shared mapping of the device memory
struct Mapping {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is PROT_READ and only ever read through shared slices.
unsafe impl Send for Mapping {}

impl Mapping {
    fn new(file: &File, len: usize) -> Result<Self> {
        // SAFETY: null hint, valid fd, PROT_READ + MAP_SHARED; the result is
        // checked against MAP_FAILED before use.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(CaptureError::MapFailed(std::io::Error::last_os_error().to_string()));
        }

        let base = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| CaptureError::MapFailed("null mapping".to_string()))?;
        Ok(Self { base, len })
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: base/len describe a live mapping owned by self. The device
        // may update pixels concurrently; readers only observe a torn frame.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: base/len come from a successful mmap and are unmapped once.
        let rc = unsafe { libc::munmap(self.base.as_ptr().cast(), self.len) };
        if rc != 0 {
            warn!("munmap failed: {}", std::io::Error::last_os_error());
        }
    }
}

/// Capture source reading a Linux framebuffer device
pub struct FramebufferSource {
    file: Option<File>,
    mapping: Option<Mapping>,
    info: FbVarScreenInfo,
    layout: PixelLayout,
    stride: u32,
    offset: usize,
    ready: bool,
}

impl FramebufferSource {
    /// Open [`DEFAULT_FB_DEVICE`]
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_FB_DEVICE)
    }

    /// Open and map a framebuffer device
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening framebuffer {}", path.display());

        let file = File::open(path).map_err(|source| CaptureError::DeviceOpen {
            path: path.display().to_string(),
            source,
        })?;

        let info = query_screen_info(&file)?;
        let fix = query_fixed_info(&file)?;
        if info.bits_per_pixel != 32 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} bits per pixel",
                info.bits_per_pixel
            )));
        }

        let layout = PixelLayout::from_red_offset(info.red.offset).ok_or_else(|| {
            CaptureError::UnsupportedFormat(format!("red channel at bit {}", info.red.offset))
        })?;

        let stride = stride_pixels(&fix, &info);
        let map_len = match fix.smem_len {
            0 => stride as usize * info.yres_virtual.max(info.yres) as usize * 4,
            len => len as usize,
        };
        let mapping = Mapping::new(&file, map_len)?;

        debug!(
            "Framebuffer {}x{} (virtual {}x{}, stride {} px), layout {:?}",
            info.xres, info.yres, info.xres_virtual, info.yres_virtual, stride, layout
        );

        Ok(Self {
            file: Some(file),
            mapping: Some(mapping),
            info,
            layout,
            stride,
            offset: 0,
            ready: false,
        })
    }

    fn frame_len(&self) -> usize {
        RawFrame::required_len(self.info.xres, self.info.yres, self.stride, self.layout)
    }
}

fn query_screen_info(file: &File) -> Result<FbVarScreenInfo> {
    let mut info = FbVarScreenInfo::default();
    // SAFETY: fd is open for the duration of the call and `info` is a
    // correctly sized, writable fb_var_screeninfo.
    unsafe { ioctl::fbioget_vscreeninfo(file.as_raw_fd(), &mut info) }
        .map_err(|e| CaptureError::DeviceQuery(format!("FBIOGET_VSCREENINFO: {}", e)))?;
    Ok(info)
}

fn query_fixed_info(file: &File) -> Result<FbFixScreenInfo> {
    let mut fix = FbFixScreenInfo::default();
    // SAFETY: fd is open for the duration of the call and `fix` is a
    // correctly sized, writable fb_fix_screeninfo.
    unsafe { ioctl::fbioget_fscreeninfo(file.as_raw_fd(), &mut fix) }
        .map_err(|e| CaptureError::DeviceQuery(format!("FBIOGET_FSCREENINFO: {}", e)))?;
    Ok(fix)
}

impl FrameSource for FramebufferSource {
    fn refresh(&mut self, _requested: FrameSize) -> Result<()> {
        let file = self.file.as_ref().ok_or(CaptureError::Released)?;
        let info = query_screen_info(file)?;
        let fix = query_fixed_info(file)?;

        self.stride = stride_pixels(&fix, &info);
        let offset = page_offset(&info, self.stride);
        self.info = info;

        let map_len = self.mapping.as_ref().map_or(0, |m| m.len);
        if offset + self.frame_len() > map_len {
            self.ready = false;
            return Err(CaptureError::refresh_failed(format!(
                "visible page at offset {} exceeds mapping of {} bytes",
                offset, map_len
            )));
        }

        self.offset = offset;
        self.ready = true;
        Ok(())
    }

    fn current_frame(&self) -> Option<RawFrame<'_>> {
        if !self.ready {
            return None;
        }
        let mapping = self.mapping.as_ref()?;
        let data = mapping.as_slice().get(self.offset..self.offset + self.frame_len())?;
        RawFrame::new(data, self.info.xres, self.info.yres, self.stride, self.layout).ok()
    }

    fn native_size(&self) -> Option<FrameSize> {
        Some(FrameSize::new(self.info.xres, self.info.yres))
    }

    fn release(&mut self) {
        debug!("Releasing framebuffer source");
        self.ready = false;
        self.mapping = None;
        self.file = None;
    }
}
