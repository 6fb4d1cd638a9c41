//! Linux framebuffer device (`/dev/fbN`) mapped into memory.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::Result;
use memmap2::{MmapMut, MmapOptions};
use thiserror::Error;
use tracing::{debug, info};

use crate::pixel::{Channel, Format, PixelBuffer, Rect, Size};
use crate::surface::{blit_centered, Surface};

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
const FBIOGET_FSCREENINFO: libc::c_ulong = 0x4602;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct VarScreenInfo {
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

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct FixScreenInfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
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

#[derive(Debug, Error)]
pub enum FramebufferError {
    #[error("failed to open framebuffer device {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{request} failed on {path:?}")]
    Ioctl {
        path: PathBuf,
        request: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to map {len} bytes of framebuffer memory")]
    Map {
        len: usize,
        #[source]
        source: io::Error,
    },
    #[error("unsupported framebuffer depth of {0} bits per pixel")]
    UnsupportedDepth(u32),
    #[error("framebuffer reports a line length of {line_length} bytes for a {width} pixel row")]
    BadGeometry { line_length: u32, width: u32 },
}

/// An open framebuffer. The mapped memory is cleared when this is dropped;
/// unmapping and closing follow from the field drops.
pub struct Framebuffer {
    path: PathBuf,
    var_info: VarScreenInfo,
    fix_info: FixScreenInfo,
    buffer: PixelBuffer<MmapMut>,
    _file: File,
}

impl Framebuffer {
    pub fn open(path: &Path) -> Result<Self, FramebufferError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| FramebufferError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let mut var_info = VarScreenInfo::default();
        ioctl(&file, path, FBIOGET_VSCREENINFO, "FBIOGET_VSCREENINFO", &mut var_info)?;
        let mut fix_info = FixScreenInfo::default();
        ioctl(&file, path, FBIOGET_FSCREENINFO, "FBIOGET_FSCREENINFO", &mut fix_info)?;

        let format = format_from(&var_info)?;
        let allocated = Size::new(var_info.xres_virtual, var_info.yres_virtual);
        let len = fix_info.line_length as usize * allocated.height as usize;

        // SAFETY: the mapping is backed by the device file, which lives as
        // long as the mapping. No other code in this process maps it.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }
            .map_err(|source| FramebufferError::Map { len, source })?;
        let buffer = PixelBuffer::wrap(allocated, format, fix_info.line_length as usize, map)
            .ok_or(FramebufferError::BadGeometry {
                line_length: fix_info.line_length,
                width: allocated.width,
            })?;

        info!(
            device = %path.display(),
            width = var_info.xres,
            height = var_info.yres,
            depth = var_info.bits_per_pixel,
            "opened framebuffer"
        );

        Ok(Self {
            path: path.to_path_buf(),
            var_info,
            fix_info,
            buffer,
            _file: file,
        })
    }

    /// Size of the area allocated in memory, which may exceed the visible
    /// size.
    pub fn allocated_size(&self) -> Size {
        self.buffer.size()
    }

    /// Origin of the visible window inside the allocated area.
    pub fn offset(&self) -> (u32, u32) {
        (self.var_info.xoffset, self.var_info.yoffset)
    }

    pub fn debug_info(&self) -> String {
        let var = &self.var_info;
        let fix = &self.fix_info;
        let id_len = fix.id.iter().position(|&b| b == 0).unwrap_or(fix.id.len());
        let id = String::from_utf8_lossy(&fix.id[..id_len]);

        let mut out = String::new();
        let _ = writeln!(out, "device:        {}", self.path.display());
        let _ = writeln!(out, "id:            {}", id);
        let _ = writeln!(out, "visible:       {}x{}", var.xres, var.yres);
        let _ = writeln!(
            out,
            "virtual:       {}x{}",
            var.xres_virtual, var.yres_virtual
        );
        let _ = writeln!(out, "offset:        {},{}", var.xoffset, var.yoffset);
        let _ = writeln!(out, "bits/pixel:    {}", var.bits_per_pixel);
        let _ = writeln!(out, "grayscale:     {}", var.grayscale);
        for (name, field) in [
            ("red", var.red),
            ("green", var.green),
            ("blue", var.blue),
            ("transp", var.transp),
        ] {
            let _ = writeln!(
                out,
                "{:<15}offset {} length {} msb_right {}",
                format!("{}:", name),
                field.offset,
                field.length,
                field.msb_right
            );
        }
        let _ = writeln!(out, "line length:   {}", fix.line_length);
        let _ = writeln!(out, "memory:        {} bytes", fix.smem_len);
        let _ = writeln!(out, "visual:        {}", fix.visual);
        let _ = writeln!(out, "rotate:        {}", var.rotate);
        out
    }
}

impl Surface for Framebuffer {
    fn size(&self) -> Size {
        Size::new(self.var_info.xres, self.var_info.yres)
    }

    fn format(&self) -> Format {
        self.buffer.format()
    }

    fn render(&mut self, src: &PixelBuffer, rect: Rect) -> Result<()> {
        let visible = self.size();
        let origin = self.offset();
        blit_centered(&mut self.buffer, origin, visible, src, rect)
    }

    fn write_pixel(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8) {
        let visible = self.size();
        if x >= visible.width || y >= visible.height {
            return;
        }
        let (ox, oy) = self.offset();
        self.buffer.write_pixel(ox + x, oy + y, r, g, b);
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        debug!(device = %self.path.display(), "clearing framebuffer");
        self.buffer.clear();
    }
}

fn ioctl<T>(
    file: &File,
    path: &Path,
    request: libc::c_ulong,
    name: &'static str,
    out: &mut T,
) -> Result<(), FramebufferError> {
    // SAFETY: `out` is a repr(C) struct matching the kernel layout expected
    // by `request`.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as _, out as *mut T) };
    if rc < 0 {
        return Err(FramebufferError::Ioctl {
            path: path.to_path_buf(),
            request: name,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

fn format_from(info: &VarScreenInfo) -> Result<Format, FramebufferError> {
    if info.bits_per_pixel == 0 || info.bits_per_pixel > 32 {
        return Err(FramebufferError::UnsupportedDepth(info.bits_per_pixel));
    }
    Ok(Format {
        depth: info.bits_per_pixel,
        red: Channel::new(info.red.offset, info.red.length),
        green: Channel::new(info.green.offset, info.green.length),
        blue: Channel::new(info.blue.offset, info.blue.length),
    })
}
