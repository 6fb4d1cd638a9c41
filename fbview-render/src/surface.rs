use anyhow::{bail, Result};

use crate::pixel::{Format, PixelBuffer, Rect, Size};

/// A pixel-addressable display.
pub trait Surface {
    /// Visible size in pixels.
    fn size(&self) -> Size;

    fn format(&self) -> Format;

    /// Off-screen buffer in the display's own format.
    fn new_pixel_buffer(&self, size: Size) -> PixelBuffer {
        PixelBuffer::new(size, self.format())
    }

    /// Shows `rect` of `src`. A rect smaller than the display is centred;
    /// pixels outside the centred rect are left alone.
    fn render(&mut self, src: &PixelBuffer, rect: Rect) -> Result<()>;

    /// Writes one pixel in visible coordinates. Out of range writes are
    /// dropped.
    fn write_pixel(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8);
}

pub(crate) fn blit_centered<D>(
    target: &mut PixelBuffer<D>,
    origin: (u32, u32),
    visible: Size,
    src: &PixelBuffer,
    rect: Rect,
) -> Result<()>
where
    D: AsRef<[u8]> + AsMut<[u8]>,
{
    if rect.width > visible.width || rect.height > visible.height {
        bail!(
            "render rect {}x{} exceeds screen {}x{}",
            rect.width,
            rect.height,
            visible.width,
            visible.height
        );
    }
    let dest_x = origin.0 + (visible.width - rect.width) / 2;
    let dest_y = origin.1 + (visible.height - rect.height) / 2;
    src.copy_rect(rect, target, dest_x, dest_y);
    Ok(())
}

/// A display kept in ordinary memory.
pub struct MemorySurface {
    buffer: PixelBuffer,
}

impl MemorySurface {
    pub fn new(size: Size, format: Format) -> Self {
        Self {
            buffer: PixelBuffer::new(size, format),
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }
}

impl Surface for MemorySurface {
    fn size(&self) -> Size {
        self.buffer.size()
    }

    fn format(&self) -> Format {
        self.buffer.format()
    }

    fn render(&mut self, src: &PixelBuffer, rect: Rect) -> Result<()> {
        let visible = self.buffer.size();
        blit_centered(&mut self.buffer, (0, 0), visible, src, rect)
    }

    fn write_pixel(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8) {
        let size = self.buffer.size();
        if x < size.width && y < size.height {
            self.buffer.write_pixel(x, y, r, g, b);
        }
    }
}
