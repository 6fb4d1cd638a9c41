//! Device independent pixel storage.
//!
//! A [`PixelBuffer`] is a row-major byte store plus a [`Format`] describing
//! how one pixel word is laid out. Converting between formats always goes
//! through 8-bit RGB, so any two buffers can be blitted onto each other.

use rayon::prelude::*;

use fbview_core::RenderImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Position and width of one colour channel inside a pixel word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channel {
    pub offset: u32,
    pub length: u32,
}

impl Channel {
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    fn pack(&self, value: u8) -> u32 {
        if self.length == 0 {
            return 0;
        }
        let bits = self.length.min(8);
        (u32::from(value) >> (8 - bits)) << self.offset
    }

    fn unpack(&self, word: u32) -> u8 {
        if self.length == 0 {
            return 0;
        }
        let bits = self.length.min(8);
        let mask = (1u32 << bits) - 1;
        (((word >> self.offset) & mask) << (8 - bits)) as u8
    }
}

/// Pixel layout: bits per pixel plus the placement of each channel.
/// Words are stored little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub depth: u32,
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

impl Format {
    /// Byte order R, G, B, A; the layout decoded pages arrive in.
    pub const RGBA8888: Format = Format {
        depth: 32,
        red: Channel::new(0, 8),
        green: Channel::new(8, 8),
        blue: Channel::new(16, 8),
    };

    /// Byte order B, G, R, X; most 32-bit framebuffers.
    pub const BGRX8888: Format = Format {
        depth: 32,
        red: Channel::new(16, 8),
        green: Channel::new(8, 8),
        blue: Channel::new(0, 8),
    };

    pub const RGB565: Format = Format {
        depth: 16,
        red: Channel::new(11, 5),
        green: Channel::new(5, 6),
        blue: Channel::new(0, 5),
    };

    pub fn bytes_per_pixel(&self) -> usize {
        self.depth.div_ceil(8) as usize
    }

    pub fn pack(&self, r: u8, g: u8, b: u8) -> u32 {
        self.red.pack(r) | self.green.pack(g) | self.blue.pack(b)
    }

    pub fn unpack(&self, word: u32) -> (u8, u8, u8) {
        (
            self.red.unpack(word),
            self.green.unpack(word),
            self.blue.unpack(word),
        )
    }

    fn read_word(&self, bytes: &[u8]) -> u32 {
        let mut word = [0u8; 4];
        let len = self.bytes_per_pixel().min(4);
        word[..len].copy_from_slice(&bytes[..len]);
        u32::from_le_bytes(word)
    }

    fn write_word(&self, bytes: &mut [u8], word: u32) {
        let len = self.bytes_per_pixel().min(4);
        bytes[..len].copy_from_slice(&word.to_le_bytes()[..len]);
    }
}

/// A row-major pixel store. `S` is the backing memory: an owned `Vec<u8>`
/// for off-screen buffers, or the mapped device memory for the screen.
pub struct PixelBuffer<S = Vec<u8>> {
    size: Size,
    format: Format,
    stride: usize,
    data: S,
}

impl PixelBuffer<Vec<u8>> {
    /// Allocates a zeroed, tightly packed buffer.
    pub fn new(size: Size, format: Format) -> Self {
        let stride = size.width as usize * format.bytes_per_pixel();
        Self {
            size,
            format,
            stride,
            data: vec![0; stride * size.height as usize],
        }
    }

    /// Takes ownership of a decoded page without copying its pixels.
    pub fn from_rgba(image: RenderImage) -> Self {
        let size = Size::new(image.width, image.height);
        let stride = size.width as usize * Format::RGBA8888.bytes_per_pixel();
        let mut data = image.pixels;
        data.resize(stride * size.height as usize, 0);
        Self {
            size,
            format: Format::RGBA8888,
            stride,
            data,
        }
    }
}

impl<S: AsRef<[u8]>> PixelBuffer<S> {
    /// Wraps existing memory. `stride` may exceed `width * bytes_per_pixel`
    /// when the device pads its lines.
    pub fn wrap(size: Size, format: Format, stride: usize, data: S) -> Option<Self> {
        let row_bytes = size.width as usize * format.bytes_per_pixel();
        if stride < row_bytes || data.as_ref().len() < stride * size.height as usize {
            return None;
        }
        Some(Self {
            size,
            format,
            stride,
            data,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn depth(&self) -> u32 {
        self.format.depth
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize * self.format.bytes_per_pixel()
    }

    pub fn read_pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        debug_assert!(x < self.size.width && y < self.size.height);
        let offset = self.offset(x, y);
        let word = self.format.read_word(&self.data.as_ref()[offset..]);
        self.format.unpack(word)
    }

    /// Copies `src_rect` of this buffer to `(dest_x, dest_y)` in `dest`,
    /// converting pixel formats as needed. The copy is clipped to both
    /// buffers.
    pub fn copy_rect<D>(
        &self,
        src_rect: Rect,
        dest: &mut PixelBuffer<D>,
        dest_x: u32,
        dest_y: u32,
    ) where
        D: AsRef<[u8]> + AsMut<[u8]>,
    {
        let width = src_rect
            .width
            .min(self.size.width.saturating_sub(src_rect.x))
            .min(dest.size.width.saturating_sub(dest_x));
        let height = src_rect
            .height
            .min(self.size.height.saturating_sub(src_rect.y))
            .min(dest.size.height.saturating_sub(dest_y));
        if width == 0 || height == 0 {
            return;
        }

        let src_format = self.format;
        let dest_format = dest.format;
        let src_bpp = src_format.bytes_per_pixel();
        let dest_bpp = dest_format.bytes_per_pixel();
        let src_stride = self.stride;
        let dest_stride = dest.stride;
        let src = self.data.as_ref();

        let start = dest_y as usize * dest_stride;
        let rows = &mut dest.data.as_mut()[start..];
        rows.par_chunks_mut(dest_stride)
            .take(height as usize)
            .enumerate()
            .for_each(|(row, line)| {
                let src_start =
                    (src_rect.y as usize + row) * src_stride + src_rect.x as usize * src_bpp;
                let src_line = &src[src_start..src_start + width as usize * src_bpp];
                let dest_start = dest_x as usize * dest_bpp;
                let dest_line = &mut line[dest_start..dest_start + width as usize * dest_bpp];

                if src_format == dest_format {
                    dest_line.copy_from_slice(src_line);
                    return;
                }
                for (from, to) in src_line
                    .chunks_exact(src_bpp)
                    .zip(dest_line.chunks_exact_mut(dest_bpp))
                {
                    let (r, g, b) = src_format.unpack(src_format.read_word(from));
                    dest_format.write_word(to, dest_format.pack(r, g, b));
                }
            });
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> PixelBuffer<S> {
    pub fn write_pixel(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8) {
        debug_assert!(x < self.size.width && y < self.size.height);
        let offset = self.offset(x, y);
        let word = self.format.pack(r, g, b);
        let format = self.format;
        format.write_word(&mut self.data.as_mut()[offset..], word);
    }

    /// Zeroes every byte, padding included.
    pub fn clear(&mut self) {
        self.data.as_mut().fill(0);
    }
}
