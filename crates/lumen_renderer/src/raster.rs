//! 8-bit RGBA raster the orchestrator merges tiles into.

use bytemuck::{Pod, Zeroable};
use lumen_core::Color;
use lumen_math::Rectangle;

/// One RGBA pixel, 8 bits per channel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Rgba8 = Rgba8::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Quantize a linear color to opaque 8-bit RGBA.
pub fn color_to_rgba(color: Color, gamma_correct: bool) -> Rgba8 {
    let encode = |c: f32| {
        let c = if gamma_correct { linear_to_gamma(c) } else { c };
        (255.0 * c.clamp(0.0, 1.0)).round() as u8
    };
    Rgba8::new(encode(color.x), encode(color.y), encode(color.z), 255)
}

/// Row-major RGBA raster with its origin at the **bottom-left**.
///
/// Row 0 is the bottom row of the image. Presentation layers with a
/// top-left origin must flip rows, see [`RasterBuffer::to_top_left_rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba8>,
}

impl RasterBuffer {
    /// Create a new raster filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba8::BLACK; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get the pixel at (x, y), or `None` outside the raster.
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x < self.width && y < self.height {
            Some(self.pixels[self.index(x, y)])
        } else {
            None
        }
    }

    /// Set the pixel at (x, y). Writes outside the raster are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Rgba8) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.pixels[i] = color;
        }
    }

    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// Raw RGBA bytes, bottom row first.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn clear(&mut self, color: Rgba8) {
        self.pixels.fill(color);
    }

    /// Reallocate to a new size. Contents are reset to black.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    /// Fill every pixel whose center lies inside `rect` (boundary included).
    ///
    /// Returns the number of pixels written.
    pub fn fill_rect(&mut self, rect: &Rectangle, color: Rgba8) -> usize {
        if !rect.is_valid() || self.pixels.is_empty() {
            return 0;
        }

        // Pixel p has its center at p + 0.5
        let first = |lo: f32| (lo - 0.5).ceil().max(0.0) as i64;
        let last = |hi: f32, size: u32| ((hi - 0.5).floor() as i64).min(size as i64 - 1);

        let (x0, x1) = (first(rect.bottom_left.x), last(rect.top_right.x, self.width));
        let (y0, y1) = (first(rect.bottom_left.y), last(rect.top_right.y, self.height));
        if x1 < x0 || y1 < y0 {
            return 0;
        }

        for y in y0..=y1 {
            let row = y as usize * self.width as usize;
            self.pixels[row + x0 as usize..=row + x1 as usize].fill(color);
        }
        ((x1 - x0 + 1) * (y1 - y0 + 1)) as usize
    }

    /// RGBA bytes with the top row first, for top-left-origin consumers.
    pub fn to_top_left_rows(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * 4;
        if row_bytes == 0 {
            return Vec::new();
        }
        self.as_bytes()
            .chunks_exact(row_bytes)
            .rev()
            .flatten()
            .copied()
            .collect()
    }
}
