//! Pixel sinks the decoders draw into
//!
//! Colours cross the sink boundary as 24-bit `0xRRGGBB`. Sinks ignore
//! coordinates outside their surface; decoders do not clip every call.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{ContainsPoint, Rectangle};

/// Destination surface of known size
pub trait PixelSink {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn set_pixel(&mut self, x: i32, y: i32, color: u32);

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
        for yy in 0..h as i32 {
            for xx in 0..w as i32 {
                self.set_pixel(x + xx, y + yy, color);
            }
        }
    }
}

impl<T: PixelSink + ?Sized> PixelSink for &mut T {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn height(&self) -> u32 {
        (**self).height()
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        (**self).set_pixel(x, y, color)
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
        (**self).fill_rect(x, y, w, h, color)
    }
}

#[inline]
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

#[inline]
pub fn split_rgb(color: u32) -> (u8, u8, u8) {
    ((color >> 16) as u8, (color >> 8) as u8, color as u8)
}

macro_rules! generate_lut {
    ($name:ident, $factor:expr, $shift:expr) => {
        const $name: [u16; 256] = {
            let mut lut = [0u16; 256];
            let mut i = 0;
            while i < 256 {
                lut[i] = ((i as u16 * $factor) / 255) << $shift;
                i += 1;
            }
            lut
        };
    };
}

generate_lut!(RGB565_R_LUT, 31, 11);
generate_lut!(RGB565_G_LUT, 63, 5);
generate_lut!(RGB565_B_LUT, 31, 0);

#[inline(always)]
pub fn rgb565_from_rgb888(r: u8, g: u8, b: u8) -> u16 {
    RGB565_R_LUT[r as usize] | RGB565_G_LUT[g as usize] | RGB565_B_LUT[b as usize]
}

#[inline(always)]
pub fn rgb888_from_rgb565(pixel: u16) -> (u8, u8, u8) {
    let r = (pixel >> 11) & 0x1F;
    let g = (pixel >> 5) & 0x3F;
    let b = pixel & 0x1F;
    ((r * 255 / 31) as u8, (g * 255 / 63) as u8, (b * 255 / 31) as u8)
}

/// Adapter over any embedded-graphics [`DrawTarget`]
///
/// Calls outside the target's bounding box are dropped. The first draw
/// error is kept and later calls become no-ops.
pub struct DrawTargetSink<D: DrawTarget> {
    target: D,
    error: Option<D::Error>,
}

impl<D: DrawTarget> DrawTargetSink<D> {
    pub fn new(target: D) -> Self {
        Self { target, error: None }
    }

    pub fn target(&self) -> &D {
        &self.target
    }

    pub fn take_error(&mut self) -> Option<D::Error> {
        self.error.take()
    }

    pub fn into_inner(self) -> D {
        self.target
    }

    fn record(&mut self, result: Result<(), D::Error>) {
        if let Err(err) = result {
            if self.error.is_none() {
                self.error = Some(err);
            }
        }
    }
}

impl<D, C> PixelSink for DrawTargetSink<D>
where
    D: DrawTarget<Color = C>,
    C: PixelColor + From<Rgb888>,
{
    fn width(&self) -> u32 {
        self.target.bounding_box().size.width
    }

    fn height(&self) -> u32 {
        self.target.bounding_box().size.height
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if self.error.is_some() {
            return;
        }
        let point = Point::new(x, y);
        if !self.target.bounding_box().contains(point) {
            return;
        }
        let (r, g, b) = split_rgb(color);
        let pixel = Pixel(point, C::from(Rgb888::new(r, g, b)));
        let result = self.target.draw_iter(core::iter::once(pixel));
        self.record(result);
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
        if self.error.is_some() {
            return;
        }
        let area = Rectangle::new(Point::new(x, y), Size::new(w, h))
            .intersection(&self.target.bounding_box());
        if area.is_zero_sized() {
            return;
        }
        let (r, g, b) = split_rgb(color);
        let result = self.target.fill_solid(&area, C::from(Rgb888::new(r, g, b)));
        self.record(result);
    }
}

/// RGB565 framebuffer, two little-endian bytes per pixel
#[derive(Debug, Clone)]
pub struct Rgb565Framebuffer {
    width: u16,
    height: u16,
    data: Vec<u8>,
}

impl Rgb565Framebuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 2],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 2;
        Some(u16::from_le_bytes([self.data[i], self.data[i + 1]]))
    }
}

impl PixelSink for Rgb565Framebuffer {
    fn width(&self) -> u32 {
        self.width as u32
    }

    fn height(&self) -> u32 {
        self.height as u32
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let (r, g, b) = split_rgb(color);
        let i = (y as usize * self.width as usize + x as usize) * 2;
        self.data[i..i + 2].copy_from_slice(&rgb565_from_rgb888(r, g, b).to_le_bytes());
    }
}

/// 24-bit RGB surface held in memory
#[derive(Debug, Clone)]
pub struct RgbBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    /// Packed RGB rows, top to bottom
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some(rgb(self.data[i], self.data[i + 1], self.data[i + 2]))
    }

    /// Binary PPM (P6) image
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.extend_from_slice(&self.data);
        out
    }
}

impl PixelSink for RgbBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let (r, g, b) = split_rgb(color);
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&[r, g, b]);
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: u32) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w as i32).min(self.width as i32);
        let y1 = (y + h as i32).min(self.height as i32);
        let (r, g, b) = split_rgb(color);
        for yy in y0..y1 {
            let row = yy as usize * self.width as usize;
            for xx in x0..x1 {
                let i = (row + xx as usize) * 3;
                self.data[i..i + 3].copy_from_slice(&[r, g, b]);
            }
        }
    }
}
