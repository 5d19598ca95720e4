//! Uncompressed 24/32-bit BMP reader

use log::{debug, error, info};
use pjpeg::ByteSource;

use crate::config::BmpConfig;
use crate::error::{Error, Result};
use crate::sink::PixelSink;
use crate::utils::{le_i32, le_u16, le_u32, read_exact, skip_exact};

/// BITMAPFILEHEADER + BITMAPINFOHEADER
const HEADER_SIZE: usize = 54;

/// Largest pixel-data chunk read at once
pub const MAX_CHUNK: usize = 1024;

/// Fields of the file and info headers the reader needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    pub data_offset: u32,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u16,
}

impl BmpHeader {
    pub fn parse(b: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &b[..2] != b"BM" {
            return Err(Error::BadSignature);
        }
        let data_offset = le_u32(b, 10);
        let width = le_i32(b, 18);
        let height = le_i32(b, 22);
        let bits_per_pixel = le_u16(b, 28);
        let compression = le_u32(b, 30);

        if bits_per_pixel != 24 && bits_per_pixel != 32 {
            debug!("bmp depth {bits_per_pixel} not supported");
            return Err(Error::UnsupportedFormat);
        }
        if compression != 0 {
            debug!("bmp compression {compression} not supported");
            return Err(Error::UnsupportedFormat);
        }
        // top-down (negative height) rows are not handled
        if width <= 0 || height <= 0 {
            return Err(Error::UnsupportedFormat);
        }
        if (data_offset as usize) < HEADER_SIZE {
            return Err(Error::BadBlock);
        }

        Ok(Self {
            data_offset,
            width: width as u32,
            height: height as u32,
            bits_per_pixel,
        })
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel as usize / 8
    }

    /// Row length rounded up to 4 bytes
    pub fn stride(&self) -> usize {
        (self.width as usize * self.bits_per_pixel as usize / 8 + 3) & !3
    }
}

/// Draw a BMP with its top-left corner at (x0, y0). Returns the header.
///
/// Rows are drawn bottom-up as they are stored. A source that ends early
/// leaves the rows read so far on the sink.
pub fn load<S, P>(src: &mut S, sink: &mut P, x0: i32, y0: i32, config: &BmpConfig) -> Result<BmpHeader>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    let result = decode(src, sink, x0, y0, config);
    if let Err(err) = &result {
        error!("bmp load failed: {err}");
    }
    result
}

fn decode<S, P>(src: &mut S, sink: &mut P, x0: i32, y0: i32, config: &BmpConfig) -> Result<BmpHeader>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    let mut head = [0u8; HEADER_SIZE];
    read_exact(src, &mut head)?;
    let header = BmpHeader::parse(&head)?;
    info!(
        "bmp {}x{} {}bpp",
        header.width, header.height, header.bits_per_pixel
    );
    skip_exact(src, header.data_offset as usize - HEADER_SIZE)?;

    let bpp = header.bytes_per_pixel();
    let stride = header.stride();
    let width = header.width as usize;
    let mut chunk = [0u8; MAX_CHUNK];
    let chunk_len = config.chunk_size();

    // Pixel accumulator; carries across chunk boundaries
    let mut color = 0u32;
    let mut channel = 0usize;
    let mut row_pos = 0usize;
    let mut x = 0usize;
    let mut rows_left = header.height;

    while rows_left > 0 {
        let n = src.read(&mut chunk[..chunk_len])?;
        if n == 0 {
            debug!("bmp data ended with {rows_left} rows left");
            break;
        }

        for &byte in &chunk[..n] {
            if row_pos < width * bpp {
                if channel < 3 {
                    color |= (byte as u32) << (8 * channel);
                }
                channel += 1;
                if channel == bpp {
                    let y = y0 + rows_left as i32 - 1;
                    sink.set_pixel(x0 + x as i32, y, color & 0xFF_FFFF);
                    x += 1;
                    color = 0;
                    channel = 0;
                }
            }

            row_pos += 1;
            if row_pos == stride {
                rows_left -= 1;
                if rows_left == 0 {
                    break;
                }
                row_pos = 0;
                x = 0;
            }
        }
    }

    Ok(header)
}
