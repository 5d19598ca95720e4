//! Streaming image decoders for small screens
//!
//! Baseline JPEG (through [`pjpeg`]), GIF87a/89a with animation and
//! uncompressed 24/32-bit BMP. Every decoder pulls bytes from a
//! [`ByteSource`] and draws straight into a [`PixelSink`]; no full decoded
//! image is ever held in memory.
//!
//! ```no_run
//! use screen_images::{bmp, config::BmpConfig, RgbBuffer, SliceSource};
//!
//! # fn demo(data: &[u8]) -> screen_images::Result<()> {
//! let mut screen = RgbBuffer::new(240, 240);
//! bmp::load(&mut SliceSource::new(data), &mut screen, 0, 0, &BmpConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod bmp;
pub mod config;
pub mod error;
pub mod gif;
pub mod jpeg;
pub mod sink;
mod utils;

pub use pjpeg;
pub use pjpeg::{ByteSource, FnSource, ImageInfo, IoSource, OutputType, SliceSource};

pub use error::{Error, ErrorKind, Result};
pub use sink::{DrawTargetSink, PixelSink, Rgb565Framebuffer, RgbBuffer};

/// Container format, sniffed from the first bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Gif,
    Bmp,
}

impl ImageFormat {
    pub fn detect(head: &[u8]) -> Option<Self> {
        match head {
            [0xFF, 0xD8, ..] => Some(ImageFormat::Jpeg),
            [b'G', b'I', b'F', b'8', ..] => Some(ImageFormat::Gif),
            [b'B', b'M', ..] => Some(ImageFormat::Bmp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(b"GIF89a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"BM6\0"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::detect(b"\x89PNG"), None);
        assert_eq!(ImageFormat::detect(&[]), None);
    }
}
