//! pjpeg - streaming baseline JPEG decoder
//!
//! A small decoder for memory constrained targets. It pulls bytes from a
//! [`ByteSource`] through a 256-byte lookahead buffer and decodes one MCU at
//! a time into fixed planar staging buffers; nothing is allocated.
//!
//! Supported: baseline huffman sequential frames, 8-bit precision, grey or
//! YCbCr with H1V1, H2V1, H1V2 and H2V2 sampling, restart intervals, and
//! DC-only "reduced" output at 1/8 scale.
//!
//! ```no_run
//! use pjpeg::{JpegDecoder, OutputType, SliceSource};
//!
//! # fn demo(data: &[u8]) -> pjpeg::Result<()> {
//! let mut src = SliceSource::new(data);
//! let mut dec = JpegDecoder::init(&mut src, OutputType::Rgb565)?;
//! let mut line_buf = vec![0u8; pjpeg::required_line_buffer_size(dec.info())];
//! dec.decode_scanlines(&mut line_buf, &mut |line: &[u8]| -> pjpeg::Result<()> {
//!     // push `line` to the display
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]

mod color;
mod decoder;
mod huffman;
mod idct;
mod scanline;
mod source;
mod tables;
mod types;

#[cfg(test)]
mod testutil;

pub use decoder::{JpegDecoder, McuPixels};
pub use huffman::IN_BUF_SIZE;
pub use scanline::{required_line_buffer_size, LineSink};
#[cfg(feature = "std")]
pub use source::IoSource;
pub use source::{ByteSource, FnSource, ReadError, SliceSource};
pub use types::{Error, ErrorKind, ImageInfo, OutputType, Phase, Result, ScanType};

/// Bytes needed for one decoding session, see
/// [`JpegDecoder::required_storage_size`]
pub fn required_storage_size() -> usize {
    JpegDecoder::<SliceSource<'static>>::required_storage_size()
}
