//! Scanline output with windowing
//!
//! Decodes one row of MCUs at a time into the caller's line buffer and hands
//! complete output lines to a [`LineSink`].

use crate::decoder::{mcu_offset, JpegDecoder};
use crate::source::ByteSource;
use crate::types::{Error, ImageInfo, OutputType, Phase, Result};

/// Receiver for finished output lines
///
/// Returning [`Error::Interrupted`] (or any error) stops decoding.
pub trait LineSink {
    fn write_line(&mut self, line: &[u8]) -> Result<()>;
}

impl<F: FnMut(&[u8]) -> Result<()>> LineSink for F {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self(line)
    }
}

/// Line buffer size needed by [`JpegDecoder::decode_scanlines`]
pub fn required_line_buffer_size(info: &ImageInfo) -> usize {
    info.line_buffer_size()
}

/// Split an output extent into (leading pad, visible span) for an image of
/// `image` pixels.
fn layout(image: u16, window: u16) -> (usize, usize) {
    if window > image {
        (((window - image) / 2) as usize, image as usize)
    } else {
        (0, window as usize)
    }
}

impl<'s, S: ByteSource + ?Sized> JpegDecoder<'s, S> {
    /// Decode the whole scan and deliver exactly `info().height` lines of
    /// `info().width` pixels.
    ///
    /// `line_buf` must hold one MCU row of output lines, see
    /// [`required_line_buffer_size`].
    pub fn decode_scanlines(&mut self, line_buf: &mut [u8], sink: &mut impl LineSink) -> Result<()> {
        if let Phase::Failed(err) = self.phase {
            return Err(err);
        }
        if self.phase != Phase::ScanInitialized {
            return Err(Error::OutOfSequence);
        }
        let needed = self.info.line_buffer_size();
        if line_buf.len() < needed {
            log::warn!("line buffer {} bytes, need {}", line_buf.len(), needed);
            return Err(Error::NotEnoughMemory);
        }

        match self.emit_lines(&mut line_buf[..needed], sink) {
            Ok(()) => Ok(()),
            Err(err) => {
                if !matches!(self.phase, Phase::Failed(_)) {
                    self.phase = Phase::Failed(err);
                }
                Err(err)
            }
        }
    }

    fn emit_lines(&mut self, buf: &mut [u8], sink: &mut impl LineSink) -> Result<()> {
        let bpp = self.output_type.bytes_per_pixel();
        let window = self.window;
        let line_len = window.width as usize * bpp;
        let mcu_w = self.info.mcu_width as usize;
        let mcu_h = self.info.mcu_height as usize;
        let img_h = self.info.image_height;

        let (pad_left, vis_w) = layout(self.info.image_width, window.width);
        let (pad_top, vis_h) = layout(img_h, window.height);
        let pad_bottom = window.height as usize - pad_top - vis_h;
        let x_off = window.x_offset as usize;
        let y_off = window.y_offset as usize;

        buf[..line_len].fill(0);
        for _ in 0..pad_top {
            sink.write_line(&buf[..line_len])?;
        }

        for mcu_y in 0..self.info.mcus_per_col as usize {
            buf.fill(0);
            for mcu_x in 0..self.info.mcus_per_row as usize {
                self.decode_mcu()?;
                let x0 = mcu_x * mcu_w;
                for x in 0..mcu_w {
                    let ix = x0 + x;
                    if ix < x_off || ix >= x_off + vis_w {
                        continue;
                    }
                    let col = (pad_left + ix - x_off) * bpp;
                    for y in 0..mcu_h {
                        let dst = y * line_len + col;
                        self.write_pixel(&mut buf[dst..dst + bpp], x, y);
                    }
                }
            }

            for y in 0..mcu_h {
                let iy = mcu_y * mcu_h + y;
                if iy < y_off || iy >= y_off + vis_h {
                    continue;
                }
                sink.write_line(&buf[y * line_len..(y + 1) * line_len])?;
            }
        }

        buf[..line_len].fill(0);
        for _ in 0..pad_bottom {
            sink.write_line(&buf[..line_len])?;
        }
        Ok(())
    }

    fn write_pixel(&self, dst: &mut [u8], x: usize, y: usize) {
        let o = mcu_offset(self.scan_type, self.output_type.is_reduced(), x, y);
        let (r, g, b) = (self.mcu.r[o], self.mcu.g[o], self.mcu.b[o]);
        match self.output_type {
            OutputType::Gray8 | OutputType::ReducedGray8 => dst[0] = r,
            OutputType::Rgb888 | OutputType::ReducedRgb888 => dst.copy_from_slice(&[r, g, b]),
            OutputType::Rgb565 | OutputType::ReducedRgb565 => {
                let lo = ((g << 3) & 0xE0) | (b >> 3);
                let hi = (r & 0xF8) | (g >> 5);
                if self.swap_bytes {
                    dst.copy_from_slice(&[hi, lo]);
                } else {
                    dst.copy_from_slice(&[lo, hi]);
                }
            }
        }
    }
}
