//! Draw a baseline JPEG into a [`PixelSink`]

use log::{error, info};
use pjpeg::{ByteSource, ImageInfo, JpegDecoder, OutputType};

use crate::config::JpegConfig;
use crate::error::Result;
use crate::sink::{rgb, rgb888_from_rgb565, PixelSink};

/// Decode the whole image and draw it with its top-left corner at (x, y).
///
/// Lines are drawn as they complete, so a failure part way through leaves
/// the lines above it on the sink.
pub fn load<S, P>(src: &mut S, sink: &mut P, x: i32, y: i32, config: &JpegConfig) -> Result<ImageInfo>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    let result = decode(src, sink, x, y, config);
    if let Err(err) = &result {
        error!("jpeg load failed: {err}");
    }
    result
}

fn decode<S, P>(src: &mut S, sink: &mut P, x: i32, y: i32, config: &JpegConfig) -> Result<ImageInfo>
where
    S: ByteSource + ?Sized,
    P: PixelSink + ?Sized,
{
    let mut decoder = JpegDecoder::init(src, config.output)?;
    decoder.set_swap_bytes(config.swap_bytes);
    if let Some(window) = &config.window {
        decoder.set_window(window.width, window.height, window.left, window.top)?;
    }

    let info = *decoder.info();
    info!(
        "jpeg {}x{} drawn as {}x{} {:?}",
        info.image_width, info.image_height, info.width, info.height, info.output_type
    );

    let mut line_buf = vec![0u8; pjpeg::required_line_buffer_size(&info)];
    let format = info.output_type;
    let swap = config.swap_bytes;
    let mut row = 0;
    decoder.decode_scanlines(&mut line_buf, &mut |line: &[u8]| -> pjpeg::Result<()> {
        draw_line(sink, x, y + row, line, format, swap);
        row += 1;
        Ok(())
    })?;

    Ok(info)
}

fn draw_line<P: PixelSink + ?Sized>(sink: &mut P, x: i32, y: i32, line: &[u8], format: OutputType, swap: bool) {
    let bpp = format.bytes_per_pixel();
    for (i, px) in line.chunks_exact(bpp).enumerate() {
        let color = match bpp {
            1 => rgb(px[0], px[0], px[0]),
            2 => {
                let v = if swap {
                    u16::from_be_bytes([px[0], px[1]])
                } else {
                    u16::from_le_bytes([px[0], px[1]])
                };
                let (r, g, b) = rgb888_from_rgb565(v);
                rgb(r, g, b)
            }
            _ => rgb(px[0], px[1], px[2]),
        };
        sink.set_pixel(x + i as i32, y, color);
    }
}
