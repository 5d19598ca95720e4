//! Decode a JPEG, GIF or BMP file into a binary PPM
//!
//! cargo run --example decode -- <input> <output.ppm> [config.json]

use std::fs;

use anyhow::{anyhow, Result};
use log::info;
use screen_images::config::{parse_image_config, ImageConfig};
use screen_images::pjpeg::JpegDecoder;
use screen_images::{bmp, gif, jpeg, ImageFormat, RgbBuffer, SliceSource};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (input, output) = match args.as_slice() {
        [input, output, ..] => (input, output),
        _ => return Err(anyhow!("usage: decode <input> <output.ppm> [config.json]")),
    };
    let config = match args.get(2) {
        Some(path) => parse_image_config(fs::read(path)?)?,
        None => ImageConfig::default(),
    };

    let data = fs::read(input)?;
    let format = ImageFormat::detect(&data).ok_or_else(|| anyhow!("unknown image format"))?;
    let (width, height) = canvas_size(format, &data, &config)?;
    info!("{input}: {format:?} {width}x{height}");

    let mut canvas = RgbBuffer::new(width, height);
    let mut src = SliceSource::new(&data);
    match format {
        ImageFormat::Jpeg => {
            jpeg::load(&mut src, &mut canvas, 0, 0, &config.jpeg)?;
        }
        ImageFormat::Gif => {
            let mut on_frame = |frame: &gif::Frame| {
                info!("frame {} delay {}ms {:?}", frame.index, frame.delay_ms, frame.rect);
            };
            let frames = gif::load(&mut src, &mut canvas, 0, 0, &config.gif, Some(&mut on_frame))?;
            info!("{frames} frames");
        }
        ImageFormat::Bmp => {
            bmp::load(&mut src, &mut canvas, 0, 0, &config.bmp)?;
        }
    }

    fs::write(output, canvas.to_ppm())?;
    info!("wrote {output}");
    Ok(())
}

fn canvas_size(format: ImageFormat, data: &[u8], config: &ImageConfig) -> Result<(u32, u32)> {
    let le16 = |at: usize| -> Result<u32> {
        let b = data.get(at..at + 2).ok_or_else(|| anyhow!("header too short"))?;
        Ok(u16::from_le_bytes([b[0], b[1]]) as u32)
    };
    match format {
        ImageFormat::Jpeg => {
            if let Some(window) = &config.jpeg.window {
                return Ok((window.width as u32, window.height as u32));
            }
            let mut src = SliceSource::new(data);
            let decoder = JpegDecoder::init(&mut src, config.jpeg.output)?;
            let info = decoder.info();
            Ok((info.width as u32, info.height as u32))
        }
        ImageFormat::Gif => Ok((le16(6)?, le16(8)?)),
        // width and height are i32; images past 65535 rows are not worth a PPM
        ImageFormat::Bmp => Ok((le16(18)?, le16(22)?)),
    }
}
