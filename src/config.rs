use anyhow::{anyhow, Result};
use log::info;
use pjpeg::OutputType;
use serde::{Deserialize, Serialize};

use crate::bmp::MAX_CHUNK;

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[serde(default)]
pub struct ImageConfig {
    pub jpeg: JpegConfig,
    pub gif: GifConfig,
    pub bmp: BmpConfig,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Default)]
#[serde(default)]
pub struct JpegConfig {
    pub output: OutputType,
    /// RGB565 high byte first
    pub swap_bytes: bool,
    pub window: Option<WindowConfig>,
}

/// Output window; negative offsets centre the crop
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug)]
pub struct WindowConfig {
    pub width: u16,
    pub height: u16,
    #[serde(default = "default_offset")]
    pub left: i32,
    #[serde(default = "default_offset")]
    pub top: i32,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(default)]
pub struct GifConfig {
    /// Used when a frame carries no delay
    pub default_delay_ms: u32,
    /// Cancellation polling interval while waiting between frames
    pub tick_ms: u32,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(default)]
pub struct BmpConfig {
    pub chunk_size: usize,
}

fn default_offset() -> i32 { -1 }

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: 100,
            tick_ms: 10,
        }
    }
}

impl Default for BmpConfig {
    fn default() -> Self {
        Self { chunk_size: MAX_CHUNK }
    }
}

impl BmpConfig {
    /// Read size actually used, kept within 64..=1024
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.clamp(64, MAX_CHUNK)
    }
}

pub fn parse_image_config(data: Vec<u8>) -> Result<ImageConfig> {
    let data_str = String::from_utf8(data)?;
    info!("Receive Data:{data_str}");
    let config = serde_json::from_str::<ImageConfig>(&data_str)?;
    Ok(config)
}

pub fn parse_jpeg_config(data: Vec<u8>) -> Result<JpegConfig> {
    let data_str = String::from_utf8(data)?;
    info!("Receive Data:{data_str}");
    let config = serde_json::from_str::<JpegConfig>(&data_str)?;
    if let Some(window) = &config.window {
        if window.width == 0 || window.height == 0 {
            return Err(anyhow!("window {}x{} is empty", window.width, window.height));
        }
    }
    Ok(config)
}

pub fn parse_gif_config(data: Vec<u8>) -> Result<GifConfig> {
    let data_str = String::from_utf8(data)?;
    info!("Receive Data:{data_str}");
    let config = serde_json::from_str::<GifConfig>(&data_str)?;
    Ok(config)
}

pub fn parse_bmp_config(data: Vec<u8>) -> Result<BmpConfig> {
    let data_str = String::from_utf8(data)?;
    info!("Receive Data:{data_str}");
    let config = serde_json::from_str::<BmpConfig>(&data_str)?;
    Ok(config)
}

pub fn config_to_json(cfg: &ImageConfig) -> Result<String> {
    serde_json::to_string(cfg).map_err(|err| anyhow!("{err:?}"))
}
