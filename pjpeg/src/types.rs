//! Type definitions for the JPEG decoder

/// Result type for JPEG decoder operations
pub type Result<T> = core::result::Result<T, Error>;

/// Decoder status codes
///
/// Every code is terminal for the current image. [`Error::NoMoreBlocks`] is the
/// normal end of [`crate::JpegDecoder::decode_mcu`] iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no more blocks")]
    NoMoreBlocks,
    #[error("bad DHT counts")]
    BadDhtCounts,
    #[error("bad DHT index")]
    BadDhtIndex,
    #[error("bad DHT marker")]
    BadDhtMarker,
    #[error("bad DQT marker")]
    BadDqtMarker,
    #[error("bad DQT table")]
    BadDqtTable,
    #[error("bad DQT length")]
    BadDqtLength,
    #[error("bad sample precision")]
    BadPrecision,
    #[error("bad image height")]
    BadHeight,
    #[error("bad image width")]
    BadWidth,
    #[error("too many components")]
    TooManyComponents,
    #[error("bad SOF length")]
    BadSofLength,
    #[error("bad variable-length marker")]
    BadVariableMarker,
    #[error("bad DRI length")]
    BadDriLength,
    #[error("bad SOS length")]
    BadSosLength,
    #[error("bad SOS component id")]
    BadSosCompId,
    #[error("scan is not a single baseline scan")]
    BadScan,
    #[error("not a JPEG stream")]
    NotJpeg,
    #[error("unexpected marker")]
    UnexpectedMarker,
    #[error("unsupported quantization table index")]
    UnsupportedQuantTable,
    #[error("undefined quantization table")]
    UndefinedQuantTable,
    #[error("undefined Huffman table")]
    UndefinedHuffTable,
    #[error("unsupported colorspace")]
    UnsupportedColorspace,
    #[error("unsupported sampling factors")]
    UnsupportedSamplingFactors,
    #[error("unsupported mode (progressive, arithmetic or extended)")]
    UnsupportedMode,
    #[error("bad restart marker")]
    BadRestartMarker,
    #[error("entropy decode error")]
    DecodeError,
    #[error("byte source read failed")]
    StreamRead,
    #[error("buffer too small")]
    NotEnoughMemory,
    #[error("invalid output window")]
    BadWindow,
    #[error("call out of sequence")]
    OutOfSequence,
    #[error("interrupted by line sink")]
    Interrupted,
}

/// Coarse error classes shared by all decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad signature, marker, block length or precision
    MalformedContainer,
    /// Valid file using a feature the decoder does not implement
    Unsupported,
    /// The byte source failed or ran dry
    Truncated,
    /// Entropy-coded data is inconsistent
    Decode,
    /// API called out of order, or a caller buffer is too small
    Usage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            UnsupportedQuantTable | UnsupportedColorspace | UnsupportedSamplingFactors
            | UnsupportedMode => ErrorKind::Unsupported,
            StreamRead => ErrorKind::Truncated,
            DecodeError | BadRestartMarker => ErrorKind::Decode,
            NoMoreBlocks | NotEnoughMemory | BadWindow | OutOfSequence | Interrupted => ErrorKind::Usage,
            _ => ErrorKind::MalformedContainer,
        }
    }
}

/// Pixel layout written by [`crate::JpegDecoder::decode_scanlines`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputType {
    Gray8,
    #[default]
    Rgb888,
    /// 16-bit 5-6-5, byte order chosen with `set_swap_bytes`
    Rgb565,
    ReducedGray8,
    ReducedRgb888,
    ReducedRgb565,
}

impl OutputType {
    /// DC-only output: one sample per 8x8 block, replicated across the block
    pub fn is_reduced(self) -> bool {
        matches!(
            self,
            OutputType::ReducedGray8 | OutputType::ReducedRgb888 | OutputType::ReducedRgb565
        )
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            OutputType::Gray8 | OutputType::ReducedGray8 => 1,
            OutputType::Rgb565 | OutputType::ReducedRgb565 => 2,
            OutputType::Rgb888 | OutputType::ReducedRgb888 => 3,
        }
    }

    /// Colour output makes no sense for one component and grey output wastes
    /// chroma for three, so the requested type is corrected to the frame.
    pub(crate) fn for_components(self, comps: u8) -> Self {
        match (comps, self) {
            (1, OutputType::Rgb888 | OutputType::Rgb565) => OutputType::Gray8,
            (1, OutputType::ReducedRgb888 | OutputType::ReducedRgb565) => OutputType::ReducedGray8,
            (3, OutputType::Gray8) => OutputType::Rgb888,
            (3, OutputType::ReducedGray8) => OutputType::ReducedRgb888,
            (_, t) => t,
        }
    }
}

/// Component layout of one MCU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// One luma block, 8x8
    Grayscale,
    /// Y Cb Cr, 8x8
    YH1V1,
    /// Two luma blocks side by side, 16x8
    YH2V1,
    /// Two luma blocks stacked, 8x16
    YH1V2,
    /// Four luma blocks, 16x16
    YH2V2,
}

/// Where a decoded block lands in the MCU staging buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockRole {
    /// Luma block copied to R/G/B at this buffer offset
    Luma(usize),
    Cb,
    Cr,
}

impl ScanType {
    pub(crate) fn from_sampling(comps: u8, h: [u8; 3], v: [u8; 3]) -> Result<Self> {
        match comps {
            1 => {
                if h[0] != 1 || v[0] != 1 {
                    return Err(Error::UnsupportedSamplingFactors);
                }
                Ok(ScanType::Grayscale)
            }
            3 => {
                if h[1] != 1 || v[1] != 1 || h[2] != 1 || v[2] != 1 {
                    return Err(Error::UnsupportedSamplingFactors);
                }
                match (h[0], v[0]) {
                    (1, 1) => Ok(ScanType::YH1V1),
                    (2, 1) => Ok(ScanType::YH2V1),
                    (1, 2) => Ok(ScanType::YH1V2),
                    (2, 2) => Ok(ScanType::YH2V2),
                    _ => Err(Error::UnsupportedSamplingFactors),
                }
            }
            _ => Err(Error::UnsupportedColorspace),
        }
    }

    pub fn mcu_width(self) -> u16 {
        match self {
            ScanType::YH2V1 | ScanType::YH2V2 => 16,
            _ => 8,
        }
    }

    pub fn mcu_height(self) -> u16 {
        match self {
            ScanType::YH1V2 | ScanType::YH2V2 => 16,
            _ => 8,
        }
    }

    pub fn blocks_per_mcu(self) -> usize {
        match self {
            ScanType::Grayscale => 1,
            ScanType::YH1V1 => 3,
            ScanType::YH2V1 | ScanType::YH1V2 => 4,
            ScanType::YH2V2 => 6,
        }
    }

    /// Luma blocks per MCU, stored in raster order at `n * 64`
    pub(crate) fn luma_blocks(self) -> usize {
        self.blocks_per_mcu() - if self == ScanType::Grayscale { 0 } else { 2 }
    }

    /// Frame component feeding the given block of an MCU
    pub(crate) fn component(self, block: usize) -> usize {
        let luma = self.luma_blocks();
        if block < luma {
            0
        } else {
            block - luma + 1
        }
    }

    pub(crate) fn role(self, block: usize) -> BlockRole {
        let luma = self.luma_blocks();
        if block < luma {
            BlockRole::Luma(block * 64)
        } else if block == luma {
            BlockRole::Cb
        } else {
            BlockRole::Cr
        }
    }

    /// Chroma upsampling factors (horizontal, vertical)
    pub(crate) fn chroma_factors(self) -> (usize, usize) {
        match self {
            ScanType::Grayscale | ScanType::YH1V1 => (1, 1),
            ScanType::YH2V1 => (2, 1),
            ScanType::YH1V2 => (1, 2),
            ScanType::YH2V2 => (2, 2),
        }
    }

    /// (source offset in the coefficient block, destination offset in the
    /// staging buffers) for each region of a chroma block
    pub(crate) fn chroma_targets(self) -> &'static [(usize, usize)] {
        match self {
            ScanType::Grayscale | ScanType::YH1V1 => &[(0, 0)],
            ScanType::YH2V1 => &[(0, 0), (4, 64)],
            ScanType::YH1V2 => &[(0, 0), (32, 64)],
            ScanType::YH2V2 => &[(0, 0), (4, 64), (32, 128), (36, 192)],
        }
    }
}

/// Image geometry reported by [`crate::JpegDecoder::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Output width, equal to the window width once a window is set
    pub width: u16,
    /// Output height, equal to the window height once a window is set
    pub height: u16,
    pub image_width: u16,
    pub image_height: u16,
    pub comps: u8,
    pub scan_type: ScanType,
    pub mcus_per_row: u16,
    pub mcus_per_col: u16,
    pub mcu_width: u16,
    pub mcu_height: u16,
    pub output_type: OutputType,
}

impl ImageInfo {
    /// Bytes needed for one MCU row of output lines
    pub fn line_buffer_size(&self) -> usize {
        self.width as usize * self.mcu_height as usize * self.output_type.bytes_per_pixel()
    }

    pub fn mcu_count(&self) -> u32 {
        self.mcus_per_row as u32 * self.mcus_per_col as u32
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingSoi,
    HeaderParsing,
    FrameInitialized,
    ScanInitialized,
    DecodingMcus,
    Done,
    Failed(Error),
}
