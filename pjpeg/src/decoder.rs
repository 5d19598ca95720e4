//! Baseline JPEG decoding session

use crate::color::McuBuffers;
use crate::huffman::{huff_decode, huff_extend, BitStream, HuffmanTable};
use crate::idct::idct_block;
use crate::source::ByteSource;
use crate::tables::{DCT_SCALE_BITS, MAX_DIMENSION, WINOGRAD_QUANT, WINOGRAD_QUANT_SCALE_BITS, ZAG};
use crate::types::{Error, ImageInfo, OutputType, Phase, Result, ScanType};

/// JPEG marker codes
mod markers {
    pub const SOF0: u8 = 0xC0; // Start of Frame (Baseline)
    pub const SOF3: u8 = 0xC3;
    pub const DHT: u8 = 0xC4; // Define Huffman Table
    pub const SOF5: u8 = 0xC5;
    pub const SOF7: u8 = 0xC7;
    pub const JPG: u8 = 0xC8;
    pub const SOF9: u8 = 0xC9;
    pub const SOF11: u8 = 0xCB;
    pub const DAC: u8 = 0xCC; // Define Arithmetic Coding
    pub const SOF13: u8 = 0xCD;
    pub const SOF15: u8 = 0xCF;
    pub const RST0: u8 = 0xD0; // Restart markers
    pub const RST7: u8 = 0xD7;
    pub const SOI: u8 = 0xD8; // Start of Image
    pub const EOI: u8 = 0xD9; // End of Image
    pub const SOS: u8 = 0xDA; // Start of Scan
    pub const DQT: u8 = 0xDB; // Define Quantization Table
    pub const DRI: u8 = 0xDD; // Define Restart Interval
    pub const TEM: u8 = 0x01;
}

/// Output window inside the image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Window {
    pub x_offset: u16,
    pub y_offset: u16,
    pub width: u16,
    pub height: u16,
}

/// Staging buffer offset of pixel (x, y) inside an MCU
pub(crate) fn mcu_offset(scan: ScanType, reduced: bool, x: usize, y: usize) -> usize {
    let tiles_per_row = scan.mcu_width() as usize / 8;
    let tile = (y / 8) * tiles_per_row + x / 8;
    if reduced {
        tile * 64
    } else {
        tile * 64 + (y % 8) * 8 + x % 8
    }
}

/// Planar RGB of the most recently decoded MCU
///
/// Grayscale images carry the same samples in all three planes.
#[derive(Debug, Clone, Copy)]
pub struct McuPixels<'a> {
    pub r: &'a [u8; 256],
    pub g: &'a [u8; 256],
    pub b: &'a [u8; 256],
    pub scan_type: ScanType,
    pub reduced: bool,
}

impl McuPixels<'_> {
    pub fn width(&self) -> usize {
        self.scan_type.mcu_width() as usize
    }

    pub fn height(&self) -> usize {
        self.scan_type.mcu_height() as usize
    }

    /// RGB at (x, y) relative to the MCU origin. In reduced mode every
    /// pixel of a tile returns the tile's single sample.
    pub fn pixel(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let o = mcu_offset(self.scan_type, self.reduced, x, y);
        (self.r[o], self.g[o], self.b[o])
    }
}

/// Dequantization factors folded with the Winograd IDCT prescale
fn create_winograd_quant(quant: &mut [i16; 64]) {
    const SHIFT: u32 = WINOGRAD_QUANT_SCALE_BITS - DCT_SCALE_BITS;
    for (q, &w) in quant.iter_mut().zip(WINOGRAD_QUANT.iter()) {
        let x = *q as i32 * w as i32;
        *q = ((x + (1 << (SHIFT - 1))) >> SHIFT) as i16;
    }
}

/// One decoding session over a byte source
///
/// The session owns every table and buffer it needs, so its total footprint
/// is [`JpegDecoder::required_storage_size`] plus the caller's line buffer.
pub struct JpegDecoder<'s, S: ?Sized> {
    pub(crate) bits: BitStream<'s, S>,
    pub(crate) phase: Phase,

    // Frame header
    image_x: u16,
    image_y: u16,
    comps_in_frame: u8,
    comp_ident: [u8; 3],
    comp_h_samp: [u8; 3],
    comp_v_samp: [u8; 3],
    comp_quant: [u8; 3],

    // Scan header
    comps_in_scan: u8,
    comp_list: [u8; 3],
    comp_dc_tab: [u8; 3],
    comp_ac_tab: [u8; 3],
    pub(crate) scan_type: ScanType,
    pub(crate) output_type: OutputType,

    // Tables
    quant: [[i16; 64]; 2],
    valid_quant: u8,
    dc_tables: [HuffmanTable<16>; 2],
    ac_tables: [HuffmanTable<256>; 2],
    valid_huff: u8,

    // Restart state
    restart_interval: u16,
    restarts_left: u16,
    next_restart_num: u8,

    last_dc: [i16; 3],
    pub(crate) mcus_remaining: u32,
    coeffs: [i16; 64],
    pub(crate) mcu: McuBuffers,

    pub(crate) info: ImageInfo,
    pub(crate) window: Window,

    // Byte swapping for RGB565
    pub(crate) swap_bytes: bool,
}

impl<'s, S: ByteSource + ?Sized> JpegDecoder<'s, S> {
    fn new(src: &'s mut S, output_type: OutputType) -> Self {
        Self {
            bits: BitStream::new(src),
            phase: Phase::AwaitingSoi,
            image_x: 0,
            image_y: 0,
            comps_in_frame: 0,
            comp_ident: [0; 3],
            comp_h_samp: [0; 3],
            comp_v_samp: [0; 3],
            comp_quant: [0; 3],
            comps_in_scan: 0,
            comp_list: [0; 3],
            comp_dc_tab: [0; 3],
            comp_ac_tab: [0; 3],
            scan_type: ScanType::Grayscale,
            output_type,
            quant: [[0; 64]; 2],
            valid_quant: 0,
            dc_tables: [HuffmanTable::new(), HuffmanTable::new()],
            ac_tables: [HuffmanTable::new(), HuffmanTable::new()],
            valid_huff: 0,
            restart_interval: 0,
            restarts_left: 0,
            next_restart_num: 0,
            last_dc: [0; 3],
            mcus_remaining: 0,
            coeffs: [0; 64],
            mcu: McuBuffers::new(),
            info: ImageInfo {
                width: 0,
                height: 0,
                image_width: 0,
                image_height: 0,
                comps: 0,
                scan_type: ScanType::Grayscale,
                mcus_per_row: 0,
                mcus_per_col: 0,
                mcu_width: 0,
                mcu_height: 0,
                output_type,
            },
            window: Window::default(),
            swap_bytes: false,
        }
    }

    /// Parse headers up to the first scan and return a session ready to
    /// decode MCUs.
    ///
    /// `output_type` is corrected to the frame: colour output on a one
    /// component image becomes grey and vice versa.
    pub fn init(src: &'s mut S, output_type: OutputType) -> Result<Self> {
        let mut dec = Self::new(src, output_type);
        let result = dec.parse_headers();

        // A failed read outranks whatever the parser made of the padding.
        if let Some(err) = dec.bits.status() {
            log::warn!("jpeg source failed during header parsing");
            return Err(err);
        }
        if let Err(err) = result {
            log::debug!("jpeg header rejected: {err}");
            return Err(err);
        }

        log::info!(
            "jpeg {}x{} comps={} scan={:?} mcus={}x{} restart={}",
            dec.image_x,
            dec.image_y,
            dec.comps_in_frame,
            dec.scan_type,
            dec.info.mcus_per_row,
            dec.info.mcus_per_col,
            dec.restart_interval
        );
        Ok(dec)
    }

    /// Footprint of one session; the same for every sized source type
    pub fn required_storage_size() -> usize {
        core::mem::size_of::<Self>()
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// MCUs not yet decoded
    pub fn remaining_mcus(&self) -> u32 {
        self.mcus_remaining
    }

    /// Set byte swapping for RGB565 output (false: little endian)
    pub fn set_swap_bytes(&mut self, swap: bool) {
        self.swap_bytes = swap;
    }

    /// Restrict scanline output to a `width` x `height` window.
    ///
    /// A window larger than the image is padded with black, centred. A
    /// smaller one is cropped at (`left`, `top`); negative or out of range
    /// offsets centre the crop. Only valid before the first MCU is decoded.
    pub fn set_window(&mut self, width: u16, height: u16, left: i32, top: i32) -> Result<()> {
        if self.phase != Phase::ScanInitialized {
            return Err(Error::OutOfSequence);
        }
        if width == 0 || height == 0 {
            return Err(Error::BadWindow);
        }

        fn crop_offset(image: u16, window: u16, requested: i32) -> u16 {
            if window >= image {
                return 0;
            }
            let slack = image - window;
            match u16::try_from(requested) {
                Ok(v) if v <= slack => v,
                _ => slack / 2,
            }
        }

        self.window = Window {
            x_offset: crop_offset(self.image_x, width, left),
            y_offset: crop_offset(self.image_y, height, top),
            width,
            height,
        };
        self.info.width = width;
        self.info.height = height;
        log::debug!("jpeg window {:?}", self.window);
        Ok(())
    }

    /// Planar RGB of the last decoded MCU
    pub fn mcu_pixels(&self) -> McuPixels<'_> {
        McuPixels {
            r: &self.mcu.r,
            g: &self.mcu.g,
            b: &self.mcu.b,
            scan_type: self.scan_type,
            reduced: self.output_type.is_reduced(),
        }
    }

    /// Decode the next MCU into the staging buffers.
    ///
    /// Returns [`Error::NoMoreBlocks`] once every MCU has been decoded. Any
    /// other error is sticky: later calls return it again.
    pub fn decode_mcu(&mut self) -> Result<()> {
        if let Phase::Failed(err) = self.phase {
            return Err(err);
        }
        if let Some(err) = self.bits.status() {
            return self.fail(err);
        }
        if self.mcus_remaining == 0 {
            self.phase = Phase::Done;
            return Err(Error::NoMoreBlocks);
        }

        self.phase = Phase::DecodingMcus;
        if let Err(err) = self.decode_next_mcu() {
            return self.fail(err);
        }
        if let Some(err) = self.bits.status() {
            return self.fail(err);
        }

        self.mcus_remaining -= 1;
        if self.mcus_remaining == 0 {
            log::debug!("jpeg scan complete");
            self.phase = Phase::Done;
        }
        Ok(())
    }

    pub(crate) fn fail(&mut self, err: Error) -> Result<()> {
        log::debug!("jpeg decoding stopped: {err}");
        self.phase = Phase::Failed(err);
        Err(err)
    }

    fn parse_headers(&mut self) -> Result<()> {
        self.bits.prime();
        self.locate_sof()?;
        self.init_frame()?;
        self.init_scan()
    }

    fn get8(&mut self) -> u8 {
        self.bits.get_bits1(8) as u8
    }

    fn get16(&mut self) -> u16 {
        self.bits.get_bits1(16)
    }

    fn locate_soi(&mut self) -> Result<()> {
        let mut last = self.get8();
        let mut this = self.get8();
        if last == 0xFF && this == markers::SOI {
            return Ok(());
        }

        let mut bytes_left = 4096u16;
        loop {
            bytes_left -= 1;
            if bytes_left == 0 {
                return Err(Error::NotJpeg);
            }
            last = this;
            this = self.get8();
            if last == 0xFF {
                if this == markers::SOI {
                    break;
                } else if this == markers::EOI {
                    return Err(Error::NotJpeg);
                }
            }
        }

        // The byte after SOI has to start another marker.
        if self.bits.peek_byte() != 0xFF {
            return Err(Error::NotJpeg);
        }
        Ok(())
    }

    fn locate_sof(&mut self) -> Result<()> {
        self.locate_soi()?;
        self.phase = Phase::HeaderParsing;

        match self.process_markers()? {
            markers::SOF0 => self.read_sof(),
            markers::SOI | markers::EOI | markers::SOS => Err(Error::UnexpectedMarker),
            c => {
                log::debug!("jpeg frame type {c:#04x} not supported");
                Err(Error::UnsupportedMode)
            }
        }
    }

    fn next_marker(&mut self) -> u8 {
        loop {
            let mut c = self.get8();
            while c != 0xFF {
                c = self.get8();
            }
            while c == 0xFF {
                c = self.get8();
            }
            if c != 0 {
                return c;
            }
        }
    }

    /// Consume table segments until a frame, scan or image boundary marker
    fn process_markers(&mut self) -> Result<u8> {
        loop {
            let c = self.next_marker();
            match c {
                markers::SOF0..=markers::SOF3
                | markers::SOF5..=markers::SOF7
                | markers::SOF9..=markers::SOF11
                | markers::SOF13..=markers::SOF15
                | markers::SOI
                | markers::EOI
                | markers::SOS => return Ok(c),
                markers::DHT => self.read_dht()?,
                markers::DAC => return Err(Error::UnsupportedMode),
                markers::DQT => self.read_dqt()?,
                markers::DRI => self.read_dri()?,
                markers::JPG | markers::RST0..=markers::RST7 | markers::TEM => {
                    return Err(Error::UnexpectedMarker)
                }
                _ => self.skip_variable_marker()?,
            }
        }
    }

    fn read_dht(&mut self) -> Result<()> {
        let mut left = self.get16();
        if left < 2 {
            return Err(Error::BadDhtMarker);
        }
        left -= 2;

        while left > 0 {
            let index = self.get8();
            if (index & 0xF) > 1 || (index & 0xF0) > 0x10 {
                return Err(Error::BadDhtIndex);
            }
            let tab = (((index >> 3) & 2) + (index & 1)) as usize;

            let mut bits = [0u8; 16];
            let mut total = 0u16;
            for b in bits.iter_mut() {
                *b = self.get8();
                total += *b as u16;
            }
            let limit = if tab < 2 { 12 } else { 255 };
            if total > limit {
                return Err(Error::BadDhtCounts);
            }
            if left < 17 + total {
                return Err(Error::BadDhtMarker);
            }

            let mut vals = [0u8; 256];
            for v in vals[..total as usize].iter_mut() {
                *v = self.get8();
            }
            let vals = &vals[..total as usize];
            match tab {
                0 | 1 => self.dc_tables[tab].create(&bits, vals)?,
                _ => self.ac_tables[tab - 2].create(&bits, vals)?,
            }
            self.valid_huff |= 1 << tab;
            log::debug!("jpeg DHT table {tab} with {total} codes");

            left -= 17 + total;
        }
        Ok(())
    }

    fn read_dqt(&mut self) -> Result<()> {
        let mut left = self.get16();
        if left < 2 {
            return Err(Error::BadDqtMarker);
        }
        left -= 2;

        while left > 0 {
            let index = self.get8();
            let n = (index & 0xF) as usize;
            if n > 1 {
                return Err(Error::BadDqtTable);
            }
            let wide = (index >> 4) != 0;
            let total = if wide { 129 } else { 65 };
            if left < total {
                return Err(Error::BadDqtLength);
            }

            for i in 0..64 {
                let mut temp = self.get8() as u16;
                if wide {
                    temp = (temp << 8) | self.get8() as u16;
                }
                self.quant[n][i] = temp as i16;
            }
            create_winograd_quant(&mut self.quant[n]);
            self.valid_quant |= 1 << n;

            left -= total;
        }
        Ok(())
    }

    fn read_dri(&mut self) -> Result<()> {
        if self.get16() != 4 {
            return Err(Error::BadDriLength);
        }
        self.restart_interval = self.get16();
        Ok(())
    }

    fn skip_variable_marker(&mut self) -> Result<()> {
        let left = self.get16();
        if left < 2 {
            return Err(Error::BadVariableMarker);
        }
        for _ in 0..left - 2 {
            self.get8();
        }
        Ok(())
    }

    fn read_sof(&mut self) -> Result<()> {
        let left = self.get16();
        if self.get8() != 8 {
            return Err(Error::BadPrecision);
        }

        self.image_y = self.get16();
        if !(1..=MAX_DIMENSION).contains(&self.image_y) {
            return Err(Error::BadHeight);
        }
        self.image_x = self.get16();
        if !(1..=MAX_DIMENSION).contains(&self.image_x) {
            return Err(Error::BadWidth);
        }

        self.comps_in_frame = self.get8();
        if self.comps_in_frame > 3 {
            return Err(Error::TooManyComponents);
        }
        if left != self.comps_in_frame as u16 * 3 + 8 {
            return Err(Error::BadSofLength);
        }

        for i in 0..self.comps_in_frame as usize {
            self.comp_ident[i] = self.get8();
            self.comp_h_samp[i] = self.bits.get_bits1(4) as u8;
            self.comp_v_samp[i] = self.bits.get_bits1(4) as u8;
            self.comp_quant[i] = self.get8();
            if self.comp_quant[i] > 1 {
                return Err(Error::UnsupportedQuantTable);
            }
        }

        self.output_type = self.output_type.for_components(self.comps_in_frame);
        Ok(())
    }

    fn init_frame(&mut self) -> Result<()> {
        self.scan_type = ScanType::from_sampling(self.comps_in_frame, self.comp_h_samp, self.comp_v_samp)?;

        let mcu_w = self.scan_type.mcu_width();
        let mcu_h = self.scan_type.mcu_height();
        self.info = ImageInfo {
            width: self.image_x,
            height: self.image_y,
            image_width: self.image_x,
            image_height: self.image_y,
            comps: self.comps_in_frame,
            scan_type: self.scan_type,
            mcus_per_row: self.image_x.div_ceil(mcu_w),
            mcus_per_col: self.image_y.div_ceil(mcu_h),
            mcu_width: mcu_w,
            mcu_height: mcu_h,
            output_type: self.output_type,
        };
        self.window = Window {
            x_offset: 0,
            y_offset: 0,
            width: self.image_x,
            height: self.image_y,
        };
        self.mcus_remaining = self.info.mcu_count();
        self.phase = Phase::FrameInitialized;
        Ok(())
    }

    fn read_sos(&mut self) -> Result<()> {
        let left = self.get16();
        let n = self.get8();
        self.comps_in_scan = n;

        let left = left.checked_sub(3).ok_or(Error::BadSosLength)?;
        if !(1..=3).contains(&n) || left != n as u16 * 2 + 3 {
            return Err(Error::BadSosLength);
        }

        for i in 0..n as usize {
            let cc = self.get8();
            let c = self.get8();
            let ci = self.comp_ident[..self.comps_in_frame as usize]
                .iter()
                .position(|&id| id == cc)
                .ok_or(Error::BadSosCompId)?;
            self.comp_list[i] = ci as u8;
            self.comp_dc_tab[ci] = c >> 4;
            self.comp_ac_tab[ci] = c & 15;
        }

        let spectral_start = self.get8();
        let spectral_end = self.get8();
        let successive = self.get8();
        if spectral_start != 0 || spectral_end != 63 || successive != 0 {
            return Err(Error::BadScan);
        }
        // Only one interleaved scan carrying every component is decoded.
        if n != self.comps_in_frame {
            return Err(Error::BadScan);
        }
        Ok(())
    }

    fn locate_sos(&mut self) -> Result<()> {
        match self.process_markers()? {
            markers::SOS => self.read_sos(),
            _ => Err(Error::UnexpectedMarker),
        }
    }

    fn check_huff_tables(&self) -> Result<()> {
        for &ci in &self.comp_list[..self.comps_in_scan as usize] {
            let dc = self.comp_dc_tab[ci as usize];
            let ac = self.comp_ac_tab[ci as usize];
            if dc > 1 || ac > 1 {
                return Err(Error::UndefinedHuffTable);
            }
            if self.valid_huff & (1 << dc) == 0 || self.valid_huff & (1 << (ac + 2)) == 0 {
                return Err(Error::UndefinedHuffTable);
            }
        }
        Ok(())
    }

    fn check_quant_tables(&self) -> Result<()> {
        for &ci in &self.comp_list[..self.comps_in_scan as usize] {
            if self.valid_quant & (1 << self.comp_quant[ci as usize]) == 0 {
                return Err(Error::UndefinedQuantTable);
            }
        }
        Ok(())
    }

    fn init_scan(&mut self) -> Result<()> {
        self.locate_sos()?;
        self.check_huff_tables()?;
        self.check_quant_tables()?;

        self.last_dc = [0; 3];
        if self.restart_interval != 0 {
            self.restarts_left = self.restart_interval;
            self.next_restart_num = 0;
        }
        self.bits.fix_in_buffer();
        self.phase = Phase::ScanInitialized;
        Ok(())
    }

    fn process_restart(&mut self) -> Result<()> {
        self.bits.process_restart(self.next_restart_num)?;
        log::trace!("jpeg RST{}", self.next_restart_num);
        self.last_dc = [0; 3];
        self.restarts_left = self.restart_interval;
        self.next_restart_num = (self.next_restart_num + 1) & 7;
        Ok(())
    }

    fn decode_next_mcu(&mut self) -> Result<()> {
        if self.restart_interval != 0 {
            if self.restarts_left == 0 {
                self.process_restart()?;
            }
            self.restarts_left -= 1;
        }

        let scan = self.scan_type;
        let reduced = self.output_type.is_reduced();

        for block in 0..scan.blocks_per_mcu() {
            let comp = self.comp_list[scan.component(block)] as usize;
            let q = self.comp_quant[comp] as usize;

            let s = huff_decode(&self.dc_tables[self.comp_dc_tab[comp] as usize], &mut self.bits)?;
            let extra = s & 0xF;
            let r = if extra != 0 { self.bits.get_bits2(extra) } else { 0 };
            let dc = huff_extend(r, s).wrapping_add(self.last_dc[comp]);
            self.last_dc[comp] = dc;

            self.coeffs = [0; 64];
            self.coeffs[0] = dc.wrapping_mul(self.quant[q][0]);

            let ac_table = &self.ac_tables[self.comp_ac_tab[comp] as usize];
            let mut k = 1usize;
            while k < 64 {
                let sym = huff_decode(ac_table, &mut self.bits)?;
                let extra = sym & 0xF;
                let extra_bits = if extra != 0 { self.bits.get_bits2(extra) } else { 0 };
                let run = (sym >> 4) as usize;
                let size = sym & 15;

                if size != 0 {
                    if k + run > 63 {
                        return Err(Error::DecodeError);
                    }
                    k += run;
                    if !reduced {
                        let ac = huff_extend(extra_bits, size);
                        self.coeffs[ZAG[k] as usize] = ac.wrapping_mul(self.quant[q][k]);
                    }
                } else if run == 15 {
                    // ZRL
                    if k + 16 > 64 {
                        return Err(Error::DecodeError);
                    }
                    k += 15;
                } else {
                    // EOB
                    break;
                }
                k += 1;
            }

            if reduced {
                self.mcu.transform_block_reduce(scan, block, self.coeffs[0]);
            } else {
                idct_block(&mut self.coeffs);
                self.mcu.transform_block(scan, block, &self.coeffs);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ReadError, SliceSource};
    use crate::testutil::{dc_for, init_logger, JpegWriter, Sampling};

    #[test]
    fn test_winograd_quant_rounds_to_idct_scale() {
        let mut q = [1i16; 64];
        q[1] = 3;
        create_winograd_quant(&mut q);
        assert_eq!(q[0], 16);
        assert_eq!(q[1], (178 * 3 + 4) >> 3);
        assert_eq!(q[63], 1);
    }

    #[test]
    fn test_info_for_gray_image() {
        let jpeg = JpegWriter::new(20, 12, Sampling::Gray).fill(&[dc_for(200)]).build();
        let mut src = SliceSource::new(&jpeg);
        let dec = JpegDecoder::init(&mut src, OutputType::Rgb888).unwrap();
        let info = dec.info();
        assert_eq!((info.width, info.height), (20, 12));
        assert_eq!(info.scan_type, ScanType::Grayscale);
        assert_eq!((info.mcus_per_row, info.mcus_per_col), (3, 2));
        assert_eq!(info.output_type, OutputType::Gray8);
        assert_eq!(dec.phase(), Phase::ScanInitialized);
    }

    #[test]
    fn test_decode_mcu_count_and_end() {
        let jpeg = JpegWriter::new(33, 17, Sampling::H2V2).build();
        let mut src = SliceSource::new(&jpeg);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Rgb888).unwrap();
        let total = dec.info().mcu_count();
        assert_eq!(total, 3 * 2);

        let mut decoded = 0;
        loop {
            match dec.decode_mcu() {
                Ok(()) => decoded += 1,
                Err(Error::NoMoreBlocks) => break,
                Err(e) => panic!("unexpected {e:?}"),
            }
        }
        assert_eq!(decoded, total);
        assert_eq!(dec.phase(), Phase::Done);
        assert_eq!(dec.decode_mcu(), Err(Error::NoMoreBlocks));
    }

    #[test]
    fn test_flat_mcu_value() {
        let jpeg = JpegWriter::new(8, 8, Sampling::Gray).fill(&[dc_for(200)]).build();
        let mut src = SliceSource::new(&jpeg);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        dec.decode_mcu().unwrap();
        let px = dec.mcu_pixels();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(px.pixel(x, y), (200, 200, 200));
            }
        }
    }

    #[test]
    fn test_restart_intervals_reset_prediction() {
        // Every MCU has the same value; with DC prediction reset at each
        // RST the encoder re-sends the absolute DC, which must decode the
        // same as the predicted stream.
        let dc = dc_for(64);
        let plain = JpegWriter::new(32, 8, Sampling::Gray).fill(&[dc]).build();
        let restarted = JpegWriter::new(32, 8, Sampling::Gray).fill(&[dc]).restart_interval(1).build();

        for jpeg in [plain, restarted] {
            let mut src = SliceSource::new(&jpeg);
            let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
            for _ in 0..4 {
                dec.decode_mcu().unwrap();
                assert_eq!(dec.mcu_pixels().pixel(3, 3).0, 64);
            }
            assert_eq!(dec.decode_mcu(), Err(Error::NoMoreBlocks));
        }
    }

    #[test]
    fn test_corrupt_restart_marker() {
        let jpeg = JpegWriter::new(32, 8, Sampling::Gray)
            .restart_interval(1)
            .corrupt_restart(1)
            .build();
        let mut src = SliceSource::new(&jpeg);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        dec.decode_mcu().unwrap();
        dec.decode_mcu().unwrap();
        assert_eq!(dec.decode_mcu(), Err(Error::BadRestartMarker));
        assert_eq!(dec.phase(), Phase::Failed(Error::BadRestartMarker));
        // sticky
        assert_eq!(dec.decode_mcu(), Err(Error::BadRestartMarker));
    }

    #[test]
    fn test_progressive_is_unsupported() {
        let jpeg = JpegWriter::new(8, 8, Sampling::Gray).frame_marker(0xC2).build();
        let mut src = SliceSource::new(&jpeg);
        assert_eq!(
            JpegDecoder::init(&mut src, OutputType::Gray8).err(),
            Some(Error::UnsupportedMode)
        );
    }

    #[test]
    fn test_not_jpeg() {
        let cases: [&[u8]; 3] = [b"", b"GIF89a\x01\x00\x01\x00", &[0xFF, 0xD9, 0, 0]];
        for data in cases {
            let mut src = SliceSource::new(data);
            assert_eq!(JpegDecoder::init(&mut src, OutputType::Gray8).err(), Some(Error::NotJpeg));
        }
    }

    #[test]
    fn test_header_truncated() {
        let jpeg = JpegWriter::new(8, 8, Sampling::Gray).build();
        // Cut inside the DQT segment
        let mut src = SliceSource::new(&jpeg[..10]);
        assert!(JpegDecoder::init(&mut src, OutputType::Gray8).is_err());
    }

    #[test]
    fn test_truncated_scan_drains() {
        // Entropy data cut short: padding decodes as zero symbols, so every
        // MCU still comes out and the stream reports exhaustion.
        let jpeg = JpegWriter::new(64, 64, Sampling::Gray).fill(&[dc_for(40)]).build();
        let cut = jpeg.len() - 20;
        let mut src = SliceSource::new(&jpeg[..cut]);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        let mut decoded = 0;
        while dec.decode_mcu().is_ok() {
            decoded += 1;
        }
        assert_eq!(decoded, 64);
        assert_eq!(dec.phase(), Phase::Done);
    }

    #[test]
    fn test_unmatched_dc_code() {
        init_logger();
        // 1111 is past the last 4-bit DC code and no longer codes exist
        let jpeg = JpegWriter::new(8, 8, Sampling::Gray).entropy(&[0xF0, 0, 0, 0]).build();
        let mut src = SliceSource::new(&jpeg);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        assert_eq!(dec.decode_mcu(), Err(Error::DecodeError));
        assert_eq!(dec.phase(), Phase::Failed(Error::DecodeError));
    }

    #[test]
    fn test_unmatched_code_after_source_ends() {
        init_logger();
        // Same bad code, but the file stops right after it: the register is
        // already being padded, so it reads as category 0
        let jpeg = JpegWriter::new(8, 8, Sampling::Gray).entropy(&[0xF0]).build();
        let mut src = SliceSource::new(&jpeg[..jpeg.len() - 2]);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        dec.decode_mcu().unwrap();
        assert_eq!(dec.mcu_pixels().pixel(0, 0), (128, 128, 128));
        assert_eq!(dec.decode_mcu(), Err(Error::NoMoreBlocks));
    }

    #[test]
    fn test_ac_index_overflow() {
        init_logger();
        // AC codes: 0000 EOB, 0001 ZRL, 0010 run 15 size 1.
        // DC 0 then four ZRLs: the fourth would run past coefficient 63
        let zrl = JpegWriter::new(8, 8, Sampling::Gray)
            .ac_symbols(&[0x00, 0xF0, 0xF1])
            .entropy(&[0x01, 0x11, 0x1F]);
        // DC 0 then four (15, 1) pairs: the fourth lands on index 64
        let run = JpegWriter::new(8, 8, Sampling::Gray)
            .ac_symbols(&[0x00, 0xF0, 0xF1])
            .entropy(&[0x02, 0x94, 0xA5]);

        for jpeg in [zrl.build(), run.build()] {
            let mut src = SliceSource::new(&jpeg);
            let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
            assert_eq!(dec.decode_mcu(), Err(Error::DecodeError));
        }
    }

    #[test]
    fn test_non_baseline_scan() {
        init_logger();
        let jpeg = JpegWriter::new(8, 8, Sampling::Gray).spectral_end(62).build();
        let mut src = SliceSource::new(&jpeg);
        assert_eq!(JpegDecoder::init(&mut src, OutputType::Gray8).err(), Some(Error::BadScan));
    }

    #[test]
    fn test_sampling_factors_from_frame_header() {
        init_logger();
        for hv in [0x41, 0x13, 0x00] {
            let jpeg = JpegWriter::new(16, 16, Sampling::H1V1).luma_sampling(hv).build();
            let mut src = SliceSource::new(&jpeg);
            assert_eq!(
                JpegDecoder::init(&mut src, OutputType::Rgb888).err(),
                Some(Error::UnsupportedSamplingFactors),
                "{hv:#04x}"
            );
        }
    }

    /// Hands out small reads, then fails at a fixed offset
    struct FailingSource {
        data: Vec<u8>,
        pos: usize,
        fail_at: usize,
    }

    impl ByteSource for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, ReadError> {
            if self.pos >= self.fail_at {
                return Err(ReadError);
            }
            let n = buf.len().min(8).min(self.fail_at - self.pos).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_read_failure_mid_scan() {
        init_logger();
        let jpeg = JpegWriter::new(64, 64, Sampling::Gray)
            .mcu_dc(|m, _| dc_for((m * 37 % 256) as u8))
            .build();
        let sos = jpeg.windows(2).position(|w| *w == [0xFF, 0xDA]).unwrap();
        let scan_start = sos + 2 + u16::from_be_bytes([jpeg[sos + 2], jpeg[sos + 3]]) as usize;

        let mut src = FailingSource { data: jpeg, pos: 0, fail_at: scan_start + 4 };
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        let mut decoded = 0;
        let err = loop {
            match dec.decode_mcu() {
                Ok(()) => decoded += 1,
                Err(err) => break err,
            }
        };
        assert_eq!(err, Error::StreamRead);
        assert!(decoded < 64);
        assert_eq!(dec.phase(), Phase::Failed(Error::StreamRead));
    }

    #[test]
    fn test_set_window_only_before_decoding() {
        let jpeg = JpegWriter::new(16, 16, Sampling::Gray).build();
        let mut src = SliceSource::new(&jpeg);
        let mut dec = JpegDecoder::init(&mut src, OutputType::Gray8).unwrap();
        assert_eq!(dec.set_window(0, 4, 0, 0), Err(Error::BadWindow));
        dec.set_window(8, 4, -1, -1).unwrap();
        assert_eq!(dec.window, Window { x_offset: 4, y_offset: 6, width: 8, height: 4 });
        assert_eq!((dec.info().width, dec.info().height), (8, 4));
        dec.decode_mcu().unwrap();
        assert_eq!(dec.set_window(8, 8, 0, 0), Err(Error::OutOfSequence));
    }

    #[test]
    fn test_storage_size_is_bounded() {
        let size = JpegDecoder::<SliceSource>::required_storage_size();
        assert!(size > 0);
        assert_eq!(size, JpegDecoder::<crate::FnSource<fn(&mut [u8]) -> usize>>::required_storage_size());
    }
}
