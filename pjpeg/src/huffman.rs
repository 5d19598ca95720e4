//! Huffman decoding and the entropy bit reader

use crate::source::ByteSource;
use crate::types::{Error, Result};

/// Size of the stream lookahead buffer
pub const IN_BUF_SIZE: usize = 256;

/// Bytes kept free at the front of the lookahead buffer for pushed-back bytes
const STUFF_RESERVE: usize = 4;

/// Canonical Huffman table for DC or AC symbols
///
/// `max_code[i] == 0xFFFF` marks a code length `i + 1` with no codes.
#[derive(Debug, Clone)]
pub struct HuffmanTable<const N: usize> {
    pub min_code: [u16; 16],
    pub max_code: [u16; 16],
    pub val_ptr: [u8; 16],
    pub values: heapless::Vec<u8, N>,
}

impl<const N: usize> HuffmanTable<N> {
    pub const fn new() -> Self {
        Self {
            min_code: [0; 16],
            max_code: [0xFFFF; 16],
            val_ptr: [0; 16],
            values: heapless::Vec::new(),
        }
    }

    /// Create Huffman table from the 16 bit-length counts and the symbol list
    pub fn create(&mut self, bits: &[u8; 16], values: &[u8]) -> Result<()> {
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        if total != values.len() {
            return Err(Error::BadDhtCounts);
        }

        self.values.clear();
        self.values
            .extend_from_slice(values)
            .map_err(|_| Error::BadDhtCounts)?;

        let mut code = 0u16;
        let mut j = 0u8;
        for (i, &num) in bits.iter().enumerate() {
            if num == 0 {
                self.min_code[i] = 0;
                self.max_code[i] = 0xFFFF;
                self.val_ptr[i] = 0;
            } else {
                self.min_code[i] = code;
                self.max_code[i] = code.wrapping_add(num as u16 - 1);
                self.val_ptr[i] = j;
                j = j.wrapping_add(num);
                code = code.wrapping_add(num as u16);
            }
            code <<= 1;
        }

        Ok(())
    }

    /// Extract one symbol, pulling a bit at a time from `next_bit`.
    /// Returns `None` when no code of up to 16 bits matches.
    pub fn decode(&self, mut next_bit: impl FnMut() -> u16) -> Option<u8> {
        let mut code = next_bit();
        for i in 0..16 {
            let max = self.max_code[i];
            if max != 0xFFFF && code <= max {
                let idx = self.val_ptr[i] as usize + code.wrapping_sub(self.min_code[i]) as usize;
                return self.values.get(idx).copied();
            }
            if i < 15 {
                code = (code << 1) | next_bit();
            }
        }
        None
    }
}

impl<const N: usize> Default for HuffmanTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bit reader over a byte source
///
/// Keeps a 16-bit shift register fed one byte at a time from a small
/// lookahead buffer. Header parsing reads raw bytes through it; entropy
/// decoding additionally removes 0xFF00 stuffing and leaves markers in the
/// stream. Once the source runs dry it keeps producing 0xFF 0xD9 so a
/// truncated file looks like it ends in EOI.
pub struct BitStream<'s, S: ?Sized> {
    src: &'s mut S,
    in_buf: [u8; IN_BUF_SIZE],
    in_buf_ofs: usize,
    in_buf_left: usize,
    bit_buf: u16,
    bits_left: u8,
    tem_flag: bool,
    status: Option<Error>,
    exhausted: bool,
}

impl<'s, S: ByteSource + ?Sized> BitStream<'s, S> {
    pub fn new(src: &'s mut S) -> Self {
        Self {
            src,
            in_buf: [0; IN_BUF_SIZE],
            in_buf_ofs: STUFF_RESERVE,
            in_buf_left: 0,
            bit_buf: 0,
            bits_left: 0,
            tem_flag: false,
            status: None,
            exhausted: false,
        }
    }

    /// First failure reported by the byte source
    pub fn status(&self) -> Option<Error> {
        self.status
    }

    /// True once synthetic EOI padding has been produced. The shift register
    /// can still hold up to two real bytes at that point.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Load the first two bytes into the shift register
    pub fn prime(&mut self) {
        self.bits_left = 8;
        self.get_bits1(8);
        self.get_bits1(8);
    }

    fn fill(&mut self) {
        self.in_buf_ofs = STUFF_RESERVE;
        self.in_buf_left = 0;
        if self.status.is_some() {
            return;
        }
        match self.src.read(&mut self.in_buf[STUFF_RESERVE..]) {
            Ok(n) => self.in_buf_left = n.min(IN_BUF_SIZE - STUFF_RESERVE),
            Err(_) => self.status = Some(Error::StreamRead),
        }
    }

    pub fn get_char(&mut self) -> u8 {
        if self.in_buf_left == 0 {
            self.fill();
            if self.in_buf_left == 0 {
                if !self.exhausted {
                    log::warn!("jpeg stream ended early, padding with EOI");
                    self.exhausted = true;
                }
                self.tem_flag = !self.tem_flag;
                return if self.tem_flag { 0xFF } else { 0xD9 };
            }
        }
        self.in_buf_left -= 1;
        let c = self.in_buf[self.in_buf_ofs];
        self.in_buf_ofs += 1;
        c
    }

    fn stuff_char(&mut self, c: u8) {
        if let Some(ofs) = self.in_buf_ofs.checked_sub(1) {
            self.in_buf_ofs = ofs;
            self.in_buf[ofs] = c;
            self.in_buf_left += 1;
        }
    }

    /// With `ff_check`, 0xFF00 yields 0xFF and a real marker is pushed back
    /// so every later read sees it again.
    fn get_octet(&mut self, ff_check: bool) -> u8 {
        let c = self.get_char();
        if ff_check && c == 0xFF {
            let n = self.get_char();
            if n != 0 {
                self.stuff_char(n);
                self.stuff_char(0xFF);
            }
        }
        c
    }

    fn get_bits(&mut self, num_bits: u8, ff_check: bool) -> u16 {
        if num_bits == 0 {
            return 0;
        }
        let orig_bits = num_bits;
        let mut num_bits = num_bits.min(16);
        let mut ret = self.bit_buf;

        if num_bits > 8 {
            num_bits -= 8;
            self.bit_buf <<= self.bits_left;
            self.bit_buf |= self.get_octet(ff_check) as u16;
            self.bit_buf <<= 8 - self.bits_left;
            ret = (ret & 0xFF00) | (self.bit_buf >> 8);
        }

        if self.bits_left < num_bits {
            self.bit_buf <<= self.bits_left;
            self.bit_buf |= self.get_octet(ff_check) as u16;
            self.bit_buf <<= num_bits - self.bits_left;
            self.bits_left = 8 - (num_bits - self.bits_left);
        } else {
            self.bits_left -= num_bits;
            self.bit_buf <<= num_bits;
        }

        ret >> (16 - orig_bits.min(16))
    }

    /// Raw read used while parsing headers
    pub fn get_bits1(&mut self, num_bits: u8) -> u16 {
        self.get_bits(num_bits, false)
    }

    /// Entropy-coded read with 0xFF00 unstuffing
    pub fn get_bits2(&mut self, num_bits: u8) -> u16 {
        self.get_bits(num_bits, true)
    }

    pub fn get_bit(&mut self) -> u16 {
        let ret = (self.bit_buf >> 15) & 1;
        if self.bits_left == 0 {
            self.bit_buf |= self.get_octet(true) as u16;
            self.bits_left += 8;
        }
        self.bits_left -= 1;
        self.bit_buf <<= 1;
        ret
    }

    /// High byte of the shift register, the next byte header parsing returns
    pub fn peek_byte(&self) -> u8 {
        (self.bit_buf >> 8) as u8
    }

    /// Hand the bytes buffered during marker scanning back to the stream and
    /// restart the register in entropy mode.
    pub fn fix_in_buffer(&mut self) {
        if self.bits_left > 0 {
            self.stuff_char(self.bit_buf as u8);
        }
        self.stuff_char((self.bit_buf >> 8) as u8);

        self.bits_left = 8;
        self.get_bits2(8);
        self.get_bits2(8);
    }

    /// Scan a bounded distance for RSTn with the expected number, then
    /// restart the register after it.
    pub fn process_restart(&mut self, expected: u8) -> Result<()> {
        let mut i = 1536u16;
        while i > 0 {
            if self.get_char() == 0xFF {
                break;
            }
            i -= 1;
        }
        if i == 0 {
            return Err(Error::BadRestartMarker);
        }

        let mut c = 0u8;
        while i > 0 {
            c = self.get_char();
            if c != 0xFF {
                break;
            }
            i -= 1;
        }
        if i == 0 || c != 0xD0 + (expected & 7) {
            return Err(Error::BadRestartMarker);
        }

        self.bits_left = 8;
        self.get_bits2(8);
        self.get_bits2(8);
        Ok(())
    }
}

/// Decode one symbol; once the source has run dry an unmatched code reads
/// as 0 so the trailing MCUs drain instead of failing. That includes codes in
/// the last real bytes still in the register.
pub fn huff_decode<const N: usize, S: ByteSource + ?Sized>(
    table: &HuffmanTable<N>,
    bits: &mut BitStream<'_, S>,
) -> Result<u8> {
    match table.decode(|| bits.get_bit()) {
        Some(v) => Ok(v),
        None if bits.is_exhausted() => Ok(0),
        None => Err(Error::DecodeError),
    }
}

/// Sign-extend `s` raw bits into a coefficient
pub fn huff_extend(x: u16, s: u8) -> i16 {
    if s == 0 || s > 15 {
        return x as i16;
    }
    if x < (1u16 << (s - 1)) {
        (x as i16).wrapping_add(((-1i32 << s) + 1) as i16)
    } else {
        x as i16
    }
}
