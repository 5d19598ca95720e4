//! GIF variable-length-code LZW decompressor
//!
//! Codes are pulled straight from the data sub-blocks. Only the current
//! sub-block plus two carried-over bytes are buffered.

use heapless::Vec;
use log::debug;
use pjpeg::ByteSource;

use crate::error::{Error, Result};
use crate::utils::{read_exact, read_u8};

pub const MAX_LZW_BITS: u8 = 12;
const MAX_CODES: usize = 1 << MAX_LZW_BITS;

/// Sub-block payload plus the two bytes kept from the previous one
const BUF_LEN: usize = 2 + 255 + 3;

pub struct Lzw {
    min_code_size: u8,
    code_size: u8,
    clear_code: u16,
    end_code: u16,
    max_code: u16,
    max_code_size: u16,
    first_code: u16,
    old_code: u16,
    return_clear: bool,

    // Bit reader
    buf: [u8; BUF_LEN],
    cur_bit: usize,
    last_bit: usize,
    last_byte: usize,
    get_done: bool,

    // Dictionary: `prefix[c]` chains back, `suffix[c]` is the last index
    prefix: [u16; MAX_CODES],
    suffix: [u8; MAX_CODES],
    stack: Vec<u8, MAX_CODES>,
}

impl Default for Lzw {
    fn default() -> Self {
        Self::new()
    }
}

impl Lzw {
    pub fn new() -> Self {
        Self {
            min_code_size: 0,
            code_size: 0,
            clear_code: 0,
            end_code: 0,
            max_code: 0,
            max_code_size: 0,
            first_code: 0,
            old_code: 0,
            return_clear: false,
            buf: [0; BUF_LEN],
            cur_bit: 0,
            last_bit: 0,
            last_byte: 2,
            get_done: true,
            prefix: [0; MAX_CODES],
            suffix: [0; MAX_CODES],
            stack: Vec::new(),
        }
    }

    /// Start a new image body with the given minimum code size.
    ///
    /// Indices are stored as bytes, so sizes above 8 are rejected.
    pub fn reset(&mut self, min_code_size: u8) -> Result<()> {
        if !(1..=8).contains(&min_code_size) {
            debug!("lzw minimum code size {min_code_size} out of range");
            return Err(Error::MalformedLzw);
        }
        self.min_code_size = min_code_size;
        self.code_size = min_code_size + 1;
        self.clear_code = 1 << min_code_size;
        self.end_code = self.clear_code + 1;
        self.max_code = self.clear_code + 2;
        self.max_code_size = self.clear_code << 1;
        self.first_code = 0;
        self.old_code = 0;
        self.return_clear = true;
        self.buf = [0; BUF_LEN];
        self.cur_bit = 0;
        self.last_bit = 0;
        self.last_byte = 2;
        self.get_done = false;
        self.stack.clear();
        Ok(())
    }

    pub fn code_size(&self) -> u8 {
        self.code_size
    }

    /// True once the zero-length terminator of the data sub-blocks was read
    pub fn exhausted(&self) -> bool {
        self.get_done
    }

    /// Next raw code, or `None` once the sub-blocks run dry.
    ///
    /// The first call after [`reset`](Self::reset) yields a clear code
    /// without touching the stream.
    pub fn next_code<S: ByteSource + ?Sized>(&mut self, src: &mut S) -> Result<Option<u16>> {
        if self.return_clear {
            self.return_clear = false;
            return Ok(Some(self.clear_code));
        }

        let size = self.code_size as usize;
        while self.cur_bit + size > self.last_bit {
            if self.get_done {
                return Ok(None);
            }
            self.buf[0] = self.buf[self.last_byte - 2];
            self.buf[1] = self.buf[self.last_byte - 1];
            let count = read_sub_block(src, &mut self.buf[2..257])?;
            if count == 0 {
                self.get_done = true;
            }
            self.last_byte = 2 + count;
            self.cur_bit = self.cur_bit + 16 - self.last_bit;
            self.last_bit = self.last_byte * 8;
        }

        let i = self.cur_bit >> 3;
        let raw = self.buf[i] as u32 | (self.buf[i + 1] as u32) << 8 | (self.buf[i + 2] as u32) << 16;
        let code = (raw >> (self.cur_bit & 7)) & ((1 << size) - 1);
        self.cur_bit += size;
        Ok(Some(code as u16))
    }

    /// Next decoded palette index, or `None` at the end code or end of data
    pub fn next_index<S: ByteSource + ?Sized>(&mut self, src: &mut S) -> Result<Option<u8>> {
        if let Some(index) = self.stack.pop() {
            return Ok(Some(index));
        }

        loop {
            let Some(code) = self.next_code(src)? else {
                return Ok(None);
            };

            if code == self.clear_code {
                return self.clear(src);
            }
            if code == self.end_code {
                return Ok(None);
            }

            let in_code = code;
            let mut code = code;
            if code >= self.max_code {
                if code > self.max_code {
                    debug!("lzw code {code} beyond table end {}", self.max_code);
                    return Err(Error::MalformedLzw);
                }
                self.push(self.first_code as u8)?;
                code = self.old_code;
            }

            while code >= self.clear_code {
                self.push(self.suffix[code as usize])?;
                let next = self.prefix[code as usize];
                if next == code {
                    return Err(Error::MalformedLzw);
                }
                code = next;
            }

            self.first_code = self.suffix[code as usize] as u16;
            self.push(self.first_code as u8)?;

            if (self.max_code as usize) < MAX_CODES {
                let slot = self.max_code as usize;
                self.prefix[slot] = self.old_code;
                self.suffix[slot] = self.first_code as u8;
                self.max_code += 1;
                if self.max_code >= self.max_code_size && (self.max_code_size as usize) < MAX_CODES {
                    self.max_code_size <<= 1;
                    self.code_size += 1;
                }
            }
            self.old_code = in_code;

            if let Some(index) = self.stack.pop() {
                return Ok(Some(index));
            }
        }
    }

    fn clear<S: ByteSource + ?Sized>(&mut self, src: &mut S) -> Result<Option<u8>> {
        self.prefix = [0; MAX_CODES];
        for i in 0..self.clear_code {
            self.suffix[i as usize] = i as u8;
        }
        self.code_size = self.min_code_size + 1;
        self.max_code_size = self.clear_code << 1;
        self.max_code = self.clear_code + 2;
        self.stack.clear();

        let first = loop {
            match self.next_code(src)? {
                Some(code) if code == self.clear_code => continue,
                Some(code) => break code,
                None => return Ok(None),
            }
        };
        if first == self.end_code {
            return Ok(None);
        }
        if first > self.clear_code {
            debug!("lzw first code {first} is not a literal");
            return Err(Error::MalformedLzw);
        }
        self.first_code = first;
        self.old_code = first;
        Ok(Some(first as u8))
    }

    fn push(&mut self, index: u8) -> Result<()> {
        self.stack.push(index).map_err(|_| Error::MalformedLzw)
    }
}

/// Read one length-prefixed sub-block into `buf`. Returns its length; zero
/// marks the block terminator.
fn read_sub_block<S: ByteSource + ?Sized>(src: &mut S, buf: &mut [u8]) -> Result<usize> {
    let len = read_u8(src)? as usize;
    read_exact(src, &mut buf[..len])?;
    Ok(len)
}

/// Pack indices as literal codes only, clearing before the code size would
/// grow. Output starts with the minimum code size byte and ends with the
/// sub-block terminator.
#[cfg(test)]
pub(crate) fn pack_literals(min_code_size: u8, indices: &[u8]) -> std::vec::Vec<u8> {
    let clear = 1u32 << min_code_size;
    let size = min_code_size as u32 + 1;
    let per_clear = (clear - 2).max(1) as usize;

    let mut bits = std::vec::Vec::new();
    let mut acc = 0u32;
    let mut n = 0u32;
    let mut put = |code: u32, bits: &mut std::vec::Vec<u8>| {
        acc |= code << n;
        n += size;
        while n >= 8 {
            bits.push(acc as u8);
            acc >>= 8;
            n -= 8;
        }
    };

    for chunk in indices.chunks(per_clear) {
        put(clear, &mut bits);
        for &i in chunk {
            put(i as u32, &mut bits);
        }
    }
    put(clear + 1, &mut bits);
    if n > 0 {
        bits.push(acc as u8);
    }

    let mut out = vec![min_code_size];
    for block in bits.chunks(255) {
        out.push(block.len() as u8);
        out.extend_from_slice(block);
    }
    out.push(0);
    out
}
