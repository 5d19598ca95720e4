//! MCU staging buffers and YCbCr to RGB conversion
//!
//! Each decoded block is merged into three 256-byte planes holding up to four
//! 8x8 tiles in raster order (tile `n` at offset `n * 64`). Luma blocks are
//! copied to all three planes; chroma blocks are upsampled over the tiles and
//! added on top.

use crate::idct::dc_sample;
use crate::types::{BlockRole, ScanType};

#[derive(Debug, Clone, Copy)]
enum Chroma {
    Cb,
    Cr,
}

#[inline]
fn add_and_clamp(a: u8, b: i32) -> u8 {
    (a as i32 + b).clamp(0, 255) as u8
}

#[inline]
fn sub_and_clamp(a: u8, b: i32) -> u8 {
    (a as i32 - b).clamp(0, 255) as u8
}

// R = Y + 1.402 (Cr-128)
#[inline]
fn cr_r(cr: u8) -> i32 {
    let cr = cr as i32;
    cr + ((cr * 103) >> 8) - 179
}

// G = Y - 0.34414 (Cb-128) - 0.71414 (Cr-128)
#[inline]
fn cb_g(cb: u8) -> i32 {
    ((cb as i32 * 88) >> 8) - 44
}

#[inline]
fn cr_g(cr: u8) -> i32 {
    ((cr as i32 * 183) >> 8) - 91
}

// B = Y + 1.772 (Cb-128)
#[inline]
fn cb_b(cb: u8) -> i32 {
    let cb = cb as i32;
    cb + ((cb * 198) >> 8) - 227
}

/// Planar RGB for one MCU
#[derive(Debug, Clone)]
pub struct McuBuffers {
    pub r: [u8; 256],
    pub g: [u8; 256],
    pub b: [u8; 256],
}

impl McuBuffers {
    pub const fn new() -> Self {
        Self {
            r: [0; 256],
            g: [0; 256],
            b: [0; 256],
        }
    }

    fn apply(&mut self, chroma: Chroma, c: u8, d: usize) {
        match chroma {
            Chroma::Cb => {
                self.g[d] = sub_and_clamp(self.g[d], cb_g(c));
                self.b[d] = add_and_clamp(self.b[d], cb_b(c));
            }
            Chroma::Cr => {
                self.r[d] = add_and_clamp(self.r[d], cr_r(c));
                self.g[d] = sub_and_clamp(self.g[d], cr_g(c));
            }
        }
    }

    /// Spread an (8/hx) x (8/vy) region of `samples` starting at `src` over
    /// the tile at `dst`.
    fn upsample(&mut self, chroma: Chroma, samples: &[i16; 64], src: usize, dst: usize, hx: usize, vy: usize) {
        let (w, h) = (8 / hx, 8 / vy);
        for y in 0..h {
            for x in 0..w {
                let c = samples[src + y * 8 + x] as u8;
                for dy in 0..vy {
                    for dx in 0..hx {
                        self.apply(chroma, c, dst + (y * vy + dy) * 8 + x * hx + dx);
                    }
                }
            }
        }
    }

    /// Merge a block of IDCT output samples
    pub fn transform_block(&mut self, scan: ScanType, block: usize, samples: &[i16; 64]) {
        let chroma = match scan.role(block) {
            BlockRole::Luma(dst) => {
                for (i, &s) in samples.iter().enumerate() {
                    let v = s as u8;
                    self.r[dst + i] = v;
                    self.g[dst + i] = v;
                    self.b[dst + i] = v;
                }
                return;
            }
            BlockRole::Cb => Chroma::Cb,
            BlockRole::Cr => Chroma::Cr,
        };

        let (hx, vy) = scan.chroma_factors();
        for &(src, dst) in scan.chroma_targets() {
            self.upsample(chroma, samples, src, dst, hx, vy);
        }
    }

    /// Merge a block from its DC coefficient only; each tile keeps one
    /// sample at its first position.
    pub fn transform_block_reduce(&mut self, scan: ScanType, block: usize, dc: i16) {
        let c = dc_sample(dc);
        let chroma = match scan.role(block) {
            BlockRole::Luma(dst) => {
                self.r[dst] = c;
                self.g[dst] = c;
                self.b[dst] = c;
                return;
            }
            BlockRole::Cb => Chroma::Cb,
            BlockRole::Cr => Chroma::Cr,
        };

        for &(_, dst) in scan.chroma_targets() {
            self.apply(chroma, c, dst);
        }
    }
}

impl Default for McuBuffers {
    fn default() -> Self {
        Self::new()
    }
}
