//! Integer Winograd IDCT
//!
//! Works in place on a dequantized 8x8 block whose coefficients were
//! prescaled by the Winograd factors. The row pass keeps 16-bit
//! intermediates; the column pass descales and level-shifts to 0..=255.

use crate::tables::DCT_SCALE_BITS;

const B1_B3: i32 = 362;
const B2: i32 = 669;
const B4: i32 = 277;
const B5: i32 = 196;

#[inline]
fn imul(w: i16, k: i32) -> i16 {
    ((w as i32 * k + 128) >> 8) as i16
}

#[inline]
fn descale(x: i32) -> i32 {
    (x + (1 << (DCT_SCALE_BITS - 1))) >> DCT_SCALE_BITS
}

#[inline]
fn clamp(x: i32) -> i16 {
    (x as i16).clamp(0, 255)
}

/// One 8-point 1-D transform
fn butterfly(s: [i16; 8]) -> [i32; 8] {
    let x4 = s[5].wrapping_sub(s[3]);
    let x7 = s[5].wrapping_add(s[3]);
    let x5 = s[1].wrapping_add(s[7]);
    let x6 = s[1].wrapping_sub(s[7]);

    let tmp1 = imul(x4.wrapping_sub(x6), B5);
    let stg26 = imul(x6, B4).wrapping_sub(tmp1);
    let x24 = tmp1.wrapping_sub(imul(x4, B2));
    let x15 = x5.wrapping_sub(x7);
    let x17 = x5.wrapping_add(x7);
    let tmp2 = stg26.wrapping_sub(x17);
    let tmp3 = imul(x15, B1_B3).wrapping_sub(tmp2);
    let x44 = tmp3.wrapping_add(x24);

    let x30 = s[0].wrapping_add(s[4]);
    let x31 = s[0].wrapping_sub(s[4]);
    let x12 = s[2].wrapping_sub(s[6]);
    let x13 = s[2].wrapping_add(s[6]);
    let x32 = imul(x12, B1_B3).wrapping_sub(x13);
    let x40 = x30.wrapping_add(x13);
    let x43 = x30.wrapping_sub(x13);
    let x41 = x31.wrapping_add(x32);
    let x42 = x31.wrapping_sub(x32);

    let w = |v: i16| v as i32;
    [
        w(x40) + w(x17),
        w(x41) + w(tmp2),
        w(x42) + w(tmp3),
        w(x43) - w(x44),
        w(x43) + w(x44),
        w(x42) - w(tmp3),
        w(x41) - w(tmp2),
        w(x40) - w(x17),
    ]
}

fn idct_rows(block: &mut [i16; 64]) {
    for row in block.chunks_exact_mut(8) {
        if row[1..].iter().all(|&c| c == 0) {
            let dc = row[0];
            row.fill(dc);
            continue;
        }
        let mut s = [0i16; 8];
        s.copy_from_slice(row);
        for (dst, v) in row.iter_mut().zip(butterfly(s)) {
            *dst = v as i16;
        }
    }
}

fn idct_cols(block: &mut [i16; 64]) {
    for col in 0..8 {
        let mut s = [0i16; 8];
        for (i, v) in s.iter_mut().enumerate() {
            *v = block[i * 8 + col];
        }

        if s[1..].iter().all(|&c| c == 0) {
            let c = clamp(descale(s[0] as i32) + 128);
            for i in 0..8 {
                block[i * 8 + col] = c;
            }
            continue;
        }

        for (i, v) in butterfly(s).into_iter().enumerate() {
            block[i * 8 + col] = clamp(descale(v) + 128);
        }
    }
}

/// Transform a block in place, leaving samples in 0..=255
pub fn idct_block(block: &mut [i16; 64]) {
    idct_rows(block);
    idct_cols(block);
}

/// DC-only shortcut used by the reduced output modes
pub fn dc_sample(dc: i16) -> u8 {
    clamp(descale(dc as i32) + 128) as u8
}
