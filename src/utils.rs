use pjpeg::ByteSource;

use crate::error::{Error, Result};

/// Fill `buf` completely or report truncation
pub fn read_exact<S: ByteSource + ?Sized>(src: &mut S, buf: &mut [u8]) -> Result<()> {
    if src.fill(buf)? != buf.len() {
        return Err(Error::Truncated);
    }
    Ok(())
}

pub fn read_u8<S: ByteSource + ?Sized>(src: &mut S) -> Result<u8> {
    let mut b = [0u8; 1];
    read_exact(src, &mut b)?;
    Ok(b[0])
}

pub fn skip_exact<S: ByteSource + ?Sized>(src: &mut S, n: usize) -> Result<()> {
    if src.skip(n)? != n {
        return Err(Error::Truncated);
    }
    Ok(())
}

#[inline]
pub fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

#[inline]
pub fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline]
pub fn le_i32(b: &[u8], at: usize) -> i32 {
    le_u32(b, at) as i32
}

#[cfg(test)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pjpeg::SliceSource;

    #[test]
    fn test_short_reads_are_truncation() {
        let data = [1u8, 2, 3];
        let mut src = SliceSource::new(&data);
        assert_eq!(read_u8(&mut src).unwrap(), 1);
        let mut buf = [0u8; 4];
        assert_eq!(read_exact(&mut src, &mut buf), Err(Error::Truncated));

        let mut src = SliceSource::new(&data);
        assert_eq!(skip_exact(&mut src, 4), Err(Error::Truncated));
    }

    #[test]
    fn test_little_endian() {
        let b = [0x34, 0x12, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(le_u16(&b, 0), 0x1234);
        assert_eq!(le_i32(&b, 2), -1);
    }
}
