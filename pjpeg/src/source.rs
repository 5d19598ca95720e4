//! Pull-based byte sources shared by the decoders

/// Failure reported by a byte source
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("byte source read failed")]
pub struct ReadError;

/// A positioned stream the decoders pull bytes from
///
/// Short reads are allowed; `Ok(0)` signals end of data.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError>;

    /// Skip `n` bytes forward. Returns the number actually skipped, which is
    /// smaller than `n` only at end of data.
    fn skip(&mut self, n: usize) -> Result<usize, ReadError> {
        let mut scratch = [0u8; 64];
        let mut left = n;
        while left > 0 {
            let want = left.min(scratch.len());
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                break;
            }
            left -= got;
        }
        Ok(n - left)
    }

    /// Read until `buf` is full or the source ends
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let mut total = 0;
        while total < buf.len() {
            let got = self.read(&mut buf[total..])?;
            if got == 0 {
                break;
            }
            total += got;
        }
        Ok(total)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        (**self).read(buf)
    }

    fn skip(&mut self, n: usize) -> Result<usize, ReadError> {
        (**self).skip(n)
    }
}

/// In-memory source
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn skip(&mut self, n: usize) -> Result<usize, ReadError> {
        let n = n.min(self.remaining());
        self.pos += n;
        Ok(n)
    }
}

/// Source backed by a read callback returning the number of bytes produced
pub struct FnSource<F>(pub F);

impl<F: FnMut(&mut [u8]) -> usize> ByteSource for FnSource<F> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        Ok((self.0)(buf).min(buf.len()))
    }
}

/// Adapter for any [`std::io::Read`]
#[cfg(feature = "std")]
pub struct IoSource<R> {
    inner: R,
}

#[cfg(feature = "std")]
impl<R: std::io::Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(feature = "std")]
impl<R: std::io::Read> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::warn!("read error: {err:?}");
                    return Err(ReadError);
                }
            }
        }
    }

    fn skip(&mut self, n: usize) -> Result<usize, ReadError> {
        let mut limited = std::io::Read::take(&mut self.inner, n as u64);
        match std::io::copy(&mut limited, &mut std::io::sink()) {
            Ok(skipped) => Ok(skipped as usize),
            Err(err) => {
                log::warn!("skip error: {err:?}");
                Err(ReadError)
            }
        }
    }
}
