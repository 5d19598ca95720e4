//! Errors shared by the BMP and GIF decoders, plus JPEG passthrough

pub use pjpeg::ErrorKind;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("bad file signature")]
    BadSignature,
    #[error("unsupported format")]
    UnsupportedFormat,
    #[error("unexpected end of data")]
    Truncated,
    #[error("byte source read failed")]
    Read,
    #[error("malformed LZW data")]
    MalformedLzw,
    #[error("unknown block introducer {0:#04x}")]
    UnknownBlock(u8),
    #[error("bad block length")]
    BadBlock,
    #[error("jpeg: {0}")]
    Jpeg(#[from] pjpeg::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedFormat => ErrorKind::Unsupported,
            Error::Truncated | Error::Read => ErrorKind::Truncated,
            Error::MalformedLzw => ErrorKind::Decode,
            Error::BadSignature | Error::UnknownBlock(_) | Error::BadBlock => {
                ErrorKind::MalformedContainer
            }
            Error::Jpeg(err) => err.kind(),
        }
    }
}

impl From<pjpeg::ReadError> for Error {
    fn from(_: pjpeg::ReadError) -> Self {
        Error::Read
    }
}
