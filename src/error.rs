use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt data: {0}")]
    Corrupt(&'static str),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("header magic corrupted: found {found:#018x}, expected {expected:#018x}")]
    BadMagic { expected: u64, found: u64 },
    #[error("{field} unknown: read {found}, expected {expected}")]
    SizeMismatch {
        field: &'static str,
        expected: u64,
        found: u64,
    },
    #[error("header version mismatch: {major}.{minor}, expected {expected_major}.{expected_minor}")]
    UnsupportedVersion {
        major: u16,
        minor: u16,
        expected_major: u16,
        expected_minor: u16,
    },
    #[error("file of {file_size} bytes cannot hold a {footer_size} byte footer")]
    TruncatedFooter { file_size: u64, footer_size: u64 },
    #[error("unknown operation type {0:#04x}")]
    UnknownOpType(u8),
    #[error("num ops does not match: footer says {expected}, found {found}")]
    OpCountMismatch { expected: u64, found: u64 },
    #[error("ops size does not match: footer says {expected}, found {found}")]
    OpsSizeMismatch { expected: u64, found: u64 },
    #[error("{0} checksum does not match")]
    ChecksumMismatch(&'static str),
    #[error("footer required but container is not finalized")]
    FooterRequired,
    #[error("{merge_ops} merged operations recorded, only {available} present")]
    MergeOverrun { merge_ops: u64, available: u64 },
    #[error("invalid data offset: {offset}, {len} bytes")]
    OutOfBounds { offset: u64, len: u64 },
    #[error("unknown compression type: {0}")]
    UnknownCompression(u8),
    #[error("payload length mismatch: expected {expected} bytes, got {found}")]
    PayloadLength { expected: u64, found: u64 },
    #[error("byte sink refused a buffer")]
    SinkRejected,
}

impl Error {
    /// Checksum or footer-accounting failure against a confirmed footer.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Error::OpCountMismatch { .. } | Error::OpsSizeMismatch { .. } | Error::ChecksumMismatch(_)
        )
    }

    /// Recovers a crate error that travelled through an `io::Read` boundary.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        if err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(inner) = inner.downcast::<Error>() {
                    return *inner;
                }
            }
            return Error::Corrupt("lost wrapped error");
        }
        Error::Io(err)
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(err) => err,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
