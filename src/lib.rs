//! Read-side decoding of copy-on-write snapshot containers.
//!
//! A container holds a header, a sequence of block operations (replace, copy,
//! zero, label) each followed by its payload, and an optional footer carrying
//! operation counts and checksums. [`CowReader`] validates the container in a
//! single pass, tolerates a missing footer by recovering whatever was fully
//! written, and decodes operation payloads through the [`Decompressor`]
//! variants.

pub mod config;
pub mod decompress;
pub mod digest;
pub mod error;
pub mod format;
pub mod ops;
mod parser;
pub mod reader;
pub mod stream;

pub use config::{DigestKind, FooterPolicy, ReaderConfig};
pub use decompress::{BufferSink, ByteSink, Decompressor, WriteSink, MAX_WINDOW};
pub use digest::{Blake3Digest, Checksum, Digest, NullDigest, Sha256Digest, DIGEST_LEN};
pub use error::{Error, Result};
pub use format::{
    Compression, CowFooter, CowHeader, FooterData, FooterOp, OpType, Operation, FOOTER_SIZE,
    HEADER_SIZE, OP_SIZE,
};
pub use ops::{OpIter, OpIterator, OpStore, RevOpIter};
pub use reader::CowReader;
pub use stream::{ByteStream, CowDataStream, RawBytes};
