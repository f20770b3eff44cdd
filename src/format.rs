//! On-disk layout of a COW container.
//!
//! ```text
//! [0 .. HEADER_SIZE)                  CowHeader
//! [HEADER_SIZE .. footer_offset)      Operation records, each followed by its payload
//! [file_size - FOOTER_SIZE .. end)    CowFooter (footer op + two 32-byte digests)
//! ```
//!
//! All integers are little-endian and every record is packed; serialization
//! uses explicit offsets rather than struct layout.

use crate::digest::{Checksum, DIGEST_LEN};
use crate::{Error, Result};

pub const COW_MAGIC: u64 = 0x436f_7763_4f57_2121;
pub const COW_VERSION_MAJOR: u16 = 1;
pub const COW_VERSION_MINOR: u16 = 0;

pub const HEADER_SIZE: usize = 28;
pub const OP_SIZE: usize = 20;
pub const FOOTER_OP_SIZE: usize = OP_SIZE;
pub const FOOTER_DATA_SIZE: usize = 2 * DIGEST_LEN;
pub const FOOTER_SIZE: usize = FOOTER_OP_SIZE + FOOTER_DATA_SIZE;

const MAGIC_OFFSET: usize = 0;
const MAJOR_OFFSET: usize = 8;
const MINOR_OFFSET: usize = 10;
const HEADER_SIZE_OFFSET: usize = 12;
const FOOTER_SIZE_OFFSET: usize = 14;
const BLOCK_SIZE_OFFSET: usize = 16;
const MERGE_OPS_OFFSET: usize = 20;

const TYPE_OFFSET: usize = 0;
const COMPRESSION_OFFSET: usize = 1;
const DATA_LENGTH_OFFSET: usize = 2;
const NEW_BLOCK_OFFSET: usize = 4;
const SOURCE_OFFSET: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpType {
    Copy,
    Replace,
    Zero,
    /// Commit marker; the label value is carried in `source`.
    Label,
    /// Footer record read in place when the trailer is missing.
    Footer,
}

impl OpType {
    pub const COPY: u8 = 1;
    pub const REPLACE: u8 = 2;
    pub const ZERO: u8 = 3;
    pub const LABEL: u8 = 4;
    pub const FOOTER: u8 = 0xFF;

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            Self::COPY => Ok(OpType::Copy),
            Self::REPLACE => Ok(OpType::Replace),
            Self::ZERO => Ok(OpType::Zero),
            Self::LABEL => Ok(OpType::Label),
            Self::FOOTER => Ok(OpType::Footer),
            other => Err(Error::UnknownOpType(other)),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            OpType::Copy => Self::COPY,
            OpType::Replace => Self::REPLACE,
            OpType::Zero => Self::ZERO,
            OpType::Label => Self::LABEL,
            OpType::Footer => Self::FOOTER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gz,
    Brotli,
}

impl Compression {
    pub const NONE: u8 = 0;
    pub const GZ: u8 = 1;
    pub const BROTLI: u8 = 2;

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::NONE => Some(Compression::None),
            Self::GZ => Some(Compression::Gz),
            Self::BROTLI => Some(Compression::Brotli),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Compression::None => Self::NONE,
            Compression::Gz => Self::GZ,
            Compression::Brotli => Self::BROTLI,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CowHeader {
    pub magic: u64,
    pub major_version: u16,
    pub minor_version: u16,
    pub header_size: u16,
    pub footer_size: u16,
    /// Output chunk size used when decompressing payloads.
    pub block_size: u32,
    /// Leading non-metadata operations already merged into the base device.
    pub num_merge_ops: u64,
}

impl CowHeader {
    pub fn new(block_size: u32) -> Self {
        Self {
            magic: COW_MAGIC,
            major_version: COW_VERSION_MAJOR,
            minor_version: COW_VERSION_MINOR,
            header_size: HEADER_SIZE as u16,
            footer_size: FOOTER_SIZE as u16,
            block_size,
            num_merge_ops: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(&self.magic.to_le_bytes());
        buf[MAJOR_OFFSET..MAJOR_OFFSET + 2].copy_from_slice(&self.major_version.to_le_bytes());
        buf[MINOR_OFFSET..MINOR_OFFSET + 2].copy_from_slice(&self.minor_version.to_le_bytes());
        buf[HEADER_SIZE_OFFSET..HEADER_SIZE_OFFSET + 2]
            .copy_from_slice(&self.header_size.to_le_bytes());
        buf[FOOTER_SIZE_OFFSET..FOOTER_SIZE_OFFSET + 2]
            .copy_from_slice(&self.footer_size.to_le_bytes());
        buf[BLOCK_SIZE_OFFSET..BLOCK_SIZE_OFFSET + 4]
            .copy_from_slice(&self.block_size.to_le_bytes());
        buf[MERGE_OPS_OFFSET..MERGE_OPS_OFFSET + 8]
            .copy_from_slice(&self.num_merge_ops.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: read_u64(bytes, MAGIC_OFFSET),
            major_version: read_u16(bytes, MAJOR_OFFSET),
            minor_version: read_u16(bytes, MINOR_OFFSET),
            header_size: read_u16(bytes, HEADER_SIZE_OFFSET),
            footer_size: read_u16(bytes, FOOTER_SIZE_OFFSET),
            block_size: read_u32(bytes, BLOCK_SIZE_OFFSET),
            num_merge_ops: read_u64(bytes, MERGE_OPS_OFFSET),
        }
    }

    /// Exact-match checks only: there is no compatibility range.
    pub fn validate(&self) -> Result<()> {
        if self.magic != COW_MAGIC {
            return Err(Error::BadMagic {
                expected: COW_MAGIC,
                found: self.magic,
            });
        }
        if self.header_size as usize != HEADER_SIZE {
            return Err(Error::SizeMismatch {
                field: "header size",
                expected: HEADER_SIZE as u64,
                found: self.header_size as u64,
            });
        }
        if self.footer_size as usize != FOOTER_SIZE {
            return Err(Error::SizeMismatch {
                field: "footer size",
                expected: FOOTER_SIZE as u64,
                found: self.footer_size as u64,
            });
        }
        if self.major_version != COW_VERSION_MAJOR || self.minor_version != COW_VERSION_MINOR {
            return Err(Error::UnsupportedVersion {
                major: self.major_version,
                minor: self.minor_version,
                expected_major: COW_VERSION_MAJOR,
                expected_minor: COW_VERSION_MINOR,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operation {
    pub op_type: OpType,
    /// Raw compression tag; validated only when the payload is read.
    pub compression: u8,
    pub data_length: u16,
    pub new_block: u64,
    /// Payload offset in the container, source block, or label value.
    pub source: u64,
}

impl Operation {
    pub fn to_bytes(&self) -> [u8; OP_SIZE] {
        let mut buf = [0u8; OP_SIZE];
        buf[TYPE_OFFSET] = self.op_type.tag();
        buf[COMPRESSION_OFFSET] = self.compression;
        buf[DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 2]
            .copy_from_slice(&self.data_length.to_le_bytes());
        buf[NEW_BLOCK_OFFSET..NEW_BLOCK_OFFSET + 8].copy_from_slice(&self.new_block.to_le_bytes());
        buf[SOURCE_OFFSET..SOURCE_OFFSET + 8].copy_from_slice(&self.source.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; OP_SIZE]) -> Result<Self> {
        Ok(Self {
            op_type: OpType::from_tag(bytes[TYPE_OFFSET])?,
            compression: bytes[COMPRESSION_OFFSET],
            data_length: read_u16(bytes, DATA_LENGTH_OFFSET),
            new_block: read_u64(bytes, NEW_BLOCK_OFFSET),
            source: read_u64(bytes, SOURCE_OFFSET),
        })
    }

    /// Label and footer records carry no trailing payload.
    pub fn is_metadata(&self) -> bool {
        matches!(self.op_type, OpType::Label | OpType::Footer)
    }

    /// Bytes between the end of this record and the next one.
    pub fn payload_len(&self) -> u64 {
        if self.is_metadata() {
            0
        } else {
            self.data_length as u64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FooterOp {
    pub op_type: u8,
    pub compression: u8,
    pub data_length: u16,
    /// Stored operation records, labels included.
    pub num_ops: u64,
    pub ops_size: u64,
}

impl FooterOp {
    pub fn new(num_ops: u64, ops_size: u64) -> Self {
        Self {
            op_type: OpType::FOOTER,
            compression: Compression::NONE,
            data_length: FOOTER_DATA_SIZE as u16,
            num_ops,
            ops_size,
        }
    }

    pub fn to_bytes(&self) -> [u8; FOOTER_OP_SIZE] {
        let mut buf = [0u8; FOOTER_OP_SIZE];
        buf[TYPE_OFFSET] = self.op_type;
        buf[COMPRESSION_OFFSET] = self.compression;
        buf[DATA_LENGTH_OFFSET..DATA_LENGTH_OFFSET + 2]
            .copy_from_slice(&self.data_length.to_le_bytes());
        buf[NEW_BLOCK_OFFSET..NEW_BLOCK_OFFSET + 8].copy_from_slice(&self.num_ops.to_le_bytes());
        buf[SOURCE_OFFSET..SOURCE_OFFSET + 8].copy_from_slice(&self.ops_size.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; FOOTER_OP_SIZE]) -> Self {
        Self {
            op_type: bytes[TYPE_OFFSET],
            compression: bytes[COMPRESSION_OFFSET],
            data_length: read_u16(bytes, DATA_LENGTH_OFFSET),
            num_ops: read_u64(bytes, NEW_BLOCK_OFFSET),
            ops_size: read_u64(bytes, SOURCE_OFFSET),
        }
    }

    pub fn is_footer(&self) -> bool {
        self.op_type == OpType::FOOTER
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FooterData {
    pub footer_checksum: Checksum,
    pub ops_checksum: Checksum,
}

impl FooterData {
    pub fn to_bytes(&self) -> [u8; FOOTER_DATA_SIZE] {
        let mut buf = [0u8; FOOTER_DATA_SIZE];
        buf[..DIGEST_LEN].copy_from_slice(&self.footer_checksum);
        buf[DIGEST_LEN..].copy_from_slice(&self.ops_checksum);
        buf
    }

    pub fn from_bytes(bytes: &[u8; FOOTER_DATA_SIZE]) -> Self {
        let mut footer_checksum = [0u8; DIGEST_LEN];
        let mut ops_checksum = [0u8; DIGEST_LEN];
        footer_checksum.copy_from_slice(&bytes[..DIGEST_LEN]);
        ops_checksum.copy_from_slice(&bytes[DIGEST_LEN..]);
        Self {
            footer_checksum,
            ops_checksum,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CowFooter {
    pub op: FooterOp,
    pub data: FooterData,
}

impl CowFooter {
    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        buf[..FOOTER_OP_SIZE].copy_from_slice(&self.op.to_bytes());
        buf[FOOTER_OP_SIZE..].copy_from_slice(&self.data.to_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; FOOTER_SIZE]) -> Self {
        let op = FooterOp::from_bytes(bytes[..FOOTER_OP_SIZE].try_into().expect("slice length"));
        let data =
            FooterData::from_bytes(bytes[FOOTER_OP_SIZE..].try_into().expect("slice length"));
        Self { op, data }
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().expect("slice length"))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("slice length"))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("slice length"))
}
