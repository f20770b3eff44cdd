use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use log::error;

use crate::config::ReaderConfig;
use crate::decompress::{ByteSink, Decompressor};
use crate::digest::Digest;
use crate::format::{CowFooter, CowHeader, Operation};
use crate::ops::{OpIter, OpStore, RevOpIter};
use crate::parser::parse_container;
use crate::stream::{CowDataStream, RawBytes};
use crate::{Error, Result};

/// Read side of a COW container.
///
/// Header, footer and operations are decoded once by [`CowReader::parse`] and
/// never change afterwards. The handle is used for positioned reads only, so
/// concurrent payload reads need one reader per thread or external locking;
/// the operation iterators themselves are independent and `Send`.
pub struct CowReader<F> {
    file: F,
    header: CowHeader,
    footer: Option<CowFooter>,
    last_label: Option<u64>,
    file_size: u64,
    ops: OpStore,
}

impl CowReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::parse_with_config(file, config)
    }
}

impl<F: Read + Seek> CowReader<F> {
    /// Parses a container from any seekable handle. Pass `&mut file` to keep
    /// ownership of the handle with the caller.
    pub fn parse(file: F) -> Result<Self> {
        Self::parse_with_config(file, ReaderConfig::default())
    }

    pub fn parse_with_config(file: F, config: ReaderConfig) -> Result<Self> {
        let digest = config.digest.build();
        Self::parse_with_digest(file, digest.as_ref(), config)
    }

    /// Parses with a caller-supplied digest primitive; `config.digest` is ignored.
    pub fn parse_with_digest(mut file: F, digest: &dyn Digest, config: ReaderConfig) -> Result<Self> {
        let parsed = parse_container(&mut file, digest, config.footer_policy)?;
        Ok(Self {
            file,
            header: parsed.header,
            footer: parsed.footer,
            last_label: parsed.last_label,
            file_size: parsed.file_size,
            ops: OpStore::freeze(parsed.ops),
        })
    }

    pub fn header(&self) -> CowHeader {
        self.header
    }

    /// `None` when the container was not cleanly finalized.
    pub fn footer(&self) -> Option<CowFooter> {
        self.footer
    }

    /// Most recent label known to be fully flushed.
    pub fn last_label(&self) -> Option<u64> {
        self.last_label
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn ops(&self) -> &[Operation] {
        self.ops.as_slice()
    }

    pub fn op_store(&self) -> OpStore {
        self.ops.clone()
    }

    pub fn op_iter(&self) -> OpIter {
        self.ops.iter()
    }

    pub fn rev_op_iter(&self) -> RevOpIter {
        self.ops.rev_iter()
    }

    /// Records `merge_ops` more operations as merged. The in-memory operation
    /// list is not re-pruned; the count takes effect on the next parse.
    pub fn update_merge_progress(&mut self, merge_ops: u64) {
        self.header.num_merge_ops = self.header.num_merge_ops.saturating_add(merge_ops);
    }

    /// Checks that `[offset, offset + len)` lies in the data region, between
    /// the header and the footer.
    pub fn validate_data_range(&self, offset: u64, len: u64) -> Result<()> {
        let data_end = self.file_size - self.header.footer_size as u64;
        let in_bounds = offset >= self.header.header_size as u64
            && offset < data_end
            && len < self.file_size
            && offset.checked_add(len).map_or(false, |end| end <= data_end);
        if !in_bounds {
            error!("invalid data offset: {offset}, {len} bytes");
            return Err(Error::OutOfBounds { offset, len });
        }
        Ok(())
    }

    /// Positioned read inside the data region. Returns the bytes actually
    /// transferred, which may be fewer than requested at end of file.
    pub fn read_raw_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.validate_data_range(offset, buf.len() as u64)?;
        self.file.seek(SeekFrom::Start(offset))?;
        loop {
            match self.file.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Decodes the payload of `op` into `sink`, in windows of the header's
    /// block size.
    pub fn read_data<K: ByteSink + ?Sized>(&mut self, op: &Operation, sink: &mut K) -> Result<u64> {
        let decompressor = Decompressor::for_tag(op.compression)?;
        let chunk_size = self.header.block_size as usize;
        let mut stream = CowDataStream::new(self, op.source, op.data_length as u64);
        decompressor.decompress(&mut stream, sink, chunk_size)
    }

    pub fn into_inner(self) -> F {
        self.file
    }
}

impl<F: Read + Seek> RawBytes for CowReader<F> {
    fn read_raw_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        CowReader::read_raw_bytes(self, offset, buf)
    }
}
