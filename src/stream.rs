use std::io::{self, Read};

use crate::Result;

/// Sequential byte source of known total size, consumed by a decompressor.
pub trait ByteStream: Read {
    /// Total bytes the stream was created to deliver.
    fn size(&self) -> u64;
}

impl ByteStream for &[u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Validated random access into a container's data region.
pub trait RawBytes {
    fn read_raw_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;
}

/// Turns bounded random-access reads into a sequential stream over
/// `[offset, offset + len)`.
///
/// Reading past the end yields `Ok(0)`; the consumer tracks the expected size.
pub struct CowDataStream<'a, R: RawBytes + ?Sized> {
    reader: &'a mut R,
    offset: u64,
    size: u64,
    remaining: u64,
}

impl<'a, R: RawBytes + ?Sized> CowDataStream<'a, R> {
    pub fn new(reader: &'a mut R, offset: u64, size: u64) -> Self {
        Self {
            reader,
            offset,
            size,
            remaining: size,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: RawBytes + ?Sized> Read for CowDataStream<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let to_read = (buf.len() as u64).min(self.remaining) as usize;
        if to_read == 0 {
            return Ok(0);
        }
        let read = self.reader.read_raw_bytes(self.offset, &mut buf[..to_read])?;
        self.offset += read as u64;
        self.remaining -= read as u64;
        Ok(read)
    }
}

impl<R: RawBytes + ?Sized> ByteStream for CowDataStream<'_, R> {
    fn size(&self) -> u64 {
        self.size
    }
}
