//! Payload decompression.
//!
//! A [`Decompressor`] pulls from a [`ByteStream`] and pushes into a
//! [`ByteSink`] one output window at a time, so memory use is bounded by the
//! chunk size regardless of payload length.

use std::io::{self, ErrorKind, Read, Write};

use log::error;

use crate::format::Compression;
use crate::stream::ByteStream;
use crate::{Error, Result};

/// Receives decompressed bytes.
///
/// The sink lends out its own buffers: `get_buffer` returns a writable window
/// of at most `requested` bytes, and `return_data` reports how many bytes of
/// that window were filled. Any previously lent window is invalid once
/// `get_buffer` is called again.
pub trait ByteSink {
    /// `None` means the sink cannot accept more data.
    fn get_buffer(&mut self, requested: usize) -> Option<&mut [u8]>;

    fn return_data(&mut self, len: usize) -> Result<()>;
}

/// Collects everything into memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    data: Vec<u8>,
    lent_at: Option<usize>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.lent_at {
            Some(start) => &self.data[..start],
            None => &self.data,
        }
    }

    pub fn into_inner(mut self) -> Vec<u8> {
        if let Some(start) = self.lent_at.take() {
            self.data.truncate(start);
        }
        self.data
    }
}

impl ByteSink for BufferSink {
    fn get_buffer(&mut self, requested: usize) -> Option<&mut [u8]> {
        if let Some(start) = self.lent_at.take() {
            self.data.truncate(start);
        }
        let start = self.data.len();
        self.data.resize(start + requested, 0);
        self.lent_at = Some(start);
        Some(&mut self.data[start..])
    }

    fn return_data(&mut self, len: usize) -> Result<()> {
        let start = self
            .lent_at
            .take()
            .ok_or(Error::Corrupt("data returned without a lent buffer"))?;
        if start + len > self.data.len() {
            return Err(Error::Corrupt("returned more data than was lent"));
        }
        self.data.truncate(start + len);
        Ok(())
    }
}

/// Adapts any [`Write`] into a [`ByteSink`] through a scratch buffer.
pub struct WriteSink<W: Write> {
    inner: W,
    scratch: Vec<u8>,
    written: u64,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn get_buffer(&mut self, requested: usize) -> Option<&mut [u8]> {
        if self.scratch.len() < requested {
            self.scratch.resize(requested, 0);
        }
        Some(&mut self.scratch[..requested])
    }

    fn return_data(&mut self, len: usize) -> Result<()> {
        let data = self
            .scratch
            .get(..len)
            .ok_or(Error::Corrupt("returned more data than was lent"))?;
        self.inner.write_all(data)?;
        self.written += len as u64;
        Ok(())
    }
}

/// Upper bound on any single sink window or input buffer. `block_size` comes
/// straight from the container header, so it is never trusted as an
/// allocation size.
pub const MAX_WINDOW: usize = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decompressor {
    Uncompressed,
    Gz,
    Brotli,
}

impl From<Compression> for Decompressor {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => Decompressor::Uncompressed,
            Compression::Gz => Decompressor::Gz,
            Compression::Brotli => Decompressor::Brotli,
        }
    }
}

impl Decompressor {
    /// Selects the variant for an operation's raw compression tag.
    pub fn for_tag(tag: u8) -> Result<Self> {
        match Compression::from_tag(tag) {
            Some(compression) => Ok(compression.into()),
            None => {
                error!("Unknown compression type: {tag}");
                Err(Error::UnknownCompression(tag))
            }
        }
    }

    /// Drains `stream` into `sink` in windows of `chunk_size` output bytes,
    /// clamped to [`MAX_WINDOW`]. Returns the number of bytes delivered to the
    /// sink.
    pub fn decompress<S, K>(&self, stream: &mut S, sink: &mut K, chunk_size: usize) -> Result<u64>
    where
        S: ByteStream + ?Sized,
        K: ByteSink + ?Sized,
    {
        if chunk_size == 0 {
            return Err(Error::Unsupported("zero decompression chunk size"));
        }
        let chunk_size = chunk_size.min(MAX_WINDOW);
        match self {
            Decompressor::Uncompressed => {
                let expected = stream.size();
                let total = pump(stream, sink, input_window(&*stream, chunk_size))?;
                if total != expected {
                    return Err(Error::PayloadLength {
                        expected,
                        found: total,
                    });
                }
                Ok(total)
            }
            Decompressor::Gz => decompress_gz(stream, sink, chunk_size),
            Decompressor::Brotli => decompress_brotli(stream, sink, chunk_size),
        }
    }
}

/// Zlib-framed deflate. Input is pulled in `chunk_size` windows and the
/// stream must reach its end marker.
#[cfg(feature = "gz")]
fn decompress_gz<S, K>(stream: &mut S, sink: &mut K, chunk_size: usize) -> Result<u64>
where
    S: ByteStream + ?Sized,
    K: ByteSink + ?Sized,
{
    use flate2::{Decompress, FlushDecompress, Status};

    let mut inflater = Decompress::new(true);
    let mut input = vec![0u8; input_window(&*stream, chunk_size)];
    let (mut start, mut end) = (0usize, 0usize);
    let mut input_done = false;
    let mut stalls = 0u32;
    let mut total = 0u64;
    loop {
        if start == end && !input_done {
            end = fill(stream, &mut input).map_err(Error::from_io)?;
            start = 0;
            input_done = end == 0;
        }
        let buf = sink.get_buffer(chunk_size).ok_or(Error::SinkRejected)?;
        if buf.is_empty() {
            return Err(Error::SinkRejected);
        }
        let flush = if input_done {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };
        let (in_before, out_before) = (inflater.total_in(), inflater.total_out());
        let status = inflater
            .decompress(&input[start..end], buf, flush)
            .map_err(|_| Error::Corrupt("corrupt deflate stream"))?;
        let consumed = (inflater.total_in() - in_before) as usize;
        let produced = (inflater.total_out() - out_before) as usize;
        start += consumed;
        sink.return_data(produced)?;
        total += produced as u64;

        if status == Status::StreamEnd {
            return Ok(total);
        }
        if consumed == 0 && produced == 0 {
            if input_done {
                return Err(Error::Corrupt("truncated deflate stream"));
            }
            stalls += 1;
            if stalls > 1 {
                return Err(Error::Corrupt("deflate stream made no progress"));
            }
        } else {
            stalls = 0;
        }
    }
}

#[cfg(not(feature = "gz"))]
fn decompress_gz<S, K>(_stream: &mut S, _sink: &mut K, _chunk_size: usize) -> Result<u64>
where
    S: ByteStream + ?Sized,
    K: ByteSink + ?Sized,
{
    Err(Error::Unsupported("gz support not compiled in"))
}

#[cfg(feature = "brotli")]
fn decompress_brotli<S, K>(stream: &mut S, sink: &mut K, chunk_size: usize) -> Result<u64>
where
    S: ByteStream + ?Sized,
    K: ByteSink + ?Sized,
{
    let input = input_window(&*stream, chunk_size);
    let mut decoder = brotli::Decompressor::new(stream, input);
    pump(&mut decoder, sink, chunk_size).map_err(|err| match err {
        Error::Io(io) if io.kind() == ErrorKind::InvalidData => {
            error!("brotli decode failed: {io}");
            Error::Corrupt("corrupt brotli stream")
        }
        other => other,
    })
}

#[cfg(not(feature = "brotli"))]
fn decompress_brotli<S, K>(_stream: &mut S, _sink: &mut K, _chunk_size: usize) -> Result<u64>
where
    S: ByteStream + ?Sized,
    K: ByteSink + ?Sized,
{
    Err(Error::Unsupported("brotli support not compiled in"))
}

/// Input never needs more room than the stream holds.
fn input_window<S: ByteStream + ?Sized>(stream: &S, chunk_size: usize) -> usize {
    let size = usize::try_from(stream.size()).unwrap_or(usize::MAX);
    chunk_size.min(size).max(1)
}

fn pump<R, K>(source: &mut R, sink: &mut K, chunk_size: usize) -> Result<u64>
where
    R: Read + ?Sized,
    K: ByteSink + ?Sized,
{
    let mut total = 0u64;
    loop {
        let buf = sink.get_buffer(chunk_size).ok_or(Error::SinkRejected)?;
        if buf.is_empty() {
            return Err(Error::SinkRejected);
        }
        let window = buf.len();
        let filled = fill(source, buf).map_err(Error::from_io)?;
        sink.return_data(filled)?;
        total += filled as u64;
        if filled < window {
            return Ok(total);
        }
    }
}

fn fill<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
