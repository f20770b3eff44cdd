#![allow(dead_code)]

use std::io::Write;

use cowreader::{
    Compression, CowFooter, CowHeader, Digest, FooterData, FooterOp, OpType, Operation,
    Sha256Digest, FOOTER_SIZE, HEADER_SIZE, OP_SIZE,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic block contents. Never contains 0xFF, so a payload byte can
/// never be mistaken for a footer tag.
pub fn block(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 7 + seed as usize * 13) % 251) as u8)
        .collect()
}

pub fn gz_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("zlib encode");
    encoder.finish().expect("zlib finish")
}

pub fn brotli_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
        writer.write_all(data).expect("brotli encode");
    }
    out
}

/// Writes containers the way the snapshot writer lays them out.
pub struct ContainerBuilder {
    header: CowHeader,
    body: Vec<u8>,
    ops: Vec<Operation>,
}

impl ContainerBuilder {
    pub fn new(block_size: u32) -> Self {
        Self {
            header: CowHeader::new(block_size),
            body: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn merge_ops(mut self, merged: u64) -> Self {
        self.header.num_merge_ops = merged;
        self
    }

    pub fn header_mut(&mut self) -> &mut CowHeader {
        &mut self.header
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    fn push(&mut self, op: Operation, payload: &[u8]) -> Operation {
        self.body.extend_from_slice(&op.to_bytes());
        self.body.extend_from_slice(payload);
        self.ops.push(op);
        op
    }

    fn next_payload_offset(&self) -> u64 {
        (HEADER_SIZE + self.body.len() + OP_SIZE) as u64
    }

    pub fn replace(&mut self, new_block: u64, data: &[u8]) -> Operation {
        self.replace_encoded(new_block, data, Compression::NONE)
    }

    pub fn replace_compressed(
        &mut self,
        new_block: u64,
        data: &[u8],
        compression: Compression,
    ) -> Operation {
        let encoded = match compression {
            Compression::None => data.to_vec(),
            Compression::Gz => gz_encode(data),
            Compression::Brotli => brotli_encode(data),
        };
        self.replace_encoded(new_block, &encoded, compression.tag())
    }

    /// Payload bytes are written as given, under an arbitrary compression tag.
    pub fn replace_encoded(&mut self, new_block: u64, payload: &[u8], tag: u8) -> Operation {
        let op = Operation {
            op_type: OpType::Replace,
            compression: tag,
            data_length: u16::try_from(payload.len()).expect("payload fits u16"),
            new_block,
            source: self.next_payload_offset(),
        };
        self.push(op, payload)
    }

    pub fn copy(&mut self, new_block: u64, source_block: u64) -> Operation {
        let op = Operation {
            op_type: OpType::Copy,
            compression: 0,
            data_length: 0,
            new_block,
            source: source_block,
        };
        self.push(op, &[])
    }

    pub fn zero(&mut self, new_block: u64) -> Operation {
        let op = Operation {
            op_type: OpType::Zero,
            compression: 0,
            data_length: 0,
            new_block,
            source: 0,
        };
        self.push(op, &[])
    }

    pub fn label(&mut self, label: u64) -> Operation {
        let op = Operation {
            op_type: OpType::Label,
            compression: 0,
            data_length: 0,
            new_block: 0,
            source: label,
        };
        self.push(op, &[])
    }

    pub fn footer_with(&self, digest: &dyn Digest) -> CowFooter {
        let op = FooterOp::new(self.ops.len() as u64, (self.ops.len() * OP_SIZE) as u64);
        let mut ops_bytes = Vec::new();
        for op in &self.ops {
            ops_bytes.extend_from_slice(&op.to_bytes());
        }
        CowFooter {
            op,
            data: FooterData {
                footer_checksum: digest.digest(&op.to_bytes()),
                ops_checksum: digest.digest(&ops_bytes),
            },
        }
    }

    pub fn footer(&self) -> CowFooter {
        self.footer_with(&Sha256Digest)
    }

    /// Container without a trailer, as left by an interrupted writer.
    pub fn build_unfooted(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.body.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    pub fn build_with(&self, digest: &dyn Digest) -> Vec<u8> {
        let mut out = self.build_unfooted();
        out.extend_from_slice(&self.footer_with(digest).to_bytes());
        out
    }

    pub fn build(&self) -> Vec<u8> {
        self.build_with(&Sha256Digest)
    }
}

/// Offset of the `index`-th operation record in a built container.
pub fn op_offset(ops: &[Operation], index: usize) -> usize {
    HEADER_SIZE
        + ops[..index]
            .iter()
            .map(|op| OP_SIZE + op.payload_len() as usize)
            .sum::<usize>()
}

pub fn strip_footer(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.truncate(bytes.len() - FOOTER_SIZE);
    bytes
}
