//! Single-pass container scan.
//!
//! Parsing runs in fixed order: header, tail footer, operation scan, integrity
//! check, merge pruning. Each step is a precondition for the next and the first
//! failure aborts the whole parse.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use log::{debug, info, warn};

use crate::config::FooterPolicy;
use crate::digest::Digest;
use crate::format::{
    CowFooter, CowHeader, FooterData, FooterOp, OpType, Operation, FOOTER_DATA_SIZE,
    FOOTER_OP_SIZE, FOOTER_SIZE, HEADER_SIZE, OP_SIZE,
};
use crate::{Error, Result};

/// Where the footer currently stands while the container is being scanned.
///
/// An inline footer record met during the scan always wins over the trailer
/// read from the end of the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FooterState {
    NoFooter,
    /// Trailer at `file_size - FOOTER_SIZE` carries the footer tag.
    Tentative(CowFooter),
    Confirmed(CowFooter),
}

impl FooterState {
    pub(crate) fn from_trailer(footer: CowFooter) -> Self {
        if footer.op.is_footer() {
            FooterState::Tentative(footer)
        } else {
            FooterState::NoFooter
        }
    }

    /// First offset the operation scan must not cross.
    pub(crate) fn scan_limit(&self, file_size: u64) -> u64 {
        match self {
            FooterState::NoFooter => file_size,
            FooterState::Tentative(_) | FooterState::Confirmed(_) => {
                file_size - FOOTER_SIZE as u64
            }
        }
    }

    /// Labels are trusted on sight only when a footer vouches for them.
    pub(crate) fn has_footer(&self) -> bool {
        !matches!(self, FooterState::NoFooter)
    }

    pub(crate) fn confirm_inline(&mut self, footer: CowFooter) {
        *self = FooterState::Confirmed(footer);
    }

    /// Called once the scan has reached its limit.
    pub(crate) fn finish(self) -> Option<CowFooter> {
        match self {
            FooterState::NoFooter => None,
            FooterState::Tentative(footer) | FooterState::Confirmed(footer) => Some(footer),
        }
    }
}

/// Lag-aware label bookkeeping.
///
/// Without a footer, a label only counts as committed once at least one more
/// record follows it; a label written right before a crash is not trusted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct LabelTracker {
    committed: Option<u64>,
    pending: Option<u64>,
}

impl LabelTracker {
    /// Any record observed after a pending label proves its flush finished.
    pub(crate) fn observe_record(&mut self) {
        if let Some(label) = self.pending {
            self.committed = Some(label);
        }
    }

    pub(crate) fn observe_label(&mut self, label: u64, trusted: bool) {
        if trusted {
            self.committed = Some(label);
        } else {
            self.pending = Some(label);
        }
    }

    pub(crate) fn last_label(&self) -> Option<u64> {
        self.committed
    }
}

#[derive(Debug)]
pub(crate) struct ParsedContainer {
    pub header: CowHeader,
    pub footer: Option<CowFooter>,
    pub last_label: Option<u64>,
    pub file_size: u64,
    pub ops: Vec<Operation>,
}

pub(crate) fn parse_container<F: Read + Seek>(
    file: &mut F,
    digest: &dyn Digest,
    policy: FooterPolicy,
) -> Result<ParsedContainer> {
    let file_size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;

    let header = read_header(file)?;
    let state = read_trailer(file, &header, file_size)?;
    let scan = scan_ops(file, file_size, state)?;

    match &scan.footer {
        Some(footer) => verify_integrity(&scan.ops, footer, digest)?,
        None if policy == FooterPolicy::Require => return Err(Error::FooterRequired),
        None => info!("No footer, recovered {} operations", scan.ops.len()),
    }

    let ops = prune_merged(scan.ops, header.num_merge_ops)?;
    debug!(
        "parsed cow container: {} bytes, {} ops retained, footer={}, last_label={:?}",
        file_size,
        ops.len(),
        scan.footer.is_some(),
        scan.labels.last_label()
    );

    Ok(ParsedContainer {
        header,
        footer: scan.footer,
        last_label: scan.labels.last_label(),
        file_size,
        ops,
    })
}

fn read_header<F: Read>(file: &mut F) -> Result<CowHeader> {
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf)?;
    let header = CowHeader::from_bytes(&buf);
    header.validate()?;
    Ok(header)
}

fn read_trailer<F: Read + Seek>(
    file: &mut F,
    header: &CowHeader,
    file_size: u64,
) -> Result<FooterState> {
    let footer_size = header.footer_size as u64;
    let expected = file_size
        .checked_sub(footer_size)
        .ok_or(Error::TruncatedFooter {
            file_size,
            footer_size,
        })?;
    let pos = file.seek(SeekFrom::End(-(footer_size as i64)))?;
    if pos != expected {
        return Err(Error::Corrupt("failed to seek to footer"));
    }
    let mut buf = [0u8; FOOTER_SIZE];
    file.read_exact(&mut buf)?;
    Ok(FooterState::from_trailer(CowFooter::from_bytes(&buf)))
}

struct ScanOutcome {
    ops: Vec<Operation>,
    footer: Option<CowFooter>,
    labels: LabelTracker,
}

fn scan_ops<F: Read + Seek>(
    file: &mut F,
    file_size: u64,
    mut state: FooterState,
) -> Result<ScanOutcome> {
    let limit = state.scan_limit(file_size);
    let mut ops = Vec::new();
    if let FooterState::Tentative(footer) = &state {
        ops.reserve(usize::try_from(footer.op.num_ops).unwrap_or(0).min(1 << 20));
    }
    let mut labels = LabelTracker::default();
    let mut pos = file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
    let mut record = [0u8; OP_SIZE];

    while pos < limit {
        if limit - pos < OP_SIZE as u64 {
            if state.has_footer() {
                return Err(Error::Corrupt("partial operation record before footer"));
            }
            warn!("dropping {} trailing bytes of a partial operation record", limit - pos);
            break;
        }
        file.read_exact(&mut record)?;
        let op = Operation::from_bytes(&record)?;
        let next = pos + OP_SIZE as u64 + op.payload_len();
        if next > limit {
            if state.has_footer() {
                return Err(Error::Corrupt("operation payload overruns footer"));
            }
            warn!("dropping operation at offset {pos}: payload truncated");
            break;
        }

        labels.observe_record();
        match op.op_type {
            OpType::Label => labels.observe_label(op.source, state.has_footer()),
            OpType::Footer => {
                // The footer record is not an operation and is not checksummed.
                match read_inline_footer(file, &record)? {
                    Some(footer) => state.confirm_inline(footer),
                    None => {
                        warn!("inline footer at offset {pos} is incomplete");
                        state = FooterState::NoFooter;
                    }
                }
                break;
            }
            _ => {}
        }
        ops.push(op);

        pos = if op.payload_len() > 0 {
            file.seek(SeekFrom::Start(next))?
        } else {
            next
        };
    }

    Ok(ScanOutcome {
        ops,
        footer: state.finish(),
        labels,
    })
}

fn read_inline_footer<F: Read>(
    file: &mut F,
    record: &[u8; OP_SIZE],
) -> Result<Option<CowFooter>> {
    let op_bytes: &[u8; FOOTER_OP_SIZE] = record;
    let mut data = [0u8; FOOTER_DATA_SIZE];
    match file.read_exact(&mut data) {
        Ok(()) => Ok(Some(CowFooter {
            op: FooterOp::from_bytes(op_bytes),
            data: FooterData::from_bytes(&data),
        })),
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn encode_ops(ops: &[Operation]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ops.len() * OP_SIZE);
    for op in ops {
        buf.extend_from_slice(&op.to_bytes());
    }
    buf
}

pub(crate) fn verify_integrity(
    ops: &[Operation],
    footer: &CowFooter,
    digest: &dyn Digest,
) -> Result<()> {
    let num_ops = ops.len() as u64;
    if num_ops != footer.op.num_ops {
        return Err(Error::OpCountMismatch {
            expected: footer.op.num_ops,
            found: num_ops,
        });
    }
    let ops_size = num_ops * OP_SIZE as u64;
    if ops_size != footer.op.ops_size {
        return Err(Error::OpsSizeMismatch {
            expected: footer.op.ops_size,
            found: ops_size,
        });
    }

    if !digest.is_verifying() {
        warn!(
            "checksum verification disabled (digest {}); footer accepted unverified",
            digest.name()
        );
        return Ok(());
    }
    if digest.digest(&footer.op.to_bytes()) != footer.data.footer_checksum {
        return Err(Error::ChecksumMismatch("footer"));
    }
    if digest.digest(&encode_ops(ops)) != footer.data.ops_checksum {
        return Err(Error::ChecksumMismatch("ops"));
    }
    Ok(())
}

/// Drops the prefix holding the first `merge_ops` non-metadata operations,
/// together with any label or footer records interleaved among them.
pub(crate) fn prune_merged(mut ops: Vec<Operation>, merge_ops: u64) -> Result<Vec<Operation>> {
    if merge_ops == 0 {
        return Ok(ops);
    }
    let mut merged = 0u64;
    let mut cut = None;
    for (idx, op) in ops.iter().enumerate() {
        if !op.is_metadata() {
            merged += 1;
            if merged == merge_ops {
                cut = Some(idx + 1);
                break;
            }
        }
    }
    let cut = cut.ok_or(Error::MergeOverrun {
        merge_ops,
        available: merged,
    })?;
    ops.drain(..cut);
    Ok(ops)
}
