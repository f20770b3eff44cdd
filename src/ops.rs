//! Frozen operation store and the cursors that walk it.
//!
//! The store is built once by the parser and never mutated afterwards, so any
//! number of iterators may share it, across threads if needed. Each iterator
//! owns only its own position.

use std::sync::Arc;

use crate::format::Operation;

#[derive(Clone, Debug)]
pub struct OpStore {
    ops: Arc<[Operation]>,
}

impl OpStore {
    pub(crate) fn freeze(ops: Vec<Operation>) -> Self {
        Self { ops: ops.into() }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn as_slice(&self) -> &[Operation] {
        &self.ops
    }

    pub fn iter(&self) -> OpIter {
        OpIter {
            ops: Arc::clone(&self.ops),
            pos: 0,
        }
    }

    pub fn rev_iter(&self) -> RevOpIter {
        RevOpIter {
            remaining: self.ops.len(),
            ops: Arc::clone(&self.ops),
        }
    }
}

/// Cursor over stored operations.
///
/// `current` and `advance` panic once the cursor is done; calling them there
/// is a caller bug.
pub trait OpIterator {
    fn is_done(&self) -> bool;
    fn current(&self) -> &Operation;
    fn advance(&mut self);
}

pub struct OpIter {
    ops: Arc<[Operation]>,
    pos: usize,
}

impl OpIterator for OpIter {
    fn is_done(&self) -> bool {
        self.pos >= self.ops.len()
    }

    fn current(&self) -> &Operation {
        assert!(!self.is_done(), "current() on exhausted op iterator");
        &self.ops[self.pos]
    }

    fn advance(&mut self) {
        assert!(!self.is_done(), "advance() on exhausted op iterator");
        self.pos += 1;
    }
}

impl Iterator for OpIter {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        let op = self.ops.get(self.pos).copied()?;
        self.pos += 1;
        Some(op)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.ops.len().saturating_sub(self.pos);
        (left, Some(left))
    }
}

impl ExactSizeIterator for OpIter {}

pub struct RevOpIter {
    ops: Arc<[Operation]>,
    // Index one past the current element.
    remaining: usize,
}

impl OpIterator for RevOpIter {
    fn is_done(&self) -> bool {
        self.remaining == 0
    }

    fn current(&self) -> &Operation {
        assert!(!self.is_done(), "current() on exhausted reverse op iterator");
        &self.ops[self.remaining - 1]
    }

    fn advance(&mut self) {
        assert!(!self.is_done(), "advance() on exhausted reverse op iterator");
        self.remaining -= 1;
    }
}

impl Iterator for RevOpIter {
    type Item = Operation;

    fn next(&mut self) -> Option<Operation> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.ops[self.remaining])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for RevOpIter {}
