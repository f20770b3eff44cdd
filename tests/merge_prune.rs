mod common;

use std::io::Cursor;

use common::{block, init_logging, ContainerBuilder};
use cowreader::{BufferSink, CowReader, Error, Operation};

fn history(merged: u64) -> ContainerBuilder {
    let mut builder = ContainerBuilder::new(4096).merge_ops(merged);
    builder.replace(0, &block(0, 4096));
    builder.label(1);
    builder.replace(1, &block(1, 4096));
    builder.copy(2, 40);
    builder.label(2);
    builder.zero(3);
    builder.replace(4, &block(4, 4096));
    builder
}

#[test]
fn merged_prefix_and_interleaved_labels_are_dropped() {
    init_logging();
    let builder = history(3);
    let mut reader = CowReader::parse(Cursor::new(builder.build())).expect("parse");

    let ops: Vec<Operation> = reader.op_iter().collect();
    assert_eq!(ops, &builder.ops()[4..]);
    assert_eq!(reader.header().num_merge_ops, 3);
    assert_eq!(reader.footer().expect("footer").op.num_ops, 7);
    assert_eq!(reader.last_label(), Some(2));

    let last = *ops.last().expect("ops");
    let mut sink = BufferSink::new();
    reader.read_data(&last, &mut sink).expect("read data");
    assert_eq!(sink.into_inner(), block(4, 4096));
}

#[test]
fn reverse_iteration_ends_at_first_unmerged_op() {
    let builder = history(1);
    let reader = CowReader::parse(Cursor::new(builder.build())).expect("parse");
    let reversed: Vec<Operation> = reader.rev_op_iter().collect();
    let mut expected = builder.ops()[1..].to_vec();
    expected.reverse();
    assert_eq!(reversed, expected);
}

#[test]
fn fully_merged_container_leaves_nothing() {
    let builder = history(5);
    let reader = CowReader::parse(Cursor::new(builder.build())).expect("parse");
    assert!(reader.op_iter().next().is_none());
    assert!(reader.ops().is_empty());
}

#[test]
fn merge_count_beyond_history_is_fatal() {
    let builder = history(6);
    let err = CowReader::parse(Cursor::new(builder.build())).err().expect("parse must fail");
    assert!(matches!(err, Error::MergeOverrun { merge_ops: 6, available: 5 }), "{err}");
}

#[test]
fn merge_progress_updates_header_only() {
    let builder = history(0);
    let mut reader = CowReader::parse(Cursor::new(builder.build())).expect("parse");
    reader.update_merge_progress(2);
    reader.update_merge_progress(1);
    assert_eq!(reader.header().num_merge_ops, 3);
    assert_eq!(reader.ops().len(), 7);
}
