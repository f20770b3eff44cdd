mod common;

use std::io::Cursor;

use common::{block, init_logging, strip_footer, ContainerBuilder};
use cowreader::{CowReader, Error, Operation, FOOTER_SIZE, OP_SIZE};

fn parse(bytes: Vec<u8>) -> CowReader<Cursor<Vec<u8>>> {
    CowReader::parse(Cursor::new(bytes)).expect("parse")
}

fn ops_of(reader: &CowReader<Cursor<Vec<u8>>>) -> Vec<Operation> {
    reader.op_iter().collect()
}

#[test]
fn missing_trailer_recovers_all_written_ops() {
    init_logging();
    let mut builder = ContainerBuilder::new(4096);
    builder.zero(1);
    builder.copy(2, 9);
    builder.replace(3, &block(5, 4096));

    let reader = parse(strip_footer(builder.build()));
    assert_eq!(reader.footer(), None);
    assert_eq!(ops_of(&reader), builder.ops());
}

#[test]
fn op_with_truncated_payload_is_dropped() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.zero(2);
    builder.replace(3, &block(2, 4096));

    let mut bytes = builder.build_unfooted();
    bytes.truncate(bytes.len() - 100);
    let reader = parse(bytes);
    assert_eq!(reader.footer(), None);
    assert_eq!(ops_of(&reader), &builder.ops()[..2]);
}

#[test]
fn partial_trailing_record_is_dropped() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    let full = builder.build_unfooted();
    builder.zero(2);

    let mut bytes = builder.build_unfooted();
    bytes.truncate(full.len() + OP_SIZE / 2);
    let reader = parse(bytes);
    assert_eq!(ops_of(&reader), &builder.ops()[..1]);
}

#[test]
fn trailing_label_without_follower_is_not_trusted() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.label(5);
    let reader = parse(builder.build_unfooted());
    assert_eq!(reader.last_label(), None);
    assert_eq!(reader.ops().len(), 2);

    builder.zero(2);
    let reader = parse(builder.build_unfooted());
    assert_eq!(reader.last_label(), Some(5));
}

#[test]
fn only_confirmed_labels_are_reported() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.label(1);
    builder.zero(2);
    builder.label(2);
    let reader = parse(builder.build_unfooted());
    assert_eq!(reader.last_label(), Some(1));
}

#[test]
fn footer_vouches_for_final_label() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.label(5);
    let reader = parse(builder.build());
    assert!(reader.footer().is_some());
    assert_eq!(reader.last_label(), Some(5));
}

#[test]
fn no_labels_means_no_last_label() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.zero(2);
    assert_eq!(parse(builder.build()).last_label(), None);
}

#[test]
fn inline_footer_is_found_when_trailer_is_garbage() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.label(8);

    let mut bytes = builder.build();
    bytes.extend_from_slice(&[0u8; 16]);
    assert_ne!(bytes[bytes.len() - FOOTER_SIZE], 0xFF);

    let reader = parse(bytes);
    assert_eq!(reader.footer(), Some(builder.footer()));
    assert_eq!(reader.last_label(), Some(8));
    assert_eq!(ops_of(&reader), builder.ops());
}

#[test]
fn incomplete_inline_footer_is_ignored() {
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &block(1, 4096));
    builder.zero(2);

    let mut bytes = builder.build();
    bytes.truncate(bytes.len() - 10);
    let reader = parse(bytes);
    assert_eq!(reader.footer(), None);
    assert_eq!(ops_of(&reader), builder.ops());
}

#[test]
fn footer_tag_at_trailer_offset_of_unfooted_container_is_fatal() {
    // Without a footer the trailer window overlaps the last payload. A 0xFF
    // there reads as a footer tag and the scan limit moves inside the payload.
    let mut payload = block(1, 4096);
    payload[4096 - FOOTER_SIZE] = 0xFF;
    let mut builder = ContainerBuilder::new(4096);
    builder.replace(1, &payload);

    let bytes = builder.build_unfooted();
    assert_eq!(bytes[bytes.len() - FOOTER_SIZE], 0xFF);
    let err = CowReader::parse(Cursor::new(bytes)).err().expect("parse must fail");
    assert!(matches!(err, Error::Corrupt("operation payload overruns footer")), "{err}");

    // The same payload behind a real footer is fine.
    let reader = parse(builder.build());
    assert_eq!(ops_of(&reader), builder.ops());
}
