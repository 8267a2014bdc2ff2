mod common;

use bytes::Bytes;
use common::{Segment, open_reader, write_segment, writer_options};
use olap_column::proto::{ColumnEncodingKind, CompressionKind};
use olap_column::stream::{CHUNK_HEAD_LEN, ChunkHead, ChunkKind, StreamKind};
use olap_column::{ColumnBatch, Datum, FieldInfo, FieldType, ReaderOptions};
use olap_error::OlapError;
use olap_hll::{HLL_COLUMN_DEFAULT_LEN, HllSet};
use rstest::rstest;

const ROWS: usize = 10;

/// Ten distinct VARCHAR(12) values, written directly.
fn direct_strings() -> (FieldInfo, Vec<Vec<u8>>) {
    let values = (0..ROWS).map(|row| format!("value-{row:02}").into_bytes()).collect();
    (FieldInfo::new("direct", FieldType::Varchar, 0).with_length(12), values)
}

/// Two distinct values, dictionary encoded.
fn dictionary_strings() -> (FieldInfo, Vec<Vec<u8>>) {
    let values = (0..ROWS).map(|row| [b"aa", b"bb"][row % 2].to_vec()).collect();
    (FieldInfo::new("dictionary", FieldType::Varchar, 0).with_length(12), values)
}

fn sketches() -> (FieldInfo, Vec<Vec<u8>>) {
    let values = (0..ROWS as u64)
        .map(|row| {
            let mut set = HllSet::default();
            set.insert_hash(row * 31 + 1);
            set.to_bytes()
        })
        .collect();
    (FieldInfo::new("sketches", FieldType::Hll, 0), values)
}

fn write(field: &FieldInfo, values: &[Vec<u8>]) -> Segment {
    let datums = values.iter().map(|v| Datum::Bytes(v.as_slice())).collect();
    write_segment(
        &[(field.clone(), datums)],
        &writer_options(4096, CompressionKind::None),
        4,
    )
    .unwrap()
}

/// Overwrite the start of a stream's first chunk with `patch` and recompute its checksum.
fn patch_first_chunk(segment: &mut Segment, unique_id: u32, kind: StreamKind, patch: &[u8]) {
    let info = segment
        .header
        .streams
        .iter()
        .find(|s| s.column_unique_id == unique_id && s.kind == kind as i32)
        .unwrap_or_else(|| panic!("column {unique_id} has no {kind} stream"));
    let start = info.offset as usize;
    let mut bytes = segment.bytes.to_vec();

    let head = ChunkHead::parse(&bytes[start..start + CHUNK_HEAD_LEN]).unwrap();
    assert_eq!(head.kind, ChunkKind::Raw);
    let payload = start + CHUNK_HEAD_LEN..start + CHUNK_HEAD_LEN + head.length as usize;
    bytes[payload.start..payload.start + patch.len()].copy_from_slice(patch);
    let head = ChunkHead::for_payload(ChunkKind::Raw, &bytes[payload]).unwrap();
    bytes[start..start + CHUNK_HEAD_LEN].copy_from_slice(&head.to_bytes());
    segment.bytes = Bytes::from(bytes);
}

#[rstest]
#[case::huge_string_length(direct_strings(), StreamKind::Length, 0xFFFF_FFF0)]
#[case::string_longer_than_column(direct_strings(), StreamKind::Length, 11)]
#[case::huge_sketch_length(sketches(), StreamKind::Length, 0xFFFF_FFF0)]
#[case::sketch_longer_than_full_set(sketches(), StreamKind::Length, HLL_COLUMN_DEFAULT_LEN as u32 + 1)]
#[case::dictionary_code_out_of_range(dictionary_strings(), StreamKind::Data, 2)]
fn corrupt_row_metadata_is_decode_error(
    #[case] column: (FieldInfo, Vec<Vec<u8>>),
    #[case] kind: StreamKind,
    #[case] value: u32,
) {
    let (field, values) = column;
    let mut segment = write(&field, &values);
    patch_first_chunk(&mut segment, field.unique_id, kind, &value.to_le_bytes());

    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    let mut batch = ColumnBatch::new(ROWS);
    let err = reader.next_vector(&mut batch, ROWS).unwrap_err();
    assert!(matches!(err.root(), OlapError::DecodeError(..)), "{err}");
}

#[rstest]
#[case::huge_string_length(direct_strings())]
#[case::huge_sketch_length(sketches())]
fn corrupt_length_fails_skip(#[case] column: (FieldInfo, Vec<Vec<u8>>)) {
    let (field, values) = column;
    let mut segment = write(&field, &values);
    patch_first_chunk(
        &mut segment,
        field.unique_id,
        StreamKind::Length,
        &u32::MAX.to_le_bytes(),
    );

    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    let err = reader.skip(3).unwrap_err();
    assert!(matches!(err.root(), OlapError::DecodeError(..)), "{err}");
}

#[rstest]
#[case::more_keys_than_lengths(3)]
#[case::fewer_keys_than_bytes(1)]
#[case::absurd_key_count(u32::MAX)]
fn dictionary_size_must_match_streams(#[case] dictionary_size: u32) {
    let (field, values) = dictionary_strings();
    let mut segment = write(&field, &values);
    let column = &mut segment.header.columns[0];
    assert_eq!(column.encoding(), ColumnEncodingKind::Dictionary);
    assert_eq!(column.dictionary_size, 2);
    column.dictionary_size = dictionary_size;

    let Err(err) = open_reader(&segment, &field, &ReaderOptions::default()) else {
        panic!("dictionary of {dictionary_size} keys was accepted");
    };
    assert!(matches!(err.root(), OlapError::DecodeError(..)), "{err}");
}

#[test]
fn oversized_key_length_is_rejected() {
    let (field, values) = dictionary_strings();
    let mut segment = write(&field, &values);
    patch_first_chunk(&mut segment, 0, StreamKind::Length, &0xFFFF_FFF0u32.to_le_bytes());

    let Err(err) = open_reader(&segment, &field, &ReaderOptions::default()) else {
        panic!("oversized dictionary key was accepted");
    };
    assert!(matches!(err.root(), OlapError::DecodeError(..)), "{err}");
}
