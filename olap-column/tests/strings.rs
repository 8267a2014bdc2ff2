mod common;

use common::{open_reader, read_to_end, write_segment, writer_options};
use olap_column::proto::{ColumnEncodingKind, CompressionKind, StreamInfoMessage};
use olap_column::stream::StreamKind;
use olap_column::{
    Datum, DictionaryOptions, FieldInfo, FieldType, OutStreamFactory, ReaderOptions,
    WriterOptions, create_column_writer,
};
use olap_error::OlapError;
use rstest::rstest;

fn stream(streams: &[StreamInfoMessage], kind: StreamKind) -> Option<&StreamInfoMessage> {
    streams.iter().find(|s| s.kind == kind as i32)
}

#[rstest]
#[case::low_cardinality(4, ColumnEncodingKind::Dictionary)]
#[case::at_threshold(30, ColumnEncodingKind::Dictionary)]
#[case::above_threshold(31, ColumnEncodingKind::Direct)]
#[case::every_value_distinct(100, ColumnEncodingKind::Direct)]
fn dictionary_threshold(#[case] distinct: usize, #[case] encoding: ColumnEncodingKind) {
    let field = FieldInfo::new("s", FieldType::Varchar, 0).with_length(32);
    let values = (0..100)
        .map(|row| format!("value-{:03}", row % distinct))
        .collect::<Vec<_>>();
    let datums = values.iter().map(|v| Datum::Bytes(v.as_bytes())).collect();
    let segment = write_segment(
        &[(field.clone(), datums)],
        &writer_options(4096, CompressionKind::None),
        25,
    )
    .unwrap();

    let column = segment.header.column(0).unwrap();
    assert_eq!(column.encoding(), encoding);
    let data = stream(&segment.header.streams, StreamKind::Data).unwrap();
    let dictionary = stream(&segment.header.streams, StreamKind::DictionaryData);
    match encoding {
        ColumnEncodingKind::Dictionary => {
            assert_eq!(column.dictionary_size as usize, distinct);
            assert_eq!(data.uncompressed_length, 100 * 4);
            assert_eq!(dictionary.unwrap().uncompressed_length, distinct as u64 * 9);
        }
        ColumnEncodingKind::Direct => {
            assert_eq!(column.dictionary_size, 0);
            assert_eq!(data.uncompressed_length, 100 * 9);
            assert!(dictionary.is_none());
        }
    }

    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    let rows = read_to_end(reader.as_mut(), 64);
    let expected = values
        .iter()
        .map(|v| Some(v.clone().into_bytes()))
        .collect::<Vec<_>>();
    assert_eq!(rows, expected);
}

#[test]
fn dictionary_thresholds_are_configurable() {
    let field = FieldInfo::new("s", FieldType::Varchar, 0).with_length(32);
    let options = WriterOptions {
        dictionary: DictionaryOptions {
            key_ratio_threshold_percent: 100,
            key_size_threshold: 3,
        },
        ..Default::default()
    };
    let cases = [
        (3, ColumnEncodingKind::Dictionary),
        (4, ColumnEncodingKind::Direct),
    ];
    for (distinct, encoding) in cases {
        let datums = (0..10)
            .map(|row| Datum::Bytes([b"a", b"b", b"c", b"d"][row % distinct]))
            .collect();
        let segment = write_segment(&[(field.clone(), datums)], &options, 1024).unwrap();
        assert_eq!(segment.header.column(0).unwrap().encoding(), encoding);
    }
}

#[test]
fn dictionary_keys_are_sorted() {
    let field = FieldInfo::new("s", FieldType::Varchar, 0)
        .with_length(16)
        .with_nullable(true);
    let datums = ["pear", "fig", "apple", "fig", "pear", "apple"]
        .iter()
        .cycle()
        .take(60)
        .map(|v| Datum::Bytes(v.as_bytes()))
        .chain([Datum::Null])
        .collect();
    let segment = write_segment(
        &[(field.clone(), datums)],
        &writer_options(4096, CompressionKind::None),
        16,
    )
    .unwrap();
    let dictionary = stream(&segment.header.streams, StreamKind::DictionaryData).unwrap();
    let start = dictionary.offset as usize + 9;
    assert_eq!(&segment.bytes[start..start + 12], b"applefigpear");

    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    let rows = read_to_end(reader.as_mut(), 7);
    assert_eq!(rows[2].as_deref(), Some(b"apple".as_slice()));
    assert_eq!(rows[59].as_deref(), Some(b"apple".as_slice()));
    assert_eq!(rows[60], None);
}

#[test]
fn longest_varchar_round_trips() {
    let field = FieldInfo::new("v", FieldType::Varchar, 1).with_length(65535);
    let value = vec![b'a'; 65533];
    let segment = write_segment(
        &[(field.clone(), vec![Datum::Bytes(&value)])],
        &WriterOptions::default(),
        1024,
    )
    .unwrap();
    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    assert_eq!(read_to_end(reader.as_mut(), 1), vec![Some(value)]);

    let options = WriterOptions::default();
    let mut factory = OutStreamFactory::new(&options).unwrap();
    let mut writer = create_column_writer(&field, &mut factory, &options).unwrap();
    let err = writer.write(&Datum::Bytes(&[b'a'; 65534])).unwrap_err();
    assert!(matches!(err, OlapError::EncodeError(..)));
}

#[test]
fn char_values_read_back_padded() {
    let field = FieldInfo::new("c", FieldType::Char, 2)
        .with_length(20)
        .with_nullable(true);
    let values = [Some("a"), Some("bb"), None, Some("dddd"), Some("eeeeeeeeeeeeeeeeeeee")];
    let datums = values
        .iter()
        .map(|v| v.map_or(Datum::Null, |v| Datum::Bytes(v.as_bytes())))
        .collect();
    let segment = write_segment(&[(field.clone(), datums)], &WriterOptions::default(), 2)
        .unwrap();
    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    let rows = read_to_end(reader.as_mut(), 5);

    let padded = |v: &str| {
        let mut bytes = v.as_bytes().to_vec();
        bytes.resize(20, 0);
        bytes
    };
    assert_eq!(rows, values.map(|v| v.map(padded)));
}

#[test]
fn all_null_string_column() {
    let field = FieldInfo::new("s", FieldType::Varchar, 0)
        .with_length(8)
        .with_nullable(true);
    let segment = write_segment(
        &[(field.clone(), vec![Datum::Null; 10])],
        &WriterOptions::default(),
        4,
    )
    .unwrap();
    let column = segment.header.column(0).unwrap();
    assert_eq!(column.encoding(), ColumnEncodingKind::Direct);
    assert_eq!(column.statistics.as_ref().unwrap().null_count, 10);

    let mut reader = open_reader(&segment, &field, &ReaderOptions::default()).unwrap();
    reader.skip(3).unwrap();
    assert_eq!(read_to_end(reader.as_mut(), 4), vec![None; 7]);
}
