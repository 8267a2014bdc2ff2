#![allow(dead_code)]

use bytes::Bytes;
use log::LevelFilter;
use olap_column::proto::{CompressionKind, SegmentHeaderMessage};
use olap_column::pool::BufferPool;
use olap_column::{
    ColumnBatch, ColumnReader, Datum, FieldInfo, OutStreamFactory, ReaderOptions, RowIndex,
    SegmentStreams, WriterOptions, create_column_reader, create_column_writer,
};
use olap_error::OlapResult;
use olap_metrics::OlapMetrics;
use simplelog::{Config, TestLogger};

/// A segment written to memory, with the row index each column writer returned.
pub struct Segment {
    pub bytes: Bytes,
    pub header: SegmentHeaderMessage,
    pub indexes: Vec<RowIndex>,
}

/// Route engine logs to the test output, at the level named by `OLAP_TEST_LOG`.
pub fn init_logging() {
    let filter = std::env::var("OLAP_TEST_LOG")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Off);
    TestLogger::init(filter, Config::default()).ok();
}

pub fn writer_options(stream_buffer_size: usize, compression: CompressionKind) -> WriterOptions {
    WriterOptions {
        stream_buffer_size,
        compression,
        ..Default::default()
    }
}

/// Write `columns` into one segment, closing a row index entry every `entry_rows` rows.
pub fn write_segment(
    columns: &[(FieldInfo, Vec<Datum<'_>>)],
    options: &WriterOptions,
    entry_rows: usize,
) -> OlapResult<Segment> {
    init_logging();
    let mut factory = OutStreamFactory::new(options)?;
    let mut writers = columns
        .iter()
        .map(|(field, _)| create_column_writer(field, &mut factory, options))
        .collect::<OlapResult<Vec<_>>>()?;
    for (writer, (_, values)) in writers.iter_mut().zip(columns) {
        for (row, value) in values.iter().enumerate() {
            if row > 0 && row % entry_rows == 0 {
                writer.create_row_index_entry()?;
            }
            writer.write(value)?;
        }
    }

    let mut header = SegmentHeaderMessage::default();
    let indexes = writers
        .into_iter()
        .map(|writer| writer.finalize(&mut factory, &mut header))
        .collect::<OlapResult<Vec<_>>>()?;
    let mut bytes = Vec::new();
    factory.write_to(&mut bytes, &mut header)?;
    Ok(Segment {
        bytes: Bytes::from(bytes),
        header,
        indexes,
    })
}

pub fn open_streams(segment: &Segment) -> OlapResult<SegmentStreams<Bytes>> {
    SegmentStreams::open(
        segment.bytes.clone(),
        &segment.header,
        BufferPool::new(segment.header.stream_buffer_size as usize),
        &OlapMetrics::default(),
    )
}

pub fn open_reader(
    segment: &Segment,
    field: &FieldInfo,
    options: &ReaderOptions,
) -> OlapResult<Box<dyn ColumnReader>> {
    let mut streams = open_streams(segment)?;
    let column = segment
        .header
        .column(field.unique_id)
        .unwrap_or_else(|| panic!("no header for column {}", field.name));
    create_column_reader(field, column, &mut streams, options)
}

/// Read `rows` rows in batches of `batch_rows`, each as its stored bytes or `None`.
pub fn read_rows(
    reader: &mut dyn ColumnReader,
    rows: usize,
    batch_rows: usize,
) -> Vec<Option<Vec<u8>>> {
    let mut batch = ColumnBatch::new(batch_rows);
    let mut out = Vec::with_capacity(rows);
    while out.len() < rows {
        let n = reader
            .next_vector(&mut batch, batch_rows.min(rows - out.len()))
            .unwrap();
        for idx in 0..n {
            if batch.is_null(idx).unwrap() {
                out.push(None);
            } else if batch.stride() > 0 {
                out.push(Some(batch.raw(idx).unwrap().to_vec()));
            } else {
                out.push(Some(batch.slice(idx).unwrap().to_vec()));
            }
        }
    }
    out
}

/// Read every remaining row.
pub fn read_to_end(reader: &mut dyn ColumnReader, batch_rows: usize) -> Vec<Option<Vec<u8>>> {
    let rows = (reader.row_count() - reader.current_row()) as usize;
    read_rows(reader, rows, batch_rows)
}
