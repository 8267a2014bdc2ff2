//! The sparse row index of a column.
//!
//! Each entry covers a run of consecutive rows and records, for every stream the column
//! reads positionally, where that run starts. Positions are stored flat in a fixed order:
//! `PRESENT` (three values) for nullable columns, then `DATA`, `SECONDARY` and `LENGTH`
//! (two values each) for the streams the column encoding uses.

use log::trace;
use olap_error::{OlapResult, olap_bail, olap_err};
use prost::Message;

use crate::proto::{RowIndexEntryMessage, RowIndexMessage};
use crate::stats::ColumnStatistics;

/// A sink for stream positions.
pub trait PositionRecorder {
    fn add_position(&mut self, position: u64);
}

impl PositionRecorder for Vec<u64> {
    fn add_position(&mut self, position: u64) {
        self.push(position);
    }
}

/// An index entry under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionEntryWriter {
    positions: Vec<u64>,
    statistics: ColumnStatistics,
    first_row: u64,
    row_count: u64,
}

impl PositionRecorder for PositionEntryWriter {
    fn add_position(&mut self, position: u64) {
        self.positions.push(position);
    }
}

impl PositionEntryWriter {
    pub fn new(first_row: u64) -> Self {
        Self {
            first_row,
            ..Default::default()
        }
    }

    pub fn positions(&self) -> &[u64] {
        &self.positions
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn to_message(&self) -> RowIndexEntryMessage {
        RowIndexEntryMessage {
            positions: self.positions.clone(),
            statistics: Some(self.statistics.to_message()),
            first_row: self.first_row,
            row_count: self.row_count,
        }
    }
}

/// Builds the entries of one column while it is being written.
///
/// An entry is always open. Closing it records its statistics and row count and opens the
/// next entry at the following row; the caller then records the current stream positions
/// into the new entry.
#[derive(Debug, Clone)]
pub struct RowIndexBuilder {
    entries: Vec<PositionEntryWriter>,
    current: PositionEntryWriter,
}

impl Default for RowIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RowIndexBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current: PositionEntryWriter::new(0),
        }
    }

    pub fn current_mut(&mut self) -> &mut PositionEntryWriter {
        &mut self.current
    }

    /// Close the open entry at `row_count` rows written and open the next one.
    pub fn close_entry(&mut self, row_count: u64, statistics: ColumnStatistics) {
        let next = PositionEntryWriter::new(row_count);
        let mut closed = std::mem::replace(&mut self.current, next);
        closed.row_count = row_count - closed.first_row;
        closed.statistics = statistics;
        trace!(
            "row index entry {} closed: rows {}..{}, {} positions",
            self.entries.len(),
            closed.first_row,
            row_count,
            closed.positions.len()
        );
        self.entries.push(closed);
    }

    /// Close the open entry if it covers any rows and return all entries.
    pub fn finish(
        mut self,
        row_count: u64,
        statistics: ColumnStatistics,
    ) -> Vec<PositionEntryWriter> {
        if row_count > self.current.first_row {
            self.close_entry(row_count, statistics);
        }
        self.entries
    }

    /// Closed entries, in row order.
    pub fn entries(&self) -> &[PositionEntryWriter] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [PositionEntryWriter] {
        &mut self.entries
    }
}

/// A persisted index entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionEntryReader {
    positions: Vec<u64>,
    statistics: ColumnStatistics,
    first_row: u64,
    row_count: u64,
}

impl PositionEntryReader {
    /// An entry with positions only, starting at row zero.
    pub fn from_positions(positions: Vec<u64>) -> Self {
        Self {
            positions,
            ..Default::default()
        }
    }

    pub fn from_message(message: &RowIndexEntryMessage) -> OlapResult<Self> {
        let statistics = message
            .statistics
            .as_ref()
            .map(ColumnStatistics::from_message)
            .transpose()?
            .unwrap_or_default();
        if message.first_row.checked_add(message.row_count).is_none() {
            olap_bail!(
                DecodeError: "row index entry at row {} claims {} rows",
                message.first_row,
                message.row_count
            );
        }
        Ok(Self {
            positions: message.positions.clone(),
            statistics,
            first_row: message.first_row,
            row_count: message.row_count,
        })
    }

    pub fn positions(&self) -> &[u64] {
        &self.positions
    }

    pub fn statistics(&self) -> &ColumnStatistics {
        &self.statistics
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// One past the last row of the entry.
    pub fn end_row(&self) -> u64 {
        self.first_row.saturating_add(self.row_count)
    }

    /// A cursor over this entry's positions, consumed by one `seek`.
    pub fn provider(&self) -> PositionProvider<'_> {
        PositionProvider {
            entry: self,
            next: 0,
        }
    }
}

/// Hands out the positions of one entry in the order they were recorded.
#[derive(Debug)]
pub struct PositionProvider<'a> {
    entry: &'a PositionEntryReader,
    next: usize,
}

impl PositionProvider<'_> {
    pub fn next_position(&mut self) -> OlapResult<u64> {
        let position = self.entry.positions.get(self.next).copied().ok_or_else(|| {
            olap_err!(
                DecodeError: "index entry has only {} positions",
                self.entry.positions.len()
            )
        })?;
        self.next += 1;
        Ok(position)
    }

    pub fn first_row(&self) -> u64 {
        self.entry.first_row
    }

    pub fn statistics(&self) -> &ColumnStatistics {
        &self.entry.statistics
    }

    /// Positions not consumed yet.
    pub fn remaining(&self) -> usize {
        self.entry.positions.len() - self.next
    }
}

/// The read side of a column's row index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowIndex {
    entries: Vec<PositionEntryReader>,
}

impl RowIndex {
    pub fn new(entries: Vec<PositionEntryReader>) -> Self {
        Self { entries }
    }

    /// Copy the entries of a writer.
    pub fn from_writer_entries(entries: &[PositionEntryWriter]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| PositionEntryReader {
                    positions: e.positions.clone(),
                    statistics: e.statistics.clone(),
                    first_row: e.first_row,
                    row_count: e.row_count,
                })
                .collect(),
        }
    }

    pub fn to_message(entries: &[PositionEntryWriter]) -> RowIndexMessage {
        RowIndexMessage {
            entries: entries.iter().map(PositionEntryWriter::to_message).collect(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> OlapResult<Self> {
        let message = RowIndexMessage::decode(bytes)?;
        let entries = message
            .entries
            .iter()
            .map(PositionEntryReader::from_message)
            .collect::<OlapResult<Vec<_>>>()?;
        for pair in entries.windows(2) {
            if pair[1].first_row != pair[0].end_row() {
                olap_bail!(
                    DecodeError: "row index entries are not contiguous at row {}",
                    pair[1].first_row
                );
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, idx: usize) -> OlapResult<&PositionEntryReader> {
        self.entries
            .get(idx)
            .ok_or_else(|| olap_err!(OutOfBounds: idx, 0, self.entries.len()))
    }

    pub fn entries(&self) -> &[PositionEntryReader] {
        &self.entries
    }

    /// Index of the entry covering `row`.
    pub fn entry_for_row(&self, row: u64) -> Option<usize> {
        let idx = self.entries.partition_point(|e| e.end_row() <= row);
        (idx < self.entries.len() && self.entries[idx].first_row <= row).then_some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olap_error::OlapError;

    use crate::stats::StatValue;

    fn sample_builder() -> RowIndexBuilder {
        let mut builder = RowIndexBuilder::new();
        builder.current_mut().add_position(0);
        builder.current_mut().add_position(0);

        let mut stats = ColumnStatistics::new(true);
        stats.add(StatValue::Int(4));
        builder.close_entry(10, stats);
        builder.current_mut().add_position(0);
        builder.current_mut().add_position(40);
        builder
    }

    #[test]
    fn entries_are_contiguous() {
        let entries = sample_builder().finish(15, ColumnStatistics::new(true));
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].first_row(), entries[0].row_count()), (0, 10));
        assert_eq!((entries[1].first_row(), entries[1].row_count()), (10, 5));
        assert_eq!(entries[1].positions(), &[0, 40]);
    }

    #[test]
    fn empty_trailing_entry_is_dropped() {
        let entries = sample_builder().finish(10, ColumnStatistics::new(true));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn persisted_index_matches_writer_copy() {
        let entries = sample_builder().finish(15, ColumnStatistics::new(true));
        let bytes = RowIndex::to_message(&entries).encode_to_vec();
        let index = RowIndex::from_bytes(&bytes).unwrap();
        assert_eq!(index, RowIndex::from_writer_entries(&entries));
        assert_eq!(
            index.entry(0).unwrap().statistics().min(),
            Some(StatValue::Int(4))
        );
        assert!(index.entry(2).is_err());
    }

    #[test]
    fn entry_for_row_finds_covering_entry() {
        let entries = sample_builder().finish(15, ColumnStatistics::new(true));
        let index = RowIndex::from_writer_entries(&entries);
        assert_eq!(index.entry_for_row(0), Some(0));
        assert_eq!(index.entry_for_row(9), Some(0));
        assert_eq!(index.entry_for_row(10), Some(1));
        assert_eq!(index.entry_for_row(14), Some(1));
        assert_eq!(index.entry_for_row(15), None);
    }

    #[test]
    fn provider_is_consumed_in_order() {
        let entry = PositionEntryReader::from_positions(vec![7, 8]);
        let mut provider = entry.provider();
        assert_eq!(provider.next_position().unwrap(), 7);
        assert_eq!(provider.remaining(), 1);
        assert_eq!(provider.next_position().unwrap(), 8);
        assert!(provider.next_position().is_err());
    }

    #[test]
    fn non_contiguous_index_is_rejected() {
        let message = RowIndexMessage {
            entries: vec![
                RowIndexEntryMessage {
                    first_row: 0,
                    row_count: 3,
                    ..Default::default()
                },
                RowIndexEntryMessage {
                    first_row: 4,
                    row_count: 1,
                    ..Default::default()
                },
            ],
        };
        assert!(RowIndex::from_bytes(&message.encode_to_vec()).is_err());
    }

    #[test]
    fn overflowing_entry_is_rejected() {
        let message = RowIndexMessage {
            entries: vec![RowIndexEntryMessage {
                first_row: u64::MAX - 1,
                row_count: 2,
                ..Default::default()
            }],
        };
        let err = RowIndex::from_bytes(&message.encode_to_vec()).unwrap_err();
        assert!(matches!(err, OlapError::DecodeError(..)));
    }
}
