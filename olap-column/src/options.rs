use serde::{Deserialize, Serialize};

use crate::proto::CompressionKind;

/// Default size of an uncompressed stream chunk.
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 256 * 1024;
/// Default number of rows between two row index entries.
pub const DEFAULT_INDEX_INTERVAL_ROWS: usize = 1024;
/// Default capacity of a column batch.
pub const DEFAULT_BATCH_CAPACITY: usize = 1024;

/// Construction-time configuration of a segment's column writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Uncompressed size of each stream chunk.
    pub stream_buffer_size: usize,
    pub compression: CompressionKind,
    pub dictionary: DictionaryOptions,
    /// How often a segment writer is expected to call `create_row_index_entry`.
    pub index_interval_rows: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            compression: CompressionKind::Lz4,
            dictionary: DictionaryOptions::default(),
            index_interval_rows: DEFAULT_INDEX_INTERVAL_ROWS,
        }
    }
}

/// Thresholds deciding whether a string column is dictionary encoded.
///
/// A column is dictionary encoded when its distinct values are at most
/// `key_ratio_threshold_percent` percent of its non-null rows and there are at most
/// `key_size_threshold` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryOptions {
    pub key_ratio_threshold_percent: u32,
    pub key_size_threshold: usize,
}

impl Default for DictionaryOptions {
    fn default() -> Self {
        Self {
            key_ratio_threshold_percent: 30,
            key_size_threshold: 1000,
        }
    }
}

impl DictionaryOptions {
    /// Whether `distinct` keys over `non_null_rows` values qualify for dictionary encoding.
    pub fn use_dictionary(&self, distinct: usize, non_null_rows: u64) -> bool {
        non_null_rows > 0
            && (distinct as u64) * 100
                <= u64::from(self.key_ratio_threshold_percent) * non_null_rows
            && distinct <= self.key_size_threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Maximum number of rows a single `next_vector` call may produce.
    pub batch_capacity: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let options: WriterOptions =
            serde_json::from_str(r#"{"compression": "none", "dictionary": {"key_size_threshold": 8}}"#)
                .unwrap();
        assert_eq!(options.compression, CompressionKind::None);
        assert_eq!(options.stream_buffer_size, DEFAULT_STREAM_BUFFER_SIZE);
        assert_eq!(options.dictionary.key_size_threshold, 8);
        assert_eq!(options.dictionary.key_ratio_threshold_percent, 30);
    }

    #[test]
    fn reader_options_roundtrip_json() {
        let options = ReaderOptions { batch_capacity: 7 };
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(serde_json::from_str::<ReaderOptions>(&json).unwrap(), options);
    }

    #[rstest]
    #[case::low_cardinality(2, 10, true)]
    #[case::exactly_at_ratio(3, 10, true)]
    #[case::above_ratio(4, 10, false)]
    #[case::no_values(0, 0, false)]
    #[case::too_many_keys(1001, 100_000, false)]
    fn dictionary_decision(#[case] distinct: usize, #[case] rows: u64, #[case] expected: bool) {
        assert_eq!(
            DictionaryOptions::default().use_dictionary(distinct, rows),
            expected
        );
    }
}
