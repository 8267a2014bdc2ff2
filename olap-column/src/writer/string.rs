use itertools::Itertools;
use log::debug;
use olap_error::{OlapResult, olap_bail, olap_err};
use rustc_hash::FxHashMap;

use crate::factory::OutStreamFactory;
use crate::field::{Datum, FieldInfo, FieldType};
use crate::index::{PositionEntryWriter, RowIndex};
use crate::options::DictionaryOptions;
use crate::proto::{ColumnEncodingKind, SegmentHeaderMessage};
use crate::stream::{OutStream, StreamKind};
use crate::writer::{ColumnWriter, WriterCore};

/// Writes CHAR and VARCHAR columns.
///
/// Values are buffered as codes into a first-seen dictionary. At finalize the column is
/// either dictionary encoded (codes in `DATA`, sorted keys in `DICTIONARY_DATA`, key lengths
/// in `LENGTH`) or stored directly (bytes in `DATA`, one length per row in `LENGTH`), and
/// the `DATA`/`LENGTH` positions of every index entry are filled in then.
#[derive(Debug)]
pub struct StringColumnWriter {
    core: WriterCore,
    options: DictionaryOptions,
    data: OutStream,
    length: OutStream,
    dictionary_data: OutStream,
    lookup: FxHashMap<Vec<u8>, u32>,
    /// One code per non-null row.
    codes: Vec<u32>,
    /// Number of non-null rows before each index entry.
    entry_starts: Vec<usize>,
    padded: Vec<u8>,
}

impl StringColumnWriter {
    pub fn new(
        field: FieldInfo,
        factory: &mut OutStreamFactory,
        options: DictionaryOptions,
    ) -> OlapResult<Self> {
        if !field.field_type.is_string() {
            olap_bail!(
                InitError: "column {} of type {} is not a string column",
                field.name,
                field.field_type
            );
        }
        let core = WriterCore::new(field, factory)?;
        let unique_id = core.field().unique_id;
        Ok(Self {
            core,
            options,
            data: factory.create_stream(unique_id, StreamKind::Data)?,
            length: factory.create_stream(unique_id, StreamKind::Length)?,
            dictionary_data: factory.create_stream(unique_id, StreamKind::DictionaryData)?,
            lookup: FxHashMap::default(),
            codes: Vec::new(),
            entry_starts: vec![0],
            padded: Vec::new(),
        })
    }

    fn encode(&mut self, value: &[u8]) -> OlapResult<u32> {
        let field = self.core.field();
        let max_len = field.max_value_len();
        if value.len() > max_len {
            olap_bail!(
                EncodeError: "value of {} bytes exceeds {}({}) column {}",
                value.len(),
                field.field_type,
                max_len,
                field.name
            );
        }
        let key = if field.field_type == FieldType::Char {
            self.padded.clear();
            self.padded.extend_from_slice(value);
            self.padded.resize(max_len, 0);
            self.padded.as_slice()
        } else {
            value
        };

        if let Some(&code) = self.lookup.get(key) {
            return Ok(code);
        }
        let Ok(code) = u32::try_from(self.lookup.len()) else {
            olap_bail!(EncodeError: "dictionary of column {} overflows", field.name);
        };
        self.lookup.insert(key.to_vec(), code);
        Ok(code)
    }

    /// Write the buffered rows through `layout`, recording the position of every entry
    /// before its first non-null row.
    fn lay_out_rows(
        codes: &[u32],
        entry_starts: &[usize],
        entries: &mut [PositionEntryWriter],
        layout: &mut RowLayout<'_>,
        mut encode: impl FnMut(u32, &mut Vec<u8>),
    ) -> OlapResult<()> {
        let mut next_entry = 0;
        let mut value = Vec::new();
        for (row, &code) in codes.iter().enumerate() {
            while next_entry < entries.len() && entry_starts[next_entry] == row {
                layout.record(&mut entries[next_entry]);
                next_entry += 1;
            }
            value.clear();
            encode(code, &mut value);
            layout.write(&value)?;
        }
        for entry in &mut entries[next_entry..] {
            layout.record(entry);
        }
        Ok(())
    }
}

struct RowLayout<'a> {
    data: &'a mut OutStream,
    /// Per-row lengths, only written by direct encoding.
    lengths: Option<&'a mut OutStream>,
}

impl RowLayout<'_> {
    fn record(&self, entry: &mut PositionEntryWriter) {
        self.data.record_position(entry);
        if let Some(lengths) = &self.lengths {
            lengths.record_position(entry);
        }
    }

    fn write(&mut self, value: &[u8]) -> OlapResult<()> {
        if let Some(lengths) = &mut self.lengths {
            lengths.write(&(value.len() as u32).to_le_bytes())?;
        }
        self.data.write(value)
    }
}

impl ColumnWriter for StringColumnWriter {
    fn field(&self) -> &FieldInfo {
        self.core.field()
    }

    fn row_count(&self) -> u64 {
        self.core.row_count()
    }

    fn write(&mut self, datum: &Datum<'_>) -> OlapResult<()> {
        match datum {
            Datum::Null => self.core.write_presence(true),
            Datum::Bytes(value) => {
                let code = self.encode(value)?;
                self.core.write_presence(false)?;
                self.codes.push(code);
                Ok(())
            }
            other => Err(olap_err!(
                EncodeError: "string column {} cannot store {:?}",
                self.core.field().name,
                other
            )),
        }
    }

    fn create_row_index_entry(&mut self) -> OlapResult<()> {
        self.core.create_row_index_entry();
        self.entry_starts.push(self.codes.len());
        Ok(())
    }

    fn finalize(
        self: Box<Self>,
        factory: &mut OutStreamFactory,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<RowIndex> {
        let Self {
            mut core,
            options,
            mut data,
            mut length,
            mut dictionary_data,
            lookup,
            codes,
            mut entry_starts,
            ..
        } = *self;
        let mut entries = core.finish_entries()?;
        entry_starts.truncate(entries.len());

        let distinct = lookup.len();
        let use_dictionary = options.use_dictionary(distinct, codes.len() as u64);
        debug!(
            "column {}: {} distinct values over {} non-null rows, {} encoding",
            core.field().name,
            distinct,
            codes.len(),
            if use_dictionary { "dictionary" } else { "direct" }
        );

        let mut keys: Vec<&[u8]> = vec![b"".as_slice(); distinct];
        for (key, &code) in &lookup {
            keys[code as usize] = key.as_slice();
        }

        let encoding = if use_dictionary {
            let order = (0..distinct).sorted_unstable_by_key(|&code| keys[code]).collect_vec();
            let mut remap = vec![0u32; distinct];
            for (sorted, &code) in order.iter().enumerate() {
                remap[code] = sorted as u32;
                dictionary_data.write(keys[code])?;
                length.write(&(keys[code].len() as u32).to_le_bytes())?;
            }
            let mut layout = RowLayout {
                data: &mut data,
                lengths: None,
            };
            Self::lay_out_rows(&codes, &entry_starts, &mut entries, &mut layout, |code, out| {
                out.extend_from_slice(&remap[code as usize].to_le_bytes())
            })?;
            ColumnEncodingKind::Dictionary
        } else {
            let mut layout = RowLayout {
                data: &mut data,
                lengths: Some(&mut length),
            };
            Self::lay_out_rows(&codes, &entry_starts, &mut entries, &mut layout, |code, out| {
                out.extend_from_slice(keys[code as usize])
            })?;
            dictionary_data.suppress();
            ColumnEncodingKind::Direct
        };

        for mut stream in [data, length, dictionary_data] {
            stream.flush()?;
            factory.adopt(stream)?;
        }
        let dictionary_size = if use_dictionary { distinct as u32 } else { 0 };
        core.finalize(entries, encoding, dictionary_size, factory, header)
    }
}

#[cfg(test)]
mod tests {
    use olap_error::OlapError;

    use super::*;
    use crate::options::WriterOptions;
    use crate::proto::CompressionKind;
    use crate::writer::create_column_writer;

    fn write_column(
        field: &FieldInfo,
        values: &[Option<&str>],
    ) -> (OutStreamFactory, SegmentHeaderMessage, RowIndex) {
        let options = WriterOptions {
            stream_buffer_size: 64,
            compression: CompressionKind::None,
            ..Default::default()
        };
        let mut factory = OutStreamFactory::new(&options).unwrap();
        let mut writer = create_column_writer(field, &mut factory, &options).unwrap();
        for (row, value) in values.iter().enumerate() {
            if row > 0 && row % 4 == 0 {
                writer.create_row_index_entry().unwrap();
            }
            let datum = value.map_or(Datum::Null, |v| Datum::Bytes(v.as_bytes()));
            writer.write(&datum).unwrap();
        }
        let mut header = SegmentHeaderMessage::default();
        let index = writer.finalize(&mut factory, &mut header).unwrap();
        (factory, header, index)
    }

    fn uncompressed(factory: &OutStreamFactory, kind: StreamKind) -> u64 {
        factory.stream(0, kind).unwrap().uncompressed_length()
    }

    #[test]
    fn low_cardinality_uses_sorted_dictionary() {
        let field = FieldInfo::new("s", FieldType::Varchar, 0).with_length(20);
        let values = ["pear", "apple", "pear", "apple", "pear", "pear", "apple", "pear"]
            .map(Some);
        let (factory, header, index) = write_column(&field, &values);

        assert_eq!(header.columns[0].encoding(), ColumnEncodingKind::Dictionary);
        assert_eq!(header.columns[0].dictionary_size, 2);
        let dictionary = factory.stream(0, StreamKind::DictionaryData).unwrap();
        assert!(!dictionary.is_suppressed());
        assert_eq!(dictionary.uncompressed_length(), 9);
        // codes only
        assert_eq!(uncompressed(&factory, StreamKind::Data), 8 * 4);
        assert_eq!(uncompressed(&factory, StreamKind::Length), 2 * 4);
        // second entry starts after four codes
        assert_eq!(index.entry(1).unwrap().positions(), &[0, 16]);
    }

    #[test]
    fn high_cardinality_is_direct() {
        let field = FieldInfo::new("s", FieldType::Varchar, 0).with_length(20);
        let values = ["a", "bb", "ccc", "dddd", "eeeee"].map(Some);
        let (factory, header, index) = write_column(&field, &values);

        assert_eq!(header.columns[0].encoding(), ColumnEncodingKind::Direct);
        assert!(factory.stream(0, StreamKind::DictionaryData).unwrap().is_suppressed());
        assert_eq!(uncompressed(&factory, StreamKind::Data), 15);
        assert_eq!(uncompressed(&factory, StreamKind::Length), 5 * 4);
        // DATA at 10 bytes, LENGTH at 16 bytes
        assert_eq!(index.entry(1).unwrap().positions(), &[0, 10, 0, 16]);
    }

    #[test]
    fn trailing_null_entries_get_end_positions() {
        let field = FieldInfo::new("s", FieldType::Varchar, 0)
            .with_length(20)
            .with_nullable(true);
        let values = [Some("x"), Some("yy"), None, None, None, None, None, None];
        let (_, _, index) = write_column(&field, &values);
        let second = index.entry(1).unwrap();
        assert_eq!(second.statistics().null_count(), 4);
        // PRESENT, then DATA and LENGTH after both values
        assert_eq!(&second.positions()[3..], &[0, 3, 0, 8]);
    }

    #[test]
    fn char_values_are_padded() {
        let field = FieldInfo::new("c", FieldType::Char, 0).with_length(6);
        let values = ["ab", "cd", "ef"].map(Some);
        let (factory, header, _) = write_column(&field, &values);
        assert_eq!(header.columns[0].encoding(), ColumnEncodingKind::Direct);
        assert_eq!(uncompressed(&factory, StreamKind::Data), 18);
    }

    #[test]
    fn oversized_values_are_rejected() {
        let options = WriterOptions::default();
        let mut factory = OutStreamFactory::new(&options).unwrap();
        let field = FieldInfo::new("v", FieldType::Varchar, 0).with_length(5);
        let mut writer = create_column_writer(&field, &mut factory, &options).unwrap();
        writer.write(&Datum::Bytes(b"abc")).unwrap();
        let err = writer.write(&Datum::Bytes(b"abcd")).unwrap_err();
        assert!(matches!(err, OlapError::EncodeError(..)));
        assert!(writer.write(&Datum::Int(1)).is_err());
        assert_eq!(writer.row_count(), 1);
    }
}
