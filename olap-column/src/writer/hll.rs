use log::debug;
use olap_error::{OlapResult, ResultExt, olap_bail, olap_err};
use olap_hll::{HllContext, HllSet};

use crate::factory::OutStreamFactory;
use crate::field::{Datum, FieldInfo, FieldType};
use crate::index::RowIndex;
use crate::proto::{ColumnEncodingKind, SegmentHeaderMessage};
use crate::stream::{OutStream, StreamKind};
use crate::writer::{ColumnWriter, WriterCore};

/// Writes HLL aggregate columns.
///
/// Each row's sketch is parsed, stored in canonical form in `DATA` with its length in
/// `LENGTH`, and merged into the column's working context. The union of all rows is written
/// once to `SECONDARY` at finalize.
///
/// Rows read back as their canonical serialization, not the bytes handed to `write`: explicit
/// hashes come back sorted and deduplicated, an explicit set of no hashes comes back empty,
/// and a sparse set too dense to stay sparse comes back full. The sketch itself is unchanged.
#[derive(Debug)]
pub struct HllColumnWriter {
    core: WriterCore,
    data: OutStream,
    length: OutStream,
    secondary: OutStream,
    context: HllContext,
    scratch: Vec<u8>,
}

impl HllColumnWriter {
    pub fn new(field: FieldInfo, factory: &mut OutStreamFactory) -> OlapResult<Self> {
        if field.field_type != FieldType::Hll {
            olap_bail!(
                InitError: "column {} of type {} is not an HLL column",
                field.name,
                field.field_type
            );
        }
        let core = WriterCore::new(field, factory)?;
        let unique_id = core.field().unique_id;
        let mut writer = Self {
            core,
            data: factory.create_stream(unique_id, StreamKind::Data)?,
            length: factory.create_stream(unique_id, StreamKind::Length)?,
            secondary: factory.create_stream(unique_id, StreamKind::Secondary)?,
            context: HllContext::new(),
            scratch: Vec::new(),
        };
        writer.record_positions();
        Ok(writer)
    }

    fn record_positions(&mut self) {
        self.data.record_position(self.core.current_entry());
        self.length.record_position(self.core.current_entry());
    }

    fn write_sketch(&mut self, bytes: &[u8]) -> OlapResult<()> {
        let field = self.core.field();
        if bytes.len() > field.max_value_len() {
            olap_bail!(
                EncodeError: "sketch of {} bytes exceeds HLL({}) column {}",
                bytes.len(),
                field.max_value_len(),
                field.name
            );
        }
        let set = HllSet::parse(bytes).context(|| format!("HLL column {}", field.name))?;
        self.core.write_presence(false)?;

        self.scratch.clear();
        set.serialize_into(&mut self.scratch);
        self.length.write(&(self.scratch.len() as u32).to_le_bytes())?;
        self.data.write(&self.scratch)?;
        self.context.merge(&set);
        Ok(())
    }
}

impl ColumnWriter for HllColumnWriter {
    fn field(&self) -> &FieldInfo {
        self.core.field()
    }

    fn row_count(&self) -> u64 {
        self.core.row_count()
    }

    fn write(&mut self, datum: &Datum<'_>) -> OlapResult<()> {
        match datum {
            Datum::Null => self.core.write_presence(true),
            Datum::Bytes(bytes) => self.write_sketch(bytes),
            other => Err(olap_err!(
                EncodeError: "HLL column {} cannot store {:?}",
                self.core.field().name,
                other
            )),
        }
    }

    fn create_row_index_entry(&mut self) -> OlapResult<()> {
        self.core.create_row_index_entry();
        self.record_positions();
        Ok(())
    }

    fn finalize(
        self: Box<Self>,
        factory: &mut OutStreamFactory,
        header: &mut SegmentHeaderMessage,
    ) -> OlapResult<RowIndex> {
        let Self {
            mut core,
            data,
            length,
            mut secondary,
            context,
            ..
        } = *self;
        let entries = core.finish_entries()?;

        let union = context.to_set();
        debug!(
            "HLL column {}: union is {:?} with about {} distinct values",
            core.field().name,
            union.data_type(),
            union.estimate_cardinality()
        );
        secondary.write(&union.to_bytes())?;

        for mut stream in [data, length, secondary] {
            stream.flush()?;
            factory.adopt(stream)?;
        }
        core.finalize(entries, ColumnEncodingKind::Direct, 0, factory, header)
    }
}

#[cfg(test)]
mod tests {
    use olap_error::OlapError;

    use super::*;
    use crate::options::WriterOptions;
    use crate::writer::create_column_writer;

    #[test]
    fn rows_are_canonicalised_and_unioned() {
        let options = WriterOptions::default();
        let mut factory = OutStreamFactory::new(&options).unwrap();
        let field = FieldInfo::new("h", FieldType::Hll, 2).with_nullable(true);
        let mut writer = create_column_writer(&field, &mut factory, &options).unwrap();

        let mut sketch = HllSet::default();
        sketch.insert_hash(7);
        writer.write(&Datum::Bytes(&sketch.to_bytes())).unwrap();
        writer.write(&Datum::Null).unwrap();
        // an explicit sketch of zero hashes is stored as empty
        writer.write(&Datum::Bytes(&[1, 0])).unwrap();

        let mut header = SegmentHeaderMessage::default();
        let index = writer.finalize(&mut factory, &mut header).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(
            factory.stream(2, StreamKind::Data).unwrap().uncompressed_length(),
            10 + 1
        );
        assert_eq!(
            factory.stream(2, StreamKind::Secondary).unwrap().uncompressed_length(),
            10
        );
        assert_eq!(header.columns[0].statistics.as_ref().unwrap().null_count, 1);
    }

    #[test]
    fn malformed_sketch_is_rejected() {
        let options = WriterOptions::default();
        let mut factory = OutStreamFactory::new(&options).unwrap();
        let field = FieldInfo::new("h", FieldType::Hll, 0);
        let mut writer = create_column_writer(&field, &mut factory, &options).unwrap();
        let err = writer.write(&Datum::Bytes(&[9])).unwrap_err();
        assert!(matches!(err.root(), OlapError::InvalidEncoding(..)));
        assert_eq!(writer.row_count(), 0);
    }
}
