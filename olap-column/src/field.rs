//! Field descriptors and the values written into columns.

use std::fmt::{Debug, Display, Formatter};

use num_traits::AsPrimitive;
use olap_error::{OlapResult, olap_bail, olap_err};
use olap_hll::HLL_COLUMN_DEFAULT_LEN;
use serde::{Deserialize, Serialize};

use crate::stats::StatValue;
use crate::types::{Date24, DateTime64, Decimal12};

/// Bytes of the length prefix included in a VARCHAR's declared length.
pub const VARCHAR_LENGTH_PREFIX: u32 = 2;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Tinyint,
    Smallint,
    Int,
    Bigint,
    Largeint,
    UnsignedTinyint,
    UnsignedSmallint,
    UnsignedInt,
    UnsignedBigint,
    Float,
    Double,
    Date,
    Datetime,
    Decimal,
    Char,
    Varchar,
    Hll,
}

impl FieldType {
    /// Storage width of the fixed-width types.
    pub fn fixed_width(self) -> Option<usize> {
        Some(match self {
            FieldType::Tinyint | FieldType::UnsignedTinyint => 1,
            FieldType::Smallint | FieldType::UnsignedSmallint => 2,
            FieldType::Int | FieldType::UnsignedInt | FieldType::Float => 4,
            FieldType::Bigint | FieldType::UnsignedBigint | FieldType::Double => 8,
            FieldType::Largeint => 16,
            FieldType::Date => Date24::WIDTH,
            FieldType::Datetime => DateTime64::WIDTH,
            FieldType::Decimal => Decimal12::WIDTH,
            FieldType::Char | FieldType::Varchar | FieldType::Hll => return None,
        })
    }

    pub fn is_string(self) -> bool {
        matches!(self, FieldType::Char | FieldType::Varchar)
    }

    /// Whether min/max statistics are kept for columns of this type.
    pub fn is_ordered(self) -> bool {
        self.fixed_width().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Tinyint => "TINYINT",
            FieldType::Smallint => "SMALLINT",
            FieldType::Int => "INT",
            FieldType::Bigint => "BIGINT",
            FieldType::Largeint => "LARGEINT",
            FieldType::UnsignedTinyint => "UNSIGNED_TINYINT",
            FieldType::UnsignedSmallint => "UNSIGNED_SMALLINT",
            FieldType::UnsignedInt => "UNSIGNED_INT",
            FieldType::UnsignedBigint => "UNSIGNED_BIGINT",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Date => "DATE",
            FieldType::Datetime => "DATETIME",
            FieldType::Decimal => "DECIMAL",
            FieldType::Char => "CHAR",
            FieldType::Varchar => "VARCHAR",
            FieldType::Hll => "HLL",
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How rows with equal keys are combined by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    None,
    Sum,
    Min,
    Max,
    Replace,
    HllUnion,
}

/// Descriptor of one column of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: FieldType,
    /// Declared byte width. For VARCHAR this includes the two byte length prefix, for HLL it
    /// is the largest sketch a row may hold.
    pub length: u32,
    pub nullable: bool,
    pub is_key: bool,
    pub aggregation: AggregationMethod,
    /// Identifies the column's streams within the segment.
    pub unique_id: u32,
}

impl FieldInfo {
    /// A non-nullable value column with the type's default width.
    pub fn new(name: impl Into<String>, field_type: FieldType, unique_id: u32) -> Self {
        let length = match field_type.fixed_width() {
            Some(width) => width as u32,
            None if field_type == FieldType::Hll => HLL_COLUMN_DEFAULT_LEN as u32,
            None => 1,
        };
        let aggregation = if field_type == FieldType::Hll {
            AggregationMethod::HllUnion
        } else {
            AggregationMethod::None
        };
        Self {
            name: name.into(),
            field_type,
            length,
            nullable: false,
            is_key: false,
            aggregation,
            unique_id,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationMethod) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Longest value a string or HLL column accepts.
    pub fn max_value_len(&self) -> usize {
        match self.field_type {
            FieldType::Varchar => self.length.saturating_sub(VARCHAR_LENGTH_PREFIX) as usize,
            _ => self.length as usize,
        }
    }
}

/// One value, or null, handed to a column writer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Datum<'a> {
    Null,
    Tinyint(i8),
    Smallint(i16),
    Int(i32),
    Bigint(i64),
    Largeint(i128),
    UnsignedTinyint(u8),
    UnsignedSmallint(u16),
    UnsignedInt(u32),
    UnsignedBigint(u64),
    Float(f32),
    Double(f64),
    Date(Date24),
    Datetime(DateTime64),
    Decimal(Decimal12),
    /// Content of a CHAR or VARCHAR value, or a serialized HLL sketch.
    Bytes(&'a [u8]),
}

impl<'a> Datum<'a> {
    /// Parse the textual form of a value of `field_type`.
    ///
    /// Strings are taken verbatim. HLL sketches have no textual form.
    pub fn parse(field_type: FieldType, literal: &'a str) -> OlapResult<Datum<'a>> {
        fn number<T: std::str::FromStr>(field_type: FieldType, literal: &str) -> OlapResult<T> {
            literal
                .trim()
                .parse()
                .map_err(|_| olap_err!("invalid {} literal {:?}", field_type, literal))
        }

        Ok(match field_type {
            FieldType::Tinyint => Datum::Tinyint(number(field_type, literal)?),
            FieldType::Smallint => Datum::Smallint(number(field_type, literal)?),
            FieldType::Int => Datum::Int(number(field_type, literal)?),
            FieldType::Bigint => Datum::Bigint(number(field_type, literal)?),
            FieldType::Largeint => Datum::Largeint(number(field_type, literal)?),
            FieldType::UnsignedTinyint => Datum::UnsignedTinyint(number(field_type, literal)?),
            FieldType::UnsignedSmallint => Datum::UnsignedSmallint(number(field_type, literal)?),
            FieldType::UnsignedInt => Datum::UnsignedInt(number(field_type, literal)?),
            FieldType::UnsignedBigint => Datum::UnsignedBigint(number(field_type, literal)?),
            FieldType::Float => Datum::Float(number(field_type, literal)?),
            FieldType::Double => Datum::Double(number(field_type, literal)?),
            FieldType::Date => Datum::Date(literal.parse()?),
            FieldType::Datetime => Datum::Datetime(literal.parse()?),
            FieldType::Decimal => Datum::Decimal(literal.parse()?),
            FieldType::Char | FieldType::Varchar => Datum::Bytes(literal.as_bytes()),
            FieldType::Hll => olap_bail!("HLL values cannot be parsed from text"),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
}

macro_rules! datum_from {
    ($T:ty, $variant:ident) => {
        impl From<$T> for Datum<'static> {
            fn from(value: $T) -> Self {
                Datum::$variant(value)
            }
        }
    };
}

datum_from!(i8, Tinyint);
datum_from!(i16, Smallint);
datum_from!(i32, Int);
datum_from!(i64, Bigint);
datum_from!(i128, Largeint);
datum_from!(u8, UnsignedTinyint);
datum_from!(u16, UnsignedSmallint);
datum_from!(u32, UnsignedInt);
datum_from!(u64, UnsignedBigint);
datum_from!(f32, Float);
datum_from!(f64, Double);
datum_from!(Date24, Date);
datum_from!(DateTime64, Datetime);
datum_from!(Decimal12, Decimal);

impl<'a> From<&'a [u8]> for Datum<'a> {
    fn from(value: &'a [u8]) -> Self {
        Datum::Bytes(value)
    }
}

impl<'a, T: Into<Datum<'a>>> From<Option<T>> for Datum<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Datum::Null, Into::into)
    }
}

/// A value stored at a fixed width in a single stream.
pub trait NativeValue: Copy + Debug + PartialEq + Send + 'static {
    const WIDTH: usize;

    /// Append the little-endian storage bytes.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly [`Self::WIDTH`] bytes.
    fn read_le(bytes: &[u8]) -> OlapResult<Self>;

    fn from_datum(datum: &Datum<'_>) -> Option<Self>;

    fn stat_value(self) -> StatValue;
}

fn width_error(expected: usize, actual: usize) -> olap_error::OlapError {
    olap_err!(DecodeError: "expected a {} byte value, got {} bytes", expected, actual)
}

macro_rules! native_int {
    ($T:ty, $variant:ident) => {
        impl NativeValue for $T {
            const WIDTH: usize = size_of::<$T>();

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> OlapResult<Self> {
                <[u8; size_of::<$T>()]>::try_from(bytes)
                    .map(<$T>::from_le_bytes)
                    .map_err(|_| width_error(Self::WIDTH, bytes.len()))
            }

            fn from_datum(datum: &Datum<'_>) -> Option<Self> {
                match datum {
                    Datum::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            #[inline]
            fn stat_value(self) -> StatValue {
                StatValue::Int(i128::from(self))
            }
        }
    };
}

native_int!(i8, Tinyint);
native_int!(i16, Smallint);
native_int!(i32, Int);
native_int!(i64, Bigint);
native_int!(i128, Largeint);
native_int!(u8, UnsignedTinyint);
native_int!(u16, UnsignedSmallint);
native_int!(u32, UnsignedInt);
native_int!(u64, UnsignedBigint);

macro_rules! native_float {
    ($T:ty, $variant:ident) => {
        impl NativeValue for $T {
            const WIDTH: usize = size_of::<$T>();

            #[inline]
            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn read_le(bytes: &[u8]) -> OlapResult<Self> {
                <[u8; size_of::<$T>()]>::try_from(bytes)
                    .map(<$T>::from_le_bytes)
                    .map_err(|_| width_error(Self::WIDTH, bytes.len()))
            }

            fn from_datum(datum: &Datum<'_>) -> Option<Self> {
                match datum {
                    Datum::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            #[inline]
            fn stat_value(self) -> StatValue {
                StatValue::Float(self.as_())
            }
        }
    };
}

native_float!(f32, Float);
native_float!(f64, Double);

impl NativeValue for Date24 {
    const WIDTH: usize = Date24::WIDTH;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> OlapResult<Self> {
        <[u8; Date24::WIDTH]>::try_from(bytes)
            .map(Date24::from_le_bytes)
            .map_err(|_| width_error(Self::WIDTH, bytes.len()))
    }

    fn from_datum(datum: &Datum<'_>) -> Option<Self> {
        match datum {
            Datum::Date(v) => Some(*v),
            _ => None,
        }
    }

    fn stat_value(self) -> StatValue {
        StatValue::Int(i128::from(self.packed()))
    }
}

impl NativeValue for DateTime64 {
    const WIDTH: usize = DateTime64::WIDTH;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.raw().to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> OlapResult<Self> {
        u64::read_le(bytes).map(DateTime64::from_raw)
    }

    fn from_datum(datum: &Datum<'_>) -> Option<Self> {
        match datum {
            Datum::Datetime(v) => Some(*v),
            _ => None,
        }
    }

    fn stat_value(self) -> StatValue {
        StatValue::Int(i128::from(self.raw()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(FieldType::Tinyint, "-7", Datum::Tinyint(-7))]
    #[case(FieldType::UnsignedBigint, "18446744073709551615", Datum::UnsignedBigint(u64::MAX))]
    #[case(
        FieldType::Largeint,
        "-170141183460469231731687303715884105728",
        Datum::Largeint(i128::MIN)
    )]
    #[case(FieldType::Double, "2.5", Datum::Double(2.5))]
    #[case(FieldType::Decimal, "1234.5678", Datum::Decimal(Decimal12::new(1234, 567_800_000)))]
    #[case(FieldType::Varchar, "abc", Datum::Bytes(b"abc"))]
    fn parse_literals(#[case] field_type: FieldType, #[case] literal: &str, #[case] expected: Datum) {
        assert_eq!(Datum::parse(field_type, literal).unwrap(), expected);
    }

    #[test]
    fn parse_rejects_bad_literals() {
        assert!(Datum::parse(FieldType::Tinyint, "300").is_err());
        assert!(Datum::parse(FieldType::Date, "yesterday").is_err());
        assert!(Datum::parse(FieldType::Hll, "").is_err());
    }

    #[test]
    fn native_values_roundtrip_le() {
        let mut out = Vec::new();
        (-2i16).write_le(&mut out);
        assert_eq!(out, [0xfe, 0xff]);
        assert_eq!(i16::read_le(&out).unwrap(), -2);
        assert!(i32::read_le(&out).is_err());

        let date: Date24 = "2000-10-10".parse().unwrap();
        out.clear();
        date.write_le(&mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(Date24::read_le(&out).unwrap(), date);
    }

    #[test]
    fn from_datum_checks_variant() {
        assert_eq!(i32::from_datum(&Datum::Int(3)), Some(3));
        assert_eq!(i32::from_datum(&Datum::Bigint(3)), None);
        assert_eq!(f32::from_datum(&Datum::Float(1.5)).map(f32::stat_value), Some(StatValue::Float(1.5)));
    }

    #[test]
    fn field_defaults() {
        let field = FieldInfo::new("v", FieldType::Varchar, 3).with_length(65535);
        assert_eq!(field.max_value_len(), 65533);
        assert_eq!(FieldInfo::new("d", FieldType::Decimal, 0).length, 12);
        let hll = FieldInfo::new("h", FieldType::Hll, 1);
        assert_eq!(hll.aggregation, AggregationMethod::HllUnion);
        assert_eq!(hll.max_value_len(), HLL_COLUMN_DEFAULT_LEN);
        assert_eq!(Datum::from(None::<i32>), Datum::Null);
    }
}
