use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use olap_error::{OlapResult, olap_bail};

use crate::{
    HLL_COLUMN_DEFAULT_LEN, HLL_EXPLICIT_INT64_NUM, HLL_REGISTERS_COUNT, HLL_SPARSE_THRESHOLD,
    HllContext, HllDataType, Registers, register_for_hash,
};

const EXPLICIT_HEADER_LEN: usize = 2;
const SPARSE_HEADER_LEN: usize = 5;
const SPARSE_ENTRY_LEN: usize = 3;

/// An approximate distinct-count sketch in one of its four representations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HllSet {
    /// No element has been observed.
    #[default]
    Empty,
    /// Up to [`HLL_EXPLICIT_INT64_NUM`] distinct 64-bit hashes.
    Explicit(BTreeSet<u64>),
    /// Non-zero registers keyed by register index, at most [`HLL_SPARSE_THRESHOLD`] of them.
    Sparse(BTreeMap<u16, u8>),
    /// All [`HLL_REGISTERS_COUNT`] registers.
    Full(Registers),
}

impl HllSet {
    pub fn data_type(&self) -> HllDataType {
        match self {
            HllSet::Empty => HllDataType::Empty,
            HllSet::Explicit(_) => HllDataType::Explicit,
            HllSet::Sparse(_) => HllDataType::Sparse,
            HllSet::Full(_) => HllDataType::Full,
        }
    }

    /// Parse a serialized sketch.
    ///
    /// The buffer must hold exactly the payload its type byte announces; anything else,
    /// including trailing bytes, is rejected with `InvalidEncoding`. Non-canonical inputs are
    /// normalised: an explicit set without hashes parses as [`HllSet::Empty`], a sparse set
    /// above the density threshold parses as [`HllSet::Full`].
    pub fn parse(buf: &[u8]) -> OlapResult<HllSet> {
        let Some((&type_byte, payload)) = buf.split_first() else {
            olap_bail!(InvalidEncoding: "hll set is empty, expected at least a type byte");
        };
        match HllDataType::try_from(type_byte)? {
            HllDataType::Empty => {
                if !payload.is_empty() {
                    olap_bail!(
                        InvalidEncoding: "empty hll set carries {} trailing bytes",
                        payload.len()
                    );
                }
                Ok(HllSet::Empty)
            }
            HllDataType::Explicit => Self::parse_explicit(buf),
            HllDataType::Sparse => Self::parse_sparse(buf),
            HllDataType::Full => {
                if buf.len() != HLL_COLUMN_DEFAULT_LEN {
                    olap_bail!(
                        InvalidEncoding: "full hll set has {} bytes, expected {}",
                        buf.len(),
                        HLL_COLUMN_DEFAULT_LEN
                    );
                }
                Ok(HllSet::Full(Registers::try_from_slice(payload)?))
            }
        }
    }

    fn parse_explicit(buf: &[u8]) -> OlapResult<HllSet> {
        if buf.len() < EXPLICIT_HEADER_LEN {
            olap_bail!(InvalidEncoding: "explicit hll set is missing its count byte");
        }
        let count = buf[1] as usize;
        if count > HLL_EXPLICIT_INT64_NUM {
            olap_bail!(
                InvalidEncoding: "explicit hll set holds {} hashes, at most {} allowed",
                count,
                HLL_EXPLICIT_INT64_NUM
            );
        }
        let expected = EXPLICIT_HEADER_LEN + count * size_of::<u64>();
        if buf.len() != expected {
            olap_bail!(
                InvalidEncoding: "explicit hll set of {} hashes has {} bytes, expected {}",
                count,
                buf.len(),
                expected
            );
        }
        if count == 0 {
            return Ok(HllSet::Empty);
        }
        let hashes = buf[EXPLICIT_HEADER_LEN..]
            .chunks_exact(size_of::<u64>())
            .map(|chunk| {
                let mut le = [0u8; 8];
                le.copy_from_slice(chunk);
                u64::from_le_bytes(le)
            })
            .collect();
        Ok(HllSet::Explicit(hashes))
    }

    fn parse_sparse(buf: &[u8]) -> OlapResult<HllSet> {
        if buf.len() < SPARSE_HEADER_LEN {
            olap_bail!(InvalidEncoding: "sparse hll set is missing its entry count");
        }
        let count = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        let expected = count
            .checked_mul(SPARSE_ENTRY_LEN)
            .and_then(|n| n.checked_add(SPARSE_HEADER_LEN));
        if expected != Some(buf.len()) {
            olap_bail!(
                InvalidEncoding: "sparse hll set of {} entries has {} bytes",
                count,
                buf.len()
            );
        }

        let mut entries = BTreeMap::new();
        for entry in buf[SPARSE_HEADER_LEN..].chunks_exact(SPARSE_ENTRY_LEN) {
            let index = u16::from_le_bytes([entry[0], entry[1]]);
            if index as usize >= HLL_REGISTERS_COUNT {
                olap_bail!(
                    InvalidEncoding: "sparse hll register index {} out of range",
                    index
                );
            }
            let value = entry[2];
            if value == 0 {
                continue;
            }
            let slot = entries.entry(index).or_insert(0u8);
            *slot = (*slot).max(value);
        }

        if entries.len() > HLL_SPARSE_THRESHOLD {
            return Ok(HllSet::Full(sparse_to_registers(&entries)));
        }
        Ok(HllSet::Sparse(entries))
    }

    /// Number of bytes [`HllSet::serialize_into`] appends.
    pub fn serialized_len(&self) -> usize {
        match self {
            HllSet::Empty => 1,
            HllSet::Explicit(hashes) => EXPLICIT_HEADER_LEN + hashes.len() * size_of::<u64>(),
            HllSet::Sparse(entries) => SPARSE_HEADER_LEN + entries.len() * SPARSE_ENTRY_LEN,
            HllSet::Full(_) => HLL_COLUMN_DEFAULT_LEN,
        }
    }

    /// Append the wire encoding of this sketch to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.serialized_len());
        out.push(self.data_type() as u8);
        match self {
            HllSet::Empty => {}
            HllSet::Explicit(hashes) => {
                // construction keeps explicit sets at or below 160 hashes
                out.push(hashes.len() as u8);
                for hash in hashes {
                    out.extend_from_slice(&hash.to_le_bytes());
                }
            }
            HllSet::Sparse(entries) => {
                out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
                for (index, value) in entries {
                    out.extend_from_slice(&index.to_le_bytes());
                    out.push(*value);
                }
            }
            HllSet::Full(registers) => out.extend_from_slice(registers.as_slice()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_len());
        self.serialize_into(&mut out);
        out
    }

    /// Add one hashed element, upgrading the representation when it outgrows its limit.
    pub fn insert_hash(&mut self, hash: u64) {
        match self {
            HllSet::Empty => *self = HllSet::Explicit(BTreeSet::from([hash])),
            HllSet::Explicit(hashes) => {
                hashes.insert(hash);
                if hashes.len() > HLL_EXPLICIT_INT64_NUM {
                    trace!("hll explicit set exceeded {} hashes", HLL_EXPLICIT_INT64_NUM);
                    let mut registers = Registers::zeroed();
                    hashes.iter().for_each(|h| registers.update(*h));
                    *self = HllSet::from_registers(registers, HllDataType::Sparse);
                }
            }
            HllSet::Sparse(entries) => {
                let (index, value) = register_for_hash(hash);
                let slot = entries.entry(index as u16).or_insert(0);
                *slot = (*slot).max(value);
                if entries.len() > HLL_SPARSE_THRESHOLD {
                    trace!("hll sparse set exceeded {} registers", HLL_SPARSE_THRESHOLD);
                    *self = HllSet::Full(sparse_to_registers(entries));
                }
            }
            HllSet::Full(registers) => registers.update(hash),
        }
    }

    /// Union another sketch into this one. The result is never in an earlier
    /// representation than either input.
    pub fn merge(&mut self, other: &HllSet) {
        if matches!(other, HllSet::Empty) {
            return;
        }
        if let HllSet::Full(registers) = self {
            registers.merge_set(other);
            return;
        }
        if matches!(self, HllSet::Empty) {
            *self = other.clone();
            return;
        }

        let mut context = HllContext::new();
        context.merge(self);
        context.merge(other);
        *self = context.to_set();
    }

    /// The dense registers equivalent to this sketch.
    pub fn to_registers(&self) -> Registers {
        let mut registers = Registers::zeroed();
        registers.merge_set(self);
        registers
    }

    /// Build the sparse or full representation of `registers`, never earlier than `floor`.
    pub fn from_registers(registers: Registers, floor: HllDataType) -> HllSet {
        if floor < HllDataType::Full && registers.non_zero_count() <= HLL_SPARSE_THRESHOLD {
            HllSet::Sparse(registers.non_zero().collect())
        } else {
            HllSet::Full(registers)
        }
    }

    /// Approximate number of distinct elements; exact while the sketch is explicit.
    pub fn estimate_cardinality(&self) -> u64 {
        match self {
            HllSet::Empty => 0,
            HllSet::Explicit(hashes) => hashes.len() as u64,
            HllSet::Sparse(_) => self.to_registers().estimate_cardinality(),
            HllSet::Full(registers) => registers.estimate_cardinality(),
        }
    }
}

fn sparse_to_registers(entries: &BTreeMap<u16, u8>) -> Registers {
    let mut registers = Registers::zeroed();
    for (index, value) in entries {
        registers.set_max(*index as usize, *value);
    }
    registers
}

impl Registers {
    /// Register-wise maximum with any sketch representation.
    pub fn merge_set(&mut self, set: &HllSet) {
        match set {
            HllSet::Empty => {}
            HllSet::Explicit(hashes) => hashes.iter().for_each(|h| self.update(*h)),
            HllSet::Sparse(entries) => {
                for (index, value) in entries {
                    self.set_max(*index as usize, *value);
                }
            }
            HllSet::Full(registers) => self.merge(registers),
        }
    }
}
