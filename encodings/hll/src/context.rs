use std::collections::BTreeSet;

use log::debug;
use olap_error::OlapResult;

use crate::{HLL_EXPLICIT_INT64_NUM, HllDataType, HllSet, Registers};

/// Working state used to union many sketches, e.g. all rows of an HLL column.
///
/// Explicit hashes are kept exactly until there are more than [`HLL_EXPLICIT_INT64_NUM`] of
/// them, after which they are folded into dense registers. The context remembers the most
/// advanced representation it has merged so that [`HllContext::to_set`] never downgrades.
#[derive(Debug, Clone, Default)]
pub struct HllContext {
    has_value: bool,
    floor: Option<HllDataType>,
    hashes: BTreeSet<u64>,
    registers: Option<Registers>,
}

impl HllContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any non-empty sketch has been merged.
    pub fn has_value(&self) -> bool {
        self.has_value
    }

    /// Union a parsed sketch into the context.
    pub fn merge(&mut self, set: &HllSet) {
        let data_type = set.data_type();
        if data_type == HllDataType::Empty {
            return;
        }
        self.has_value = true;
        self.floor = Some(self.floor.map_or(data_type, |floor| floor.max(data_type)));

        match set {
            HllSet::Empty => {}
            HllSet::Explicit(hashes) => {
                if let Some(registers) = self.registers.as_mut() {
                    hashes.iter().for_each(|h| registers.update(*h));
                } else {
                    self.hashes.extend(hashes.iter().copied());
                    if self.hashes.len() > HLL_EXPLICIT_INT64_NUM {
                        self.fold_hashes();
                    }
                }
            }
            HllSet::Sparse(_) | HllSet::Full(_) => {
                self.fold_hashes();
                self.registers
                    .get_or_insert_with(Registers::zeroed)
                    .merge_set(set);
            }
        }
    }

    /// Parse `bytes` and union the sketch into the context.
    pub fn merge_bytes(&mut self, bytes: &[u8]) -> OlapResult<()> {
        let set = HllSet::parse(bytes)?;
        self.merge(&set);
        Ok(())
    }

    fn fold_hashes(&mut self) {
        let registers = self.registers.get_or_insert_with(Registers::zeroed);
        if self.hashes.is_empty() {
            return;
        }
        debug!(
            "folding {} explicit hll hashes into registers",
            self.hashes.len()
        );
        for hash in std::mem::take(&mut self.hashes) {
            registers.update(hash);
        }
    }

    /// The union of everything merged so far, in its canonical representation.
    pub fn to_set(&self) -> HllSet {
        if !self.has_value {
            return HllSet::Empty;
        }
        match &self.registers {
            None => HllSet::Explicit(self.hashes.clone()),
            Some(registers) => {
                let floor = self.floor.unwrap_or(HllDataType::Sparse);
                HllSet::from_registers(registers.clone(), floor)
            }
        }
    }

    /// Serialize the union in its canonical representation.
    pub fn serialize(&self) -> Vec<u8> {
        self.to_set().to_bytes()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
