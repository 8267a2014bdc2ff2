use std::fmt::{Debug, Formatter};

use olap_error::{OlapResult, olap_bail};

use crate::{HLL_COLUMN_PRECISION, HLL_REGISTERS_COUNT, HLL_ZERO_COUNT_BITS};

/// Returns the register a hash falls into and the value it proposes for that register.
///
/// The low [`HLL_COLUMN_PRECISION`] bits select the register. The value is one more than the
/// number of consecutive zero bits at the low end of the remaining hash; a marker bit at
/// position [`HLL_ZERO_COUNT_BITS`] caps the run, so values lie in `1..=51`.
#[inline]
pub fn register_for_hash(hash: u64) -> (usize, u8) {
    let index = (hash % HLL_REGISTERS_COUNT as u64) as usize;
    let shifted = (hash >> HLL_COLUMN_PRECISION) | (1u64 << HLL_ZERO_COUNT_BITS);
    let value = shifted.trailing_zeros() as u8 + 1;
    (index, value)
}

/// Raises every register addressed by `hashes` to the value the hash proposes, keeping the
/// larger of the old and new value.
pub fn set_max_register(
    registers: &mut [u8],
    hashes: impl IntoIterator<Item = u64>,
) -> OlapResult<()> {
    if registers.len() != HLL_REGISTERS_COUNT {
        olap_bail!(
            InvalidArgument: "expected {} registers, got {}",
            HLL_REGISTERS_COUNT,
            registers.len()
        );
    }
    for hash in hashes {
        let (index, value) = register_for_hash(hash);
        if registers[index] < value {
            registers[index] = value;
        }
    }
    Ok(())
}

/// The dense register array of a sketch.
#[derive(Clone, PartialEq, Eq)]
pub struct Registers(Box<[u8]>);

impl Default for Registers {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Registers {
    pub fn zeroed() -> Self {
        Self(vec![0u8; HLL_REGISTERS_COUNT].into_boxed_slice())
    }

    /// Copy registers out of a slice that must hold exactly [`HLL_REGISTERS_COUNT`] bytes.
    pub fn try_from_slice(registers: &[u8]) -> OlapResult<Self> {
        if registers.len() != HLL_REGISTERS_COUNT {
            olap_bail!(
                InvalidEncoding: "full hll payload has {} registers, expected {}",
                registers.len(),
                HLL_REGISTERS_COUNT
            );
        }
        Ok(Self(registers.into()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// Raise a single register to `value` if it is currently lower.
    #[inline]
    pub fn set_max(&mut self, index: usize, value: u8) {
        let slot = &mut self.0[index];
        if *slot < value {
            *slot = value;
        }
    }

    #[inline]
    pub fn update(&mut self, hash: u64) {
        let (index, value) = register_for_hash(hash);
        self.set_max(index, value);
    }

    /// Register-wise maximum with another sketch.
    pub fn merge(&mut self, other: &Registers) {
        for (l, r) in self.0.iter_mut().zip(other.0.iter()) {
            if *l < *r {
                *l = *r;
            }
        }
    }

    pub fn non_zero_count(&self) -> usize {
        self.0.iter().filter(|v| **v != 0).count()
    }

    /// Iterate `(index, value)` over the non-zero registers in index order.
    pub fn non_zero(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(idx, v)| (idx as u16, *v))
    }

    /// The HyperLogLog cardinality estimate, using linear counting for small cardinalities.
    pub fn estimate_cardinality(&self) -> u64 {
        let m = HLL_REGISTERS_COUNT as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);

        let mut harmonic = 0.0f64;
        let mut zeros = 0usize;
        for &register in self.0.iter() {
            harmonic += 2f64.powi(-i32::from(register));
            if register == 0 {
                zeros += 1;
            }
        }

        let mut estimate = alpha * m * m / harmonic;
        if estimate <= 2.5 * m && zeros != 0 {
            estimate = m * (m / zeros as f64).ln();
        }
        estimate.round() as u64
    }
}

impl Debug for Registers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registers")
            .field("non_zero", &self.non_zero_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x0000_0000_0000_0001, 1, 51)]
    #[case(0x0000_0000_0000_0000, 0, 51)]
    #[case(0x0000_0000_0000_4000, 0, 1)]
    #[case(0x0000_0000_0000_8003, 3, 2)]
    #[case(0x0000_0000_0001_3fff, 16383, 3)]
    #[case(0x8000_0000_0000_0000, 0, 50)]
    #[case(0xffff_ffff_ffff_ffff, 16383, 1)]
    fn register_is_bit_exact(#[case] hash: u64, #[case] index: usize, #[case] value: u8) {
        assert_eq!(register_for_hash(hash), (index, value));
    }

    #[test]
    fn set_max_keeps_maximum() {
        let mut registers = vec![0u8; HLL_REGISTERS_COUNT];
        // same register, values 1 and 3
        set_max_register(&mut registers, [0x4005, 0x10005]).unwrap();
        assert_eq!(registers[5], 3);
        set_max_register(&mut registers, [0x4005]).unwrap();
        assert_eq!(registers[5], 3);
    }

    #[test]
    fn set_max_rejects_wrong_length() {
        let mut registers = vec![0u8; 16];
        assert!(set_max_register(&mut registers, [1]).is_err());
    }

    #[test]
    fn empty_registers_estimate_zero() {
        assert_eq!(Registers::zeroed().estimate_cardinality(), 0);
    }
}
