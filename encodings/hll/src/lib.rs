//! HyperLogLog sketches as stored in HLL aggregate columns.
//!
//! A sketch is in exactly one of four representations, see [`HllSet`]. Representations only
//! ever move forward, `EMPTY -> EXPLICIT -> SPARSE -> FULL`, and the wire encoding starts with
//! a one byte discriminator that tells which payload follows:
//!
//! | type | payload |
//! |------|---------|
//! | 0 `EMPTY` | nothing |
//! | 1 `EXPLICIT` | `u8` count, then count little-endian `u64` hashes |
//! | 2 `SPARSE` | `u32` LE count, then count `(u16 LE index, u8 value)` pairs |
//! | 3 `FULL` | 16384 one-byte registers |

pub use context::*;
pub use registers::*;
pub use set::*;

mod context;
mod registers;
mod set;

use olap_error::{OlapError, olap_err};

/// Number of hash bits used to select a register.
pub const HLL_COLUMN_PRECISION: u32 = 14;
/// Number of registers of a dense sketch.
pub const HLL_REGISTERS_COUNT: usize = 1 << HLL_COLUMN_PRECISION;
/// Maximum number of distinct hashes an `EXPLICIT` sketch holds.
pub const HLL_EXPLICIT_INT64_NUM: usize = 160;
/// Maximum number of non-zero registers a `SPARSE` sketch holds.
pub const HLL_SPARSE_THRESHOLD: usize = HLL_REGISTERS_COUNT / 3;
/// Serialized size of a `FULL` sketch: the registers plus the type byte.
pub const HLL_COLUMN_DEFAULT_LEN: usize = HLL_REGISTERS_COUNT + 1;
/// Hash bits left after the register index has been taken.
pub const HLL_ZERO_COUNT_BITS: u32 = 64 - HLL_COLUMN_PRECISION;

/// Wire discriminator of a serialized sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum HllDataType {
    Empty = 0,
    Explicit = 1,
    Sparse = 2,
    Full = 3,
}

impl TryFrom<u8> for HllDataType {
    type Error = OlapError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Empty,
            1 => Self::Explicit,
            2 => Self::Sparse,
            3 => Self::Full,
            other => return Err(olap_err!(InvalidEncoding: "unknown hll type byte {}", other)),
        })
    }
}
