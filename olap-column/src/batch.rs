use olap_error::{OlapResult, olap_bail, olap_err};

use crate::field::NativeValue;
use crate::options::ReaderOptions;
use crate::types::Decimal12;

/// Decoded values of up to `capacity` consecutive rows of one column.
///
/// Fixed-width values are stored back to back with a constant stride; variable-length values
/// are copied into an arena and addressed by `(offset, len)` slices. Every accessor checks its
/// index and the requested width. A batch is reused across `next_vector` calls, which clear it
/// first.
#[derive(Debug, Clone)]
pub struct ColumnBatch {
    capacity: usize,
    len: usize,
    stride: usize,
    data: Vec<u8>,
    slices: Vec<(usize, usize)>,
    arena: Vec<u8>,
    is_null: Vec<bool>,
}

impl ColumnBatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            len: 0,
            stride: 0,
            data: Vec::new(),
            slices: Vec::new(),
            arena: Vec::new(),
            is_null: Vec::with_capacity(capacity),
        }
    }

    pub fn for_options(options: &ReaderOptions) -> Self {
        Self::new(options.batch_capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of each fixed-width slot, zero for variable-length columns.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn is_null(&self, idx: usize) -> OlapResult<bool> {
        self.is_null
            .get(idx)
            .copied()
            .ok_or_else(|| olap_err!(OutOfBounds: idx, 0, self.len))
    }

    pub fn null_mask(&self) -> &[bool] {
        &self.is_null
    }

    pub fn has_null(&self) -> bool {
        self.is_null.contains(&true)
    }

    /// The raw storage bytes of a fixed-width slot.
    pub fn raw(&self, idx: usize) -> OlapResult<&[u8]> {
        if self.stride == 0 {
            olap_bail!("batch holds variable-length values");
        }
        if idx >= self.len {
            olap_bail!(OutOfBounds: idx, 0, self.len);
        }
        Ok(&self.data[idx * self.stride..(idx + 1) * self.stride])
    }

    /// The value of a fixed-width slot. Null slots decode their zero placeholder.
    pub fn value<T: NativeValue>(&self, idx: usize) -> OlapResult<T> {
        if T::WIDTH != self.stride {
            olap_bail!(
                "cannot read {} byte values from a batch with stride {}",
                T::WIDTH,
                self.stride
            );
        }
        T::read_le(self.raw(idx)?)
    }

    /// The value of a fixed-width slot, or `None` when the row is null.
    pub fn get<T: NativeValue>(&self, idx: usize) -> OlapResult<Option<T>> {
        if self.is_null(idx)? {
            return Ok(None);
        }
        self.value(idx).map(Some)
    }

    pub fn decimal(&self, idx: usize) -> OlapResult<Decimal12> {
        if self.stride != Decimal12::WIDTH {
            olap_bail!("batch with stride {} does not hold decimals", self.stride);
        }
        let raw = self.raw(idx)?;
        let integer = i64::read_le(&raw[..8])?;
        let fraction = i32::read_le(&raw[8..])?;
        Ok(Decimal12::new(integer, fraction))
    }

    /// The bytes of a string or HLL row; empty for nulls.
    pub fn slice(&self, idx: usize) -> OlapResult<&[u8]> {
        if self.stride != 0 {
            olap_bail!("batch holds fixed-width values");
        }
        let (offset, len) = *self
            .slices
            .get(idx)
            .ok_or_else(|| olap_err!(OutOfBounds: idx, 0, self.len))?;
        Ok(&self.arena[offset..offset + len])
    }

    /// Values of every row, `None` for nulls.
    pub fn slices(&self) -> impl Iterator<Item = Option<&[u8]>> + '_ {
        self.slices
            .iter()
            .zip(&self.is_null)
            .map(|(&(offset, len), &null)| (!null).then(|| &self.arena[offset..offset + len]))
    }

    pub(crate) fn reset(&mut self, stride: usize) {
        self.len = 0;
        self.stride = stride;
        self.data.clear();
        self.slices.clear();
        self.arena.clear();
        self.is_null.clear();
    }

    /// Zeroed storage for `n` fixed-width rows, appended after the current ones.
    pub(crate) fn fixed_slots_mut(&mut self, n: usize) -> &mut [u8] {
        let start = self.data.len();
        self.data.resize(start + n * self.stride, 0);
        &mut self.data[start..]
    }

    /// Mark the next `n` rows filled through [`Self::fixed_slots_mut`] with their null flags.
    pub(crate) fn commit_fixed(&mut self, nulls: impl IntoIterator<Item = bool>) {
        self.is_null.extend(nulls);
        self.len = self.is_null.len();
    }

    pub(crate) fn push_null_slice(&mut self) {
        self.slices.push((self.arena.len(), 0));
        self.is_null.push(true);
        self.len += 1;
    }

    pub(crate) fn push_slice(&mut self, bytes: &[u8]) {
        self.slices.push((self.arena.len(), bytes.len()));
        self.arena.extend_from_slice(bytes);
        self.is_null.push(false);
        self.len += 1;
    }

    /// Append a row of `len` bytes filled in by `fill`.
    pub(crate) fn push_slice_with(
        &mut self,
        len: usize,
        fill: impl FnOnce(&mut [u8]) -> OlapResult<()>,
    ) -> OlapResult<()> {
        let start = self.arena.len();
        self.arena.resize(start + len, 0);
        fill(&mut self.arena[start..])?;
        self.slices.push((start, len));
        self.is_null.push(false);
        self.len += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_slots_are_bounds_checked() {
        let mut batch = ColumnBatch::new(4);
        batch.reset(4);
        let slots = batch.fixed_slots_mut(2);
        slots[..4].copy_from_slice(&7i32.to_le_bytes());
        batch.commit_fixed([false, true]);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.value::<i32>(0).unwrap(), 7);
        assert_eq!(batch.value::<i32>(1).unwrap(), 0);
        assert_eq!(batch.get::<i32>(1).unwrap(), None);
        assert!(batch.value::<i32>(2).is_err());
        assert!(batch.value::<i64>(0).is_err());
        assert!(batch.slice(0).is_err());
        assert!(batch.has_null());
    }

    #[test]
    fn slices_point_into_arena() {
        let mut batch = ColumnBatch::new(4);
        batch.reset(0);
        batch.push_slice(b"ab");
        batch.push_null_slice();
        batch
            .push_slice_with(3, |buf| {
                buf.copy_from_slice(b"xyz");
                Ok(())
            })
            .unwrap();
        assert_eq!(batch.slice(0).unwrap(), b"ab");
        assert_eq!(batch.slice(1).unwrap(), b"");
        assert_eq!(batch.slice(2).unwrap(), b"xyz");
        assert_eq!(
            batch.slices().collect::<Vec<_>>(),
            [Some(&b"ab"[..]), None, Some(&b"xyz"[..])]
        );
        assert!(batch.value::<u8>(0).is_err());

        batch.reset(0);
        assert!(batch.is_empty());
        assert!(batch.is_null(0).is_err());
    }

    #[test]
    fn decimal_slots() {
        let mut batch = ColumnBatch::new(1);
        batch.reset(Decimal12::WIDTH);
        let slot = batch.fixed_slots_mut(1);
        slot[..8].copy_from_slice(&(-3i64).to_le_bytes());
        slot[8..].copy_from_slice(&(-250_000_000i32).to_le_bytes());
        batch.commit_fixed([false]);
        assert_eq!(batch.decimal(0).unwrap().to_string(), "-3.25");
    }
}
