use std::cmp::Ordering;

use olap_error::{OlapResult, olap_bail};

use crate::proto::StatisticsMessage;

/// A value as tracked by min/max statistics.
///
/// Every ordered fixed-width type widens losslessly into one of the two variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Int(i128),
    Float(f64),
}

impl StatValue {
    fn compare(&self, other: &StatValue) -> Option<Ordering> {
        match (self, other) {
            (StatValue::Int(l), StatValue::Int(r)) => Some(l.cmp(r)),
            (StatValue::Float(l), StatValue::Float(r)) => Some(l.total_cmp(r)),
            _ => None,
        }
    }

    /// Integers are stored as 16 little-endian bytes, floats as 8.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            StatValue::Int(v) => v.to_le_bytes().to_vec(),
            StatValue::Float(v) => v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> OlapResult<Self> {
        if let Ok(int) = <[u8; 16]>::try_from(bytes) {
            return Ok(StatValue::Int(i128::from_le_bytes(int)));
        }
        if let Ok(float) = <[u8; 8]>::try_from(bytes) {
            return Ok(StatValue::Float(f64::from_le_bytes(float)));
        }
        olap_bail!(DecodeError: "statistic value of {} bytes", bytes.len())
    }
}

/// Statistics accumulated over a range of rows.
///
/// Min and max are only tracked for columns whose values are ordered in this layer; string
/// and HLL columns only count nulls.
#[derive(Debug, Clone, Default)]
pub struct ColumnStatistics {
    tracks_min_max: bool,
    null_count: u64,
    min: Option<StatValue>,
    max: Option<StatValue>,
}

impl PartialEq for ColumnStatistics {
    fn eq(&self, other: &Self) -> bool {
        self.null_count == other.null_count && self.min == other.min && self.max == other.max
    }
}

impl ColumnStatistics {
    pub fn new(tracks_min_max: bool) -> Self {
        Self {
            tracks_min_max,
            ..Default::default()
        }
    }

    pub fn add_null(&mut self) {
        self.null_count += 1;
    }

    pub fn add(&mut self, value: StatValue) {
        if !self.tracks_min_max {
            return;
        }
        if self
            .min
            .is_none_or(|min| value.compare(&min) == Some(Ordering::Less))
        {
            self.min = Some(value);
        }
        if self
            .max
            .is_none_or(|max| value.compare(&max) == Some(Ordering::Greater))
        {
            self.max = Some(value);
        }
    }

    pub fn merge(&mut self, other: &ColumnStatistics) {
        self.null_count += other.null_count;
        if let Some(min) = other.min {
            self.add(min);
        }
        if let Some(max) = other.max {
            self.add(max);
        }
    }

    /// Return the accumulated statistics and start over.
    pub fn take(&mut self) -> ColumnStatistics {
        std::mem::replace(self, ColumnStatistics::new(self.tracks_min_max))
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    pub fn has_null(&self) -> bool {
        self.null_count > 0
    }

    pub fn min(&self) -> Option<StatValue> {
        self.min
    }

    pub fn max(&self) -> Option<StatValue> {
        self.max
    }

    pub fn to_message(&self) -> StatisticsMessage {
        StatisticsMessage {
            null_count: self.null_count,
            min: self.min.map(|v| v.to_bytes()),
            max: self.max.map(|v| v.to_bytes()),
        }
    }

    pub fn from_message(message: &StatisticsMessage) -> OlapResult<Self> {
        let min = message.min.as_deref().map(StatValue::from_bytes).transpose()?;
        let max = message.max.as_deref().map(StatValue::from_bytes).transpose()?;
        Ok(Self {
            tracks_min_max: min.is_some() || max.is_some(),
            null_count: message.null_count,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_min_max_and_nulls() {
        let mut stats = ColumnStatistics::new(true);
        for v in [5, -3, 12, 0] {
            stats.add(StatValue::Int(v));
        }
        stats.add_null();
        assert_eq!(stats.min(), Some(StatValue::Int(-3)));
        assert_eq!(stats.max(), Some(StatValue::Int(12)));
        assert!(stats.has_null());

        let taken = stats.take();
        assert_eq!(taken.null_count(), 1);
        assert_eq!(stats.min(), None);
        assert!(!stats.has_null());
    }

    #[test]
    fn null_count_only_columns_ignore_values() {
        let mut stats = ColumnStatistics::new(false);
        stats.add(StatValue::Int(1));
        assert_eq!(stats.min(), None);
        assert_eq!(stats.to_message().min, None);
    }

    #[test]
    fn merge_combines_ranges() {
        let mut left = ColumnStatistics::new(true);
        left.add(StatValue::Float(1.5));
        let mut right = ColumnStatistics::new(true);
        right.add(StatValue::Float(-2.0));
        right.add(StatValue::Float(9.0));
        right.add_null();
        left.merge(&right);
        assert_eq!(left.min(), Some(StatValue::Float(-2.0)));
        assert_eq!(left.max(), Some(StatValue::Float(9.0)));
        assert_eq!(left.null_count(), 1);
    }

    #[test]
    fn message_roundtrip() {
        let mut stats = ColumnStatistics::new(true);
        stats.add(StatValue::Int(i128::MIN));
        stats.add(StatValue::Int(i128::MAX));
        let decoded = ColumnStatistics::from_message(&stats.to_message()).unwrap();
        assert_eq!(decoded, stats);

        let bad = StatisticsMessage {
            min: Some(vec![1, 2, 3]),
            ..Default::default()
        };
        assert!(ColumnStatistics::from_message(&bad).is_err());
    }
}
