//! Fixed-width value types with a storage layout of their own.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use olap_error::{OlapError, OlapResult, olap_bail, olap_err};

/// A calendar date packed into three bytes as `year << 9 | month << 5 | day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date24(u32);

impl Date24 {
    pub const WIDTH: usize = 3;

    pub fn try_new(year: u32, month: u32, day: u32) -> OlapResult<Self> {
        if year > 9999 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            olap_bail!("invalid date {:04}-{:02}-{:02}", year, month, day);
        }
        Ok(Self((year << 9) | (month << 5) | day))
    }

    pub fn from_packed(packed: u32) -> Self {
        Self(packed & 0x00ff_ffff)
    }

    pub fn packed(&self) -> u32 {
        self.0
    }

    pub fn year(&self) -> u32 {
        self.0 >> 9
    }

    pub fn month(&self) -> u32 {
        (self.0 >> 5) & 0xf
    }

    pub fn day(&self) -> u32 {
        self.0 & 0x1f
    }

    pub fn to_le_bytes(self) -> [u8; 3] {
        let [b0, b1, b2, _] = self.0.to_le_bytes();
        [b0, b1, b2]
    }

    pub fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }
}

impl FromStr for Date24 {
    type Err = OlapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '-');
        let mut next = || -> OlapResult<u32> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| olap_err!("invalid date literal {:?}", s))
        };
        let (year, month, day) = (next()?, next()?, next()?);
        Self::try_new(year, month, day)
    }
}

impl Display for Date24 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}

/// A timestamp stored as the decimal number `YYYYMMDDhhmmss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateTime64(u64);

impl DateTime64 {
    pub const WIDTH: usize = 8;

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl FromStr for DateTime64 {
    type Err = OlapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (date, time) = s.split_once(' ').unwrap_or((s, "00:00:00"));
        let date: Date24 = date.parse()?;

        let mut fields = time.splitn(3, ':').map(|p| p.parse::<u64>().ok());
        let (Some(Some(hour)), Some(Some(minute)), Some(Some(second))) =
            (fields.next(), fields.next(), fields.next())
        else {
            olap_bail!("invalid datetime literal {:?}", s);
        };
        if hour > 23 || minute > 59 || second > 59 {
            olap_bail!("invalid datetime literal {:?}", s);
        }
        let day = u64::from(date.year()) * 10_000
            + u64::from(date.month()) * 100
            + u64::from(date.day());
        Ok(Self(day * 1_000_000 + hour * 10_000 + minute * 100 + second))
    }
}

impl Display for DateTime64 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let date = self.0 / 1_000_000;
        let time = self.0 % 1_000_000;
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            date / 10_000,
            date / 100 % 100,
            date % 100,
            time / 10_000,
            time / 100 % 100,
            time % 100
        )
    }
}

/// A fixed-point decimal with an 18-digit integer part and a 9-digit fraction.
///
/// Both parts carry the sign of the value, so `-1.5` is `{ integer: -1, fraction: -500000000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal12 {
    pub integer: i64,
    pub fraction: i32,
}

impl Decimal12 {
    pub const WIDTH: usize = 12;
    pub const FRACTION_DIGITS: u32 = 9;
    const FRACTION_SCALE: i32 = 1_000_000_000;

    pub fn new(integer: i64, fraction: i32) -> Self {
        Self { integer, fraction }
    }

    /// The value scaled by 10^9, which orders the same way as the decimal.
    pub fn scaled(&self) -> i128 {
        i128::from(self.integer) * i128::from(Self::FRACTION_SCALE) + i128::from(self.fraction)
    }
}

impl FromStr for Decimal12 {
    type Err = OlapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        let valid = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !valid(int_part)
            || !valid(frac_part)
            || frac_part.len() > Self::FRACTION_DIGITS as usize
        {
            olap_bail!("invalid decimal literal {:?}", s);
        }

        let integer: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| olap_err!("decimal literal {:?} out of range", s))?
        };
        let mut fraction: i32 = if frac_part.is_empty() {
            0
        } else {
            frac_part
                .parse()
                .map_err(|_| olap_err!("invalid decimal literal {:?}", s))?
        };
        fraction *= 10i32.pow(Self::FRACTION_DIGITS - frac_part.len() as u32);

        Ok(if negative {
            Self::new(-integer, -fraction)
        } else {
            Self::new(integer, fraction)
        })
    }
}

impl Display for Decimal12 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.integer < 0 || self.fraction < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}", self.integer.unsigned_abs())?;
        let fraction = format!("{:09}", self.fraction.unsigned_abs());
        let fraction = fraction.trim_end_matches('0');
        if !fraction.is_empty() {
            write!(f, ".{fraction}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn date_packing() {
        let date: Date24 = "2000-10-10".parse().unwrap();
        assert_eq!(date.packed(), (2000 << 9) | (10 << 5) | 10);
        assert_eq!(Date24::from_le_bytes(date.to_le_bytes()), date);
        assert_eq!(date.to_string(), "2000-10-10");
        assert!("2000-13-01".parse::<Date24>().is_err());
        assert!("2000-10".parse::<Date24>().is_err());
    }

    #[test]
    fn datetime_parse_display() {
        let datetime: DateTime64 = "2000-10-10 10:10:10".parse().unwrap();
        assert_eq!(datetime.raw(), 20001010101010);
        assert_eq!(datetime.to_string(), "2000-10-10 10:10:10");
        assert_eq!("2000-10-10".parse::<DateTime64>().unwrap().raw(), 20001010000000);
        assert!("2000-10-10 25:00:00".parse::<DateTime64>().is_err());
    }

    #[rstest]
    #[case("1234.5678", 1234, 567_800_000, "1234.5678")]
    #[case("5678.1234", 5678, 123_400_000, "5678.1234")]
    #[case("-1.5", -1, -500_000_000, "-1.5")]
    #[case("-0.25", 0, -250_000_000, "-0.25")]
    #[case("42", 42, 0, "42")]
    #[case(".000000001", 0, 1, "0.000000001")]
    fn decimal_parse_display(
        #[case] literal: &str,
        #[case] integer: i64,
        #[case] fraction: i32,
        #[case] display: &str,
    ) {
        let decimal: Decimal12 = literal.parse().unwrap();
        assert_eq!(decimal, Decimal12::new(integer, fraction));
        assert_eq!(decimal.to_string(), display);
    }

    #[rstest]
    #[case("")]
    #[case("1.2.3")]
    #[case("1.0000000001")]
    #[case("abc")]
    #[case("99999999999999999999")]
    fn decimal_rejects(#[case] literal: &str) {
        assert!(literal.parse::<Decimal12>().is_err());
    }

    #[test]
    fn decimal_order_follows_value() {
        let values = ["-2.5", "-2.25", "0", "0.1", "3"]
            .map(|s| s.parse::<Decimal12>().unwrap().scaled());
        assert!(values.is_sorted());
    }
}
