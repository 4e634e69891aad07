use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IntentError;

/// Most decimals any token can use: a `uint256` has at most 78 digits.
pub const MAX_DECIMALS: u32 = 77;

/// Exact token amount in the smallest on-chain unit (wei for 18-decimal assets).
///
/// Serialized as a decimal string so it survives JSON without precision loss.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(BigUint);

impl Amount {
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::default()
    }

    /// Parse a base-unit integer given as a decimal string.
    pub fn parse(s: &str) -> Result<Self, IntentError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IntentError::InvalidAmount(s.to_string()));
        }
        BigUint::parse_bytes(s.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| IntentError::InvalidAmount(s.to_string()))
    }

    /// Parse a display amount such as `"0.01"` into base units.
    ///
    /// `parse_units("0.01", 18)` is 10^16. More fractional digits than
    /// `decimals` is an error, never a silent rounding. `decimals` above
    /// [`MAX_DECIMALS`] is rejected.
    pub fn parse_units(s: &str, decimals: u32) -> Result<Self, IntentError> {
        let invalid = || IntentError::InvalidAmount(s.to_string());
        if decimals > MAX_DECIMALS {
            return Err(IntentError::InvalidAmount(format!(
                "{} ({} decimals, at most {})",
                s, decimals, MAX_DECIMALS
            )));
        }
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > decimals as usize {
            return Err(invalid());
        }

        let mut digits = String::with_capacity(whole.len() + decimals as usize);
        digits.push_str(whole);
        digits.push_str(frac);
        digits.extend(std::iter::repeat('0').take(decimals as usize - frac.len()));

        BigUint::parse_bytes(digits.as_bytes(), 10)
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Render in display units, trimming trailing fractional zeros.
    pub fn format_units(&self, decimals: u32) -> String {
        let raw = self.0.to_str_radix(10);
        let decimals = decimals as usize;
        if decimals == 0 {
            return raw;
        }

        let padded = if raw.len() <= decimals {
            format!("{}{}", "0".repeat(decimals + 1 - raw.len()), raw)
        } else {
            raw
        };
        let (whole, frac) = padded.split_at(padded.len() - decimals);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, frac)
        }
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<BigUint> for Amount {
    fn from(v: BigUint) -> Self {
        Self(v)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units_exact() {
        let a = Amount::parse_units("0.01", 18).unwrap();
        assert_eq!(a.to_string(), "10000000000000000");

        let b = Amount::parse_units("1", 18).unwrap();
        assert_eq!(b.to_string(), "1000000000000000000");

        let c = Amount::parse_units("123456789.000000000000000001", 18).unwrap();
        assert_eq!(c.to_string(), "123456789000000000000000001");

        let d = Amount::parse_units(".5", 1).unwrap();
        assert_eq!(d, Amount::from(5u64));
    }

    #[test]
    fn test_parse_units_rejects_bad_input() {
        for bad in ["", ".", "-1", "1e18", "0.1.2", "abc", " 1"] {
            assert!(Amount::parse_units(bad, 18).is_err(), "accepted {:?}", bad);
        }
        // more precision than the asset carries
        assert!(Amount::parse_units("0.0000001", 6).is_err());
    }

    #[test]
    fn test_parse_units_decimals_bound() {
        assert!(matches!(
            Amount::parse_units("1", u32::MAX),
            Err(IntentError::InvalidAmount(_))
        ));
        assert!(Amount::parse_units("1", MAX_DECIMALS + 1).is_err());

        let max = Amount::parse_units("1", MAX_DECIMALS).unwrap();
        assert_eq!(max.to_string().len(), MAX_DECIMALS as usize + 1);
    }

    #[test]
    fn test_format_units() {
        let a = Amount::parse("10000000000000000").unwrap();
        assert_eq!(a.format_units(18), "0.01");
        assert_eq!(Amount::from(1_500_000u64).format_units(6), "1.5");
        assert_eq!(Amount::from(7u64).format_units(0), "7");
        assert_eq!(Amount::zero().format_units(18), "0");
    }

    #[test]
    fn test_large_amount_survives_json() {
        // beyond u128
        let s = "340282366920938463463374607431768211456000";
        let a = Amount::parse(s).unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", s));
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
