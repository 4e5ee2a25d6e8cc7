//! Underlying-chain amounts.
//!
//! Amounts are fixed-point integers (u128) in the smallest denomination of the
//! foreign asset (UBA), so no floating-point rounding ever reaches the lifecycles.
//! JSON carries them as decimal strings; plain numbers are accepted on input.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

/// An amount in underlying base amount units (satoshi, drops, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UbaAmount(u128);

impl UbaAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Add for UbaAmount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for UbaAmount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for UbaAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc.saturating_add(x))
    }
}

impl From<u128> for UbaAmount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UbaAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} UBA", self.0)
    }
}

impl Serialize for UbaAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = UbaAmount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(UbaAmount(u128::from(v)))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
        Ok(UbaAmount(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.trim().parse::<u128>().map(UbaAmount).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for UbaAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_sub_underflow() {
        assert_eq!(UbaAmount::new(5).checked_sub(UbaAmount::new(6)), None);
        assert_eq!(
            UbaAmount::new(10_000).checked_sub(UbaAmount::new(50)),
            Some(UbaAmount::new(9_950))
        );
    }

    #[test]
    fn test_sum_saturates() {
        let total: UbaAmount = [UbaAmount::new(u128::MAX), UbaAmount::new(1)].into_iter().sum();
        assert_eq!(total.raw(), u128::MAX);
    }

    #[test]
    fn test_serde_decimal_string() {
        let json = serde_json::to_string(&UbaAmount::new(20_000)).unwrap();
        assert_eq!(json, "\"20000\"");
        let back: UbaAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UbaAmount::new(20_000));
        let from_number: UbaAmount = serde_json::from_str("9950").unwrap();
        assert_eq!(from_number, UbaAmount::new(9_950));
        assert!(serde_json::from_str::<UbaAmount>("-1").is_err());
    }
}
