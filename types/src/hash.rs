//! 32-byte hash values: attestation response hashes, Merkle nodes, address
//! hashes and payment references all share this representation.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// A 32-byte value, rendered as `0x`-prefixed lower-case hex.
///
/// Ordering is byte-lexicographic, which is the same as comparing the
/// big-endian numbers or the lower-case hex strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes32([u8; 32]);

impl Bytes32 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| TypesError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Right-align a big-endian integer into 32 bytes.
    pub fn from_u128(value: u128) -> Self {
        let mut out = [0u8; 32];
        out[16..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Bytes32 {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_with_and_without_prefix() {
        let h = Bytes32::new([0xab; 32]);
        assert_eq!(Bytes32::from_hex(&h.to_hex()).unwrap(), h);
        assert_eq!(Bytes32::from_hex(&"ab".repeat(32)).unwrap(), h);
    }

    #[test]
    fn test_uppercase_hex_decodes_to_same_bytes() {
        let lower = Bytes32::from_hex(&"c0ffee01".repeat(8)).unwrap();
        let upper = Bytes32::from_hex(&"C0FFEE01".repeat(8)).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            Bytes32::from_hex("0x1234"),
            Err(TypesError::InvalidLength { expected: 32, actual: 2 })
        );
        assert!(matches!(Bytes32::from_hex("0xzz"), Err(TypesError::InvalidHex(_))));
    }

    #[test]
    fn test_from_u128_is_big_endian() {
        let h = Bytes32::from_u128(1);
        assert_eq!(h.as_bytes()[31], 1);
        assert!(h.as_bytes()[..31].iter().all(|b| *b == 0));
        assert!(Bytes32::from_u128(1) < Bytes32::from_u128(256));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let h = Bytes32::from_u128(0x42);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"0x{}42\"", "0".repeat(62)));
        let back: Bytes32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
