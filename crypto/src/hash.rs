//! Keccak-256 hashing.

use sha3::{Digest, Keccak256};
use synth_types::Bytes32;

/// Compute the Keccak-256 hash of arbitrary data.
pub fn keccak256(data: &[u8]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Bytes32::new(hasher.finalize().into())
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn keccak256_multi(parts: &[&[u8]]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Bytes32::new(hasher.finalize().into())
}

/// Hash of the pair in ascending order, so the result does not depend on
/// which side each node sits.
pub fn sorted_hash_pair(a: &Bytes32, b: &Bytes32) -> Bytes32 {
    if a <= b {
        keccak256_multi(&[a.as_bytes(), b.as_bytes()])
    } else {
        keccak256_multi(&[b.as_bytes(), a.as_bytes()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_empty_vector() {
        assert_eq!(
            keccak256(b"").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak_abc_vector() {
        assert_eq!(
            keccak256(b"abc").to_hex(),
            "0x4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn keccak_multi_equivalent() {
        assert_eq!(keccak256(b"helloworld"), keccak256_multi(&[b"hello", b"world"]));
    }

    #[test]
    fn sorted_pair_is_symmetric() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(sorted_hash_pair(&a, &b), sorted_hash_pair(&b, &a));
        assert_ne!(sorted_hash_pair(&a, &b), sorted_hash_pair(&a, &a));
    }
}
