//! Cryptographic primitives for the attestation protocol client.
//!
//! - **Keccak-256** for address hashes and Merkle nodes (the hash the
//!   smart-contract chain verifies with)
//! - **Merkle tree** over a round's sorted response hashes, with inclusion
//!   proofs and verification

pub mod hash;
pub mod merkle;

pub use hash::{keccak256, keccak256_multi, sorted_hash_pair};
pub use merkle::{verify_merkle_proof, MerkleError, MerkleTree};
