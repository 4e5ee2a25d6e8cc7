//! Merkle tree over the response hashes of one attestation round.
//!
//! Leaves are the round's hashes, sorted ascending and deduplicated. The tree
//! is a flat array of `2n - 1` nodes with the leaves in the last `n` slots;
//! every inner node is [`sorted_hash_pair`] of its two children. The root is
//! node 0. A tree with a single leaf has that leaf as root and empty proofs.

use synth_types::Bytes32;
use thiserror::Error;

use crate::hash::sorted_hash_pair;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    #[error("leaf index {index} out of range for {count} leaves")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("hash is not a leaf of this tree: {0}")]
    NotALeaf(Bytes32),
}

#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    nodes: Vec<Bytes32>,
    leaf_count: usize,
}

impl MerkleTree {
    /// Build a tree from an arbitrary multiset of hashes.
    pub fn new(hashes: impl IntoIterator<Item = Bytes32>) -> Self {
        let mut leaves: Vec<Bytes32> = hashes.into_iter().collect();
        leaves.sort_unstable();
        leaves.dedup();
        let n = leaves.len();
        if n == 0 {
            return Self::default();
        }
        let mut nodes = vec![Bytes32::ZERO; n - 1];
        nodes.extend(leaves);
        for i in (0..n - 1).rev() {
            nodes[i] = sorted_hash_pair(&nodes[2 * i + 1], &nodes[2 * i + 2]);
        }
        Self {
            nodes,
            leaf_count: n,
        }
    }

    /// `None` for an empty tree.
    pub fn root(&self) -> Option<Bytes32> {
        self.nodes.first().copied()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// The sorted, deduplicated leaves.
    pub fn sorted_leaves(&self) -> &[Bytes32] {
        &self.nodes[self.nodes.len() - self.leaf_count..]
    }

    pub fn leaf(&self, index: usize) -> Option<Bytes32> {
        self.sorted_leaves().get(index).copied()
    }

    /// Position of `hash` among the sorted leaves.
    pub fn index_of(&self, hash: &Bytes32) -> Option<usize> {
        self.sorted_leaves().binary_search(hash).ok()
    }

    /// Sibling path from leaf `index` up to (not including) the root.
    pub fn proof(&self, index: usize) -> Result<Vec<Bytes32>, MerkleError> {
        if index >= self.leaf_count {
            return Err(MerkleError::IndexOutOfRange {
                index,
                count: self.leaf_count,
            });
        }
        let mut path = Vec::new();
        let mut pos = self.nodes.len() - self.leaf_count + index;
        while pos > 0 {
            let sibling = if pos % 2 == 1 { pos + 1 } else { pos - 1 };
            path.push(self.nodes[sibling]);
            pos = (pos - 1) / 2;
        }
        Ok(path)
    }

    pub fn proof_for(&self, hash: &Bytes32) -> Result<Vec<Bytes32>, MerkleError> {
        let index = self.index_of(hash).ok_or(MerkleError::NotALeaf(*hash))?;
        self.proof(index)
    }
}

/// Fold `leaf` up through `proof` and compare against `root`.
pub fn verify_merkle_proof(leaf: &Bytes32, proof: &[Bytes32], root: &Bytes32) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |acc, sibling| sorted_hash_pair(sibling, &acc));
    computed == *root
}
