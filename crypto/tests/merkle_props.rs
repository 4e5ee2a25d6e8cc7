use proptest::prelude::*;

use synth_crypto::{keccak256, verify_merkle_proof, MerkleTree};
use synth_types::Bytes32;

fn hash_set() -> impl Strategy<Value = Vec<Bytes32>> {
    prop::collection::vec(prop::array::uniform32(0u8..), 1..64)
        .prop_map(|v| v.into_iter().map(Bytes32::new).collect())
}

proptest! {
    /// Every member of the round has an inclusion proof against the root.
    #[test]
    fn members_verify(hashes in hash_set()) {
        let tree = MerkleTree::new(hashes.clone());
        let root = tree.root().unwrap();
        for h in &hashes {
            let proof = tree.proof_for(h).unwrap();
            prop_assert!(verify_merkle_proof(h, &proof, &root));
        }
    }

    /// A hash outside the round fails with any member's proof.
    #[test]
    fn non_members_fail(hashes in hash_set(), outsider in prop::array::uniform32(0u8..)) {
        let outsider = Bytes32::new(outsider);
        prop_assume!(!hashes.contains(&outsider));
        let tree = MerkleTree::new(hashes.clone());
        let root = tree.root().unwrap();
        prop_assert!(tree.proof_for(&outsider).is_err());
        for i in 0..tree.leaf_count() {
            let proof = tree.proof(i).unwrap();
            prop_assert!(!verify_merkle_proof(&outsider, &proof, &root));
        }
    }

    /// The root depends on the set of hashes, not their order.
    #[test]
    fn root_is_order_independent(mut hashes in hash_set()) {
        let a = MerkleTree::new(hashes.clone()).root();
        hashes.reverse();
        prop_assert_eq!(a, MerkleTree::new(hashes).root());
    }
}

/// Pinned vector: four leaves keccak256(0..4 as u32 big-endian).
#[test]
fn four_leaf_root_is_stable() {
    let leaves: Vec<Bytes32> = (0u32..4).map(|i| keccak256(&i.to_be_bytes())).collect();
    let tree = MerkleTree::new(leaves.clone());
    let sorted = tree.sorted_leaves().to_vec();
    let left = synth_crypto::sorted_hash_pair(&sorted[0], &sorted[1]);
    let right = synth_crypto::sorted_hash_pair(&sorted[2], &sorted[3]);
    // Node 1 covers slots 3,4 (sorted[0], sorted[1]); node 2 covers 5,6.
    assert_eq!(tree.root(), Some(synth_crypto::sorted_hash_pair(&left, &right)));
    assert_eq!(hex::encode(tree.root().unwrap().as_bytes()).len(), 64);
}
