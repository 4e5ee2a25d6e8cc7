use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use synth_attestation::{
    AttestationProof, AttestationRequest, AttestationResponseBody,
    ConfirmedBlockHeightExistsRequest, ConfirmedBlockHeightExistsResponse, ProofVerifier,
};
use synth_contracts::{ContractError, MerkleRootRelay, RelayProofVerifier};
use synth_crypto::{keccak256, MerkleTree};
use synth_types::{Bytes32, SourceId};

struct Relay {
    roots: HashMap<u64, Bytes32>,
    down: bool,
}

#[async_trait]
impl MerkleRootRelay for Relay {
    async fn merkle_root(&self, round: u64) -> Result<Option<Bytes32>, ContractError> {
        if self.down {
            return Err(ContractError::Transient("node unreachable".into()));
        }
        Ok(self.roots.get(&round).copied())
    }
}

fn proof_in_round(round: u64) -> (AttestationProof, Bytes32) {
    let leaves: Vec<Bytes32> = (0u8..5).map(|i| keccak256(&[i])).collect();
    let tree = MerkleTree::new(leaves.iter().copied());
    let hash = leaves[3];
    let proof = AttestationProof {
        round,
        hash,
        merkle_proof: tree.proof_for(&hash).unwrap(),
        request: AttestationRequest::ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsRequest {
            source_id: SourceId::Btc,
            block_number: 10,
            query_window: 86_400,
            integrity_code: Bytes32::ZERO,
        }),
        response: AttestationResponseBody::ConfirmedBlockHeightExists(
            ConfirmedBlockHeightExistsResponse {
                block_number: 10,
                block_timestamp: 1_000,
                number_of_confirmations: 6,
                average_block_production_time_ms: 600_000,
                lowest_query_window_block_number: 1,
                lowest_query_window_block_timestamp: 100,
            },
        ),
    };
    (proof, tree.root().unwrap())
}

#[tokio::test]
async fn test_valid_path_against_relayed_root() {
    let (proof, root) = proof_in_round(7);
    let verifier = RelayProofVerifier::new(Arc::new(Relay {
        roots: HashMap::from([(7, root)]),
        down: false,
    }));
    assert!(verifier.verify(&proof).await.unwrap());
}

#[tokio::test]
async fn test_wrong_round_or_missing_root_rejects() {
    let (mut proof, root) = proof_in_round(7);
    let verifier = RelayProofVerifier::new(Arc::new(Relay {
        roots: HashMap::from([(7, root), (8, keccak256(b"other"))]),
        down: false,
    }));
    proof.round = 8;
    assert!(!verifier.verify(&proof).await.unwrap());
    proof.round = 9;
    assert!(!verifier.verify(&proof).await.unwrap());
}

#[tokio::test]
async fn test_relay_outage_is_network_error() {
    let (proof, _) = proof_in_round(7);
    let verifier = RelayProofVerifier::new(Arc::new(Relay {
        roots: HashMap::new(),
        down: true,
    }));
    let err = verifier.verify(&proof).await.unwrap_err();
    assert!(err.is_transient());
}
