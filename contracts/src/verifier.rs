//! Proof verification against the Merkle roots relayed on-chain.

use std::sync::Arc;

use async_trait::async_trait;
use synth_attestation::{AttestationHelperError, AttestationProof, ProofVerifier};
use synth_crypto::verify_merkle_proof;
use synth_types::Bytes32;
use tracing::debug;

use crate::error::ContractError;

/// Source of finalized round roots (the relay contract).
#[async_trait]
pub trait MerkleRootRelay: Send + Sync {
    /// Root for `round`, or `None` while the round is not finalized on-chain.
    async fn merkle_root(&self, round: u64) -> Result<Option<Bytes32>, ContractError>;
}

/// Checks a proof's inclusion path against the relayed root, the same check
/// the contract performs when the proof is submitted.
#[derive(Clone)]
pub struct RelayProofVerifier {
    relay: Arc<dyn MerkleRootRelay>,
}

impl RelayProofVerifier {
    pub fn new(relay: Arc<dyn MerkleRootRelay>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl ProofVerifier for RelayProofVerifier {
    async fn verify(&self, proof: &AttestationProof) -> Result<bool, AttestationHelperError> {
        let root = self.relay.merkle_root(proof.round).await.map_err(|e| {
            if e.is_transient() {
                AttestationHelperError::Network(e.to_string())
            } else {
                AttestationHelperError::Verifier(e.to_string())
            }
        })?;
        let Some(root) = root else {
            debug!(round = proof.round, "no relayed root yet");
            return Ok(false);
        };
        Ok(verify_merkle_proof(&proof.hash, &proof.merkle_proof, &root))
    }
}

impl std::fmt::Debug for RelayProofVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayProofVerifier").finish_non_exhaustive()
    }
}
