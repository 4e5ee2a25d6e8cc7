//! Seams to the attestation network and the on-chain proof verifier.

use async_trait::async_trait;

use crate::error::AttestationHelperError;
use crate::response::{AttestationProof, AttestedResponse};

/// The attestation network's proof API.
#[async_trait]
pub trait AttestationNetwork: Send + Sync {
    /// Highest round whose responses are available, if the network reports one.
    async fn latest_finalized_round(&self) -> Result<Option<u64>, AttestationHelperError>;

    async fn round_finalized(&self, round: u64) -> Result<bool, AttestationHelperError> {
        Ok(self
            .latest_finalized_round()
            .await?
            .is_some_and(|latest| round <= latest))
    }

    /// Submit encoded request data. `None` means the network declined it.
    async fn submit_request(&self, data: &str) -> Result<Option<u64>, AttestationHelperError>;

    /// Every attested response of a finalized round.
    async fn responses_for_round(
        &self,
        round: u64,
    ) -> Result<Vec<AttestedResponse>, AttestationHelperError>;
}

/// Type-specific proof verification, as performed by the verification contract.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    async fn verify(&self, proof: &AttestationProof) -> Result<bool, AttestationHelperError>;
}
