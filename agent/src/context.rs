//! Shared, read-only handles the actors work with.

use std::sync::Arc;

use synth_attestation::{type_of, AttestationClient, AttestationProof, AttestationRequestId};
use synth_chain::IndexerClient;
use synth_contracts::AssetManager;
use synth_store::ProofRequest;
use synth_types::{Address, Clock, SourceId, Timestamp};
use tracing::debug;

use crate::metrics::BotMetrics;
use crate::AgentError;

/// Clients and settings shared by every actor of one process.
#[derive(Clone)]
pub struct AgentContext {
    pub chain: Arc<dyn IndexerClient>,
    pub attestation: AttestationClient,
    pub asset_manager: Arc<dyn AssetManager>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<BotMetrics>,
    /// Query window of the proofs that show a minting deadline is out of reach.
    pub query_window_seconds: u64,
    pub confirmation_grace_seconds: u64,
}

/// Who the agent bot acts for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentIdentity {
    pub vault: Address,
    /// Signs contract calls.
    pub owner: Address,
    pub underlying_address: String,
}

/// Where a stored proof request stands.
#[derive(Debug)]
pub enum PendingProof {
    /// The round is not finalized yet.
    Waiting,
    /// A later round is final and the request never got a verified proof.
    Failed,
    Proved(Box<AttestationProof>),
}

impl AgentContext {
    pub fn source_id(&self) -> SourceId {
        self.chain.source_id()
    }

    /// Height and timestamp of the latest underlying block.
    pub async fn underlying_tip(&self) -> Result<Option<(u64, Timestamp)>, AgentError> {
        let height = self.chain.get_block_height().await?;
        Ok(self
            .chain
            .get_block_at(height)
            .await?
            .map(|block| (block.number, block.timestamp)))
    }

    /// Whether the underlying chain is past both the block and the time limit.
    pub async fn deadline_passed(
        &self,
        last_block: u64,
        last_timestamp: Timestamp,
    ) -> Result<bool, AgentError> {
        Ok(self
            .underlying_tip()
            .await?
            .is_some_and(|(number, timestamp)| number > last_block && timestamp > last_timestamp))
    }

    /// Whether `tx_hash` is in a block with enough confirmations.
    pub async fn is_finalized(&self, tx_hash: &str) -> Result<bool, AgentError> {
        let Some(block) = self.chain.get_transaction_block(tx_hash).await? else {
            return Ok(false);
        };
        let height = self.chain.get_block_height().await?;
        let confirmations = height.saturating_sub(block.number);
        debug!(tx = tx_hash, confirmations, "transaction confirmations");
        Ok(confirmations >= self.chain.finalization_blocks())
    }

    pub fn proof_requested(&self, request: &AttestationRequestId) {
        if let Ok(kind) = type_of(&request.data) {
            self.metrics
                .proofs_requested
                .with_label_values(&[kind.name()])
                .inc();
        }
    }

    /// Look up a stored request once.
    pub async fn obtain(&self, request: &ProofRequest) -> Result<PendingProof, AgentError> {
        let result = self
            .attestation
            .obtain_proof(request.round, &request.data)
            .await?;
        if let Some(proof) = result.into_proof() {
            self.metrics
                .proofs_obtained
                .with_label_values(&[proof.attestation_type().name()])
                .inc();
            return Ok(PendingProof::Proved(Box::new(proof)));
        }
        if self.attestation.round_finalized(request.round + 1).await? {
            return Ok(PendingProof::Failed);
        }
        Ok(PendingProof::Waiting)
    }

    /// Whether a ConfirmedBlockHeightExists `proof` shows the whole query
    /// window lies after `(last_block, last_timestamp)`.
    pub fn window_passed(
        &self,
        proof: &AttestationProof,
        last_block: u64,
        last_timestamp: Timestamp,
    ) -> bool {
        proof.as_confirmed_block_height().is_some_and(|window| {
            window.lowest_query_window_block_number > last_block
                && window.lowest_query_window_block_timestamp > last_timestamp.as_secs()
        })
    }
}

pub fn stored_request(request: &AttestationRequestId) -> ProofRequest {
    ProofRequest::new(request.round, request.data.clone())
}
