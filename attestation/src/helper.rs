//! Builds attestation requests from chain facts, waits for rounds and
//! retrieves Merkle-verified proofs.

use std::sync::Arc;

use synth_chain::{IndexerClient, TxInputOutput};
use synth_crypto::MerkleTree;
use synth_types::{Bytes32, PaymentReference, SourceId, Timestamp, UbaAmount};
use synth_utils::{poll_until, PollError, PollSettings};
use tracing::{debug, info, warn};

use crate::error::AttestationHelperError;
use crate::network::{AttestationNetwork, ProofVerifier};
use crate::request::{
    address_hash, transaction_id_bytes, AttestationRequest, AttestationRequestId, AttestationType,
    BalanceDecreasingTransactionRequest, ConfirmedBlockHeightExistsRequest, PaymentRequest,
    ReferencedPaymentNonexistenceRequest,
};
use crate::response::{AttestationProof, ProofResult};

/// Position of `address` in `ios`, or `default` when no address is given.
fn find_address_index(
    ios: &[TxInputOutput],
    address: Option<&str>,
    default: u16,
) -> Result<u16, AttestationHelperError> {
    let Some(address) = address else {
        return Ok(default);
    };
    let index = ios
        .iter()
        .position(|io| io.address == address)
        .ok_or_else(|| AttestationHelperError::AddressNotFound(address.to_string()))?;
    u16::try_from(index)
        .map_err(|_| AttestationHelperError::Decode(format!("input/output index {index} too large")))
}

/// Attestation client for one source chain.
#[derive(Clone)]
pub struct AttestationClient {
    network: Arc<dyn AttestationNetwork>,
    verifier: Arc<dyn ProofVerifier>,
    chain: Arc<dyn IndexerClient>,
    poll: PollSettings,
}

impl AttestationClient {
    pub fn new(
        network: Arc<dyn AttestationNetwork>,
        verifier: Arc<dyn ProofVerifier>,
        chain: Arc<dyn IndexerClient>,
    ) -> Self {
        Self {
            network,
            verifier,
            chain,
            poll: PollSettings::default(),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn source_id(&self) -> SourceId {
        self.chain.source_id()
    }

    pub fn chain(&self) -> &Arc<dyn IndexerClient> {
        &self.chain
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    pub async fn round_finalized(&self, round: u64) -> Result<bool, AttestationHelperError> {
        self.network.round_finalized(round).await
    }

    /// Sleep-then-recheck until `round` is finalized or the poll timeout passes.
    pub async fn wait_for_round_finalization(&self, round: u64) -> Result<(), AttestationHelperError> {
        debug!(round, "waiting for round finalization");
        let network = &self.network;
        let outcome = poll_until(self.poll, || async move {
            network
                .round_finalized(round)
                .await
                .map(|done| done.then_some(()))
        })
        .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(PollError::TimedOut(t)) => {
                warn!(round, waited = ?t.waited, "round finalization wait timed out");
                Err(AttestationHelperError::TimedOut(t))
            }
            Err(PollError::Check(e)) => Err(e),
        }
    }

    /// Submit a request; `None` when the network declines it.
    pub async fn submit(
        &self,
        request: &AttestationRequest,
    ) -> Result<Option<AttestationRequestId>, AttestationHelperError> {
        let data = request.encode();
        let round = self.network.submit_request(&data).await?;
        match round {
            Some(round) => {
                debug!(round, kind = %request.attestation_type(), "attestation request submitted");
                Ok(Some(AttestationRequestId { round, data }))
            }
            None => {
                warn!(kind = %request.attestation_type(), "attestation request declined");
                Ok(None)
            }
        }
    }

    async fn transaction_and_block(
        &self,
        tx_hash: &str,
    ) -> Result<(synth_chain::ChainTransaction, u64), AttestationHelperError> {
        let transaction = self
            .chain
            .get_transaction(tx_hash)
            .await
            .map_err(|e| AttestationHelperError::indexer("get_transaction", tx_hash, e))?;
        let block = self
            .chain
            .get_transaction_block(tx_hash)
            .await
            .map_err(|e| AttestationHelperError::indexer("get_transaction_block", tx_hash, e))?;
        match (transaction, block) {
            (Some(transaction), Some(block)) => Ok((transaction, block.number)),
            _ => Err(AttestationHelperError::TransactionNotFound(tx_hash.to_string())),
        }
    }

    pub async fn request_payment_proof(
        &self,
        tx_hash: &str,
        source_address: Option<&str>,
        receiving_address: Option<&str>,
    ) -> Result<Option<AttestationRequestId>, AttestationHelperError> {
        info!(
            tx = tx_hash,
            source = source_address.unwrap_or("-"),
            receiver = receiving_address.unwrap_or("-"),
            "requesting payment proof"
        );
        let (transaction, block_number) = self.transaction_and_block(tx_hash).await?;
        let request = AttestationRequest::Payment(PaymentRequest {
            source_id: self.source_id(),
            tx_id: transaction_id_bytes(tx_hash),
            block_number,
            in_utxo: find_address_index(&transaction.inputs, source_address, 0)?,
            utxo: find_address_index(&transaction.outputs, receiving_address, 0)?,
            integrity_code: Bytes32::ZERO,
        });
        self.submit(&request).await
    }

    pub async fn request_balance_decreasing_transaction_proof(
        &self,
        tx_hash: &str,
        source_address: &str,
    ) -> Result<Option<AttestationRequestId>, AttestationHelperError> {
        info!(tx = tx_hash, source = source_address, "requesting balance decreasing transaction proof");
        let (_, block_number) = self.transaction_and_block(tx_hash).await?;
        let request = AttestationRequest::BalanceDecreasingTransaction(
            BalanceDecreasingTransactionRequest {
                source_id: self.source_id(),
                tx_id: transaction_id_bytes(tx_hash),
                block_number,
                source_address_hash: address_hash(source_address),
                integrity_code: Bytes32::ZERO,
            },
        );
        self.submit(&request).await
    }

    /// Request proof that no payment with `reference` of at least `amount`
    /// reached `destination` in `[start_block, end_block]` / before `end_timestamp`.
    ///
    /// Fails with [`AttestationHelperError::OverflowBlockNotFound`] until the
    /// chain has a block past both deadlines.
    pub async fn request_referenced_payment_nonexistence_proof(
        &self,
        destination: &str,
        reference: PaymentReference,
        amount: UbaAmount,
        start_block: u64,
        end_block: u64,
        end_timestamp: Timestamp,
    ) -> Result<Option<AttestationRequestId>, AttestationHelperError> {
        info!(
            destination,
            %reference,
            %amount,
            start_block,
            end_block,
            end_timestamp = end_timestamp.as_secs(),
            "requesting referenced payment nonexistence proof"
        );
        let mut number = end_block + 1;
        loop {
            let block = self
                .chain
                .get_block_at(number)
                .await
                .map_err(|e| AttestationHelperError::indexer("get_block_at", number.to_string(), e))?;
            match block {
                Some(block) if block.timestamp > end_timestamp => break,
                Some(_) => number += 1,
                None => {
                    let height = self.chain.get_block_height().await.map_err(|e| {
                        AttestationHelperError::indexer("get_block_height", "", e)
                    })?;
                    return Err(AttestationHelperError::OverflowBlockNotFound {
                        block: end_block + 1,
                        deadline_timestamp: end_timestamp.as_secs(),
                        height,
                    });
                }
            }
        }
        debug!(overflow_block = number, "found overflow block");
        let request = AttestationRequest::ReferencedPaymentNonexistence(
            ReferencedPaymentNonexistenceRequest {
                source_id: self.source_id(),
                minimal_block_number: start_block,
                deadline_block_number: end_block,
                deadline_timestamp: end_timestamp.as_secs(),
                destination_address_hash: address_hash(destination),
                amount,
                payment_reference: reference,
                integrity_code: Bytes32::ZERO,
            },
        );
        self.submit(&request).await
    }

    pub async fn request_confirmed_block_height_exists_proof(
        &self,
        query_window: u64,
    ) -> Result<Option<AttestationRequestId>, AttestationHelperError> {
        info!(query_window, "requesting confirmed block height exists proof");
        let height = self
            .chain
            .get_block_height()
            .await
            .map_err(|e| AttestationHelperError::indexer("get_block_height", "", e))?;
        let tip = self
            .chain
            .get_block_at(height)
            .await
            .map_err(|e| AttestationHelperError::indexer("get_block_at", height.to_string(), e))?;
        if tip.is_none() {
            return Err(AttestationHelperError::FinalizationBlockNotFound(height));
        }
        let request =
            AttestationRequest::ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsRequest {
                source_id: self.source_id(),
                block_number: height.saturating_sub(self.chain.finalization_blocks()),
                query_window,
                integrity_code: Bytes32::ZERO,
            });
        self.submit(&request).await
    }

    /// Retrieve and verify the proof for request `data` submitted in `round`.
    pub async fn obtain_proof(
        &self,
        round: u64,
        data: &str,
    ) -> Result<ProofResult, AttestationHelperError> {
        if !self.network.round_finalized(round).await? {
            return Ok(ProofResult::pending());
        }
        let responses = self.network.responses_for_round(round).await?;
        let Some(matched) = responses
            .iter()
            .find(|r| r.request.encode().eq_ignore_ascii_case(data))
        else {
            debug!(round, "request not found in round");
            return Ok(ProofResult::pending());
        };

        let tree = MerkleTree::new(responses.iter().map(|r| r.hash));
        let Ok(merkle_proof) = tree.proof_for(&matched.hash) else {
            return Ok(ProofResult::pending());
        };
        let proof = AttestationProof {
            round,
            hash: matched.hash,
            merkle_proof,
            request: matched.request.clone(),
            response: matched.response.clone(),
        };
        if !self.verifier.verify(&proof).await? {
            warn!(round, kind = %proof.attestation_type(), "proof rejected by verifier");
            return Ok(ProofResult::pending());
        }
        Ok(ProofResult::proved(proof))
    }

    /// Wait for a submitted request and obtain its proof.
    async fn finish(
        &self,
        kind: AttestationType,
        request: Option<AttestationRequestId>,
    ) -> Result<AttestationProof, AttestationHelperError> {
        let request = request.ok_or(AttestationHelperError::NotProved(kind))?;
        self.wait_for_round_finalization(request.round).await?;
        self.obtain_proof(request.round, &request.data)
            .await?
            .into_proof()
            .ok_or(AttestationHelperError::NotProved(kind))
    }

    pub async fn prove_payment(
        &self,
        tx_hash: &str,
        source_address: Option<&str>,
        receiving_address: Option<&str>,
    ) -> Result<AttestationProof, AttestationHelperError> {
        let request = self
            .request_payment_proof(tx_hash, source_address, receiving_address)
            .await?;
        self.finish(AttestationType::Payment, request).await
    }

    pub async fn prove_balance_decreasing_transaction(
        &self,
        tx_hash: &str,
        source_address: &str,
    ) -> Result<AttestationProof, AttestationHelperError> {
        let request = self
            .request_balance_decreasing_transaction_proof(tx_hash, source_address)
            .await?;
        self.finish(AttestationType::BalanceDecreasingTransaction, request)
            .await
    }

    pub async fn prove_referenced_payment_nonexistence(
        &self,
        destination: &str,
        reference: PaymentReference,
        amount: UbaAmount,
        start_block: u64,
        end_block: u64,
        end_timestamp: Timestamp,
    ) -> Result<AttestationProof, AttestationHelperError> {
        let request = self
            .request_referenced_payment_nonexistence_proof(
                destination,
                reference,
                amount,
                start_block,
                end_block,
                end_timestamp,
            )
            .await?;
        self.finish(AttestationType::ReferencedPaymentNonexistence, request)
            .await
    }

    pub async fn prove_confirmed_block_height_exists(
        &self,
        query_window: u64,
    ) -> Result<AttestationProof, AttestationHelperError> {
        let request = self
            .request_confirmed_block_height_exists_proof(query_window)
            .await?;
        self.finish(AttestationType::ConfirmedBlockHeightExists, request)
            .await
    }
}

impl std::fmt::Debug for AttestationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationClient")
            .field("source", &self.source_id())
            .field("poll", &self.poll)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_address_index() {
        let ios = vec![
            TxInputOutput::new("change", 1u128),
            TxInputOutput::new("agent", 2u128),
        ];
        assert_eq!(find_address_index(&ios, None, 0).unwrap(), 0);
        assert_eq!(find_address_index(&ios, Some("agent"), 0).unwrap(), 1);
        assert!(matches!(
            find_address_index(&ios, Some("nobody"), 0),
            Err(AttestationHelperError::AddressNotFound(a)) if a == "nobody"
        ));
    }
}
