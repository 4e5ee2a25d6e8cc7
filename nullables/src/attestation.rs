//! Nullable attestation network.
//!
//! Requests are attested against a [`NullIndexer`]: each submission lands in
//! the current round and, once the round is finalized, the round's responses
//! are derived from the chain facts. A request the chain cannot support
//! (unknown transaction, a payment that does exist) is left out of the round,
//! the way a real network would fail to reach consensus on it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use synth_attestation::{
    address_hash, transaction_id_bytes, AttestationHelperError, AttestationNetwork,
    AttestationProof, AttestationRequest, AttestationResponseBody, AttestedResponse,
    BalanceDecreasingTransactionRequest, BalanceDecreasingTransactionResponse,
    ConfirmedBlockHeightExistsRequest, ConfirmedBlockHeightExistsResponse, PaymentRequest,
    PaymentResponse, ProofVerifier, ReferencedPaymentNonexistenceRequest,
    ReferencedPaymentNonexistenceResponse,
};
use synth_chain::{ChainTransaction, TxStatus};
use synth_contracts::{ContractError, MerkleRootRelay};
use synth_crypto::{keccak256, MerkleTree};
use synth_types::{Bytes32, UbaAmount};

use crate::chain::NullIndexer;

struct RoundState {
    current: u64,
    finalized: Option<u64>,
    submissions: BTreeMap<u64, Vec<AttestationRequest>>,
}

pub struct NullAttestationNetwork {
    chain: Arc<NullIndexer>,
    auto_finalize: AtomicBool,
    declining: AtomicBool,
    rounds: Mutex<RoundState>,
}

impl NullAttestationNetwork {
    /// Every submission is finalized immediately unless
    /// [`set_auto_finalize`](Self::set_auto_finalize) turns that off.
    pub fn new(chain: Arc<NullIndexer>) -> Self {
        Self {
            chain,
            auto_finalize: AtomicBool::new(true),
            declining: AtomicBool::new(false),
            rounds: Mutex::new(RoundState {
                current: 1,
                finalized: None,
                submissions: BTreeMap::new(),
            }),
        }
    }

    pub fn set_auto_finalize(&self, enabled: bool) {
        self.auto_finalize.store(enabled, Ordering::SeqCst);
    }

    /// Make the network refuse new submissions.
    pub fn set_declining(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }

    /// Close the current round and finalize everything submitted so far.
    pub fn finalize_current_round(&self) -> u64 {
        let mut rounds = self.rounds.lock().unwrap();
        let round = rounds.current;
        rounds.finalized = Some(round);
        rounds.current += 1;
        round
    }

    pub fn submission_count(&self) -> usize {
        self.rounds
            .lock()
            .unwrap()
            .submissions
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Submitted requests, oldest first.
    pub fn submissions(&self) -> Vec<AttestationRequest> {
        self.rounds
            .lock()
            .unwrap()
            .submissions
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    fn attest(&self, request: &AttestationRequest) -> Option<AttestationResponseBody> {
        match request {
            AttestationRequest::Payment(r) => self.attest_payment(r),
            AttestationRequest::BalanceDecreasingTransaction(r) => self.attest_balance_decreasing(r),
            AttestationRequest::ConfirmedBlockHeightExists(r) => self.attest_block_height(r),
            AttestationRequest::ReferencedPaymentNonexistence(r) => self.attest_nonexistence(r),
        }
    }

    fn find_transaction(&self, tx_id: &Bytes32) -> Option<(ChainTransaction, u64)> {
        self.chain
            .transactions()
            .into_iter()
            .find(|(tx, _)| transaction_id_bytes(&tx.hash) == *tx_id)
    }

    fn attest_payment(&self, request: &PaymentRequest) -> Option<AttestationResponseBody> {
        let (tx, number) = self.find_transaction(&request.tx_id)?;
        let source = tx.inputs.get(usize::from(request.in_utxo))?.address.clone();
        let receiver = tx.outputs.get(usize::from(request.utxo))?.address.clone();
        let block = self.chain.block(number)?;
        Some(AttestationResponseBody::Payment(PaymentResponse {
            block_number: number,
            block_timestamp: block.timestamp.as_secs(),
            transaction_hash: request.tx_id,
            in_utxo: request.in_utxo,
            utxo: request.utxo,
            source_address_hash: address_hash(&source),
            receiving_address_hash: address_hash(&receiver),
            spent_amount: tx.spent_by(&source).saturating_sub(tx.received_by(&source)),
            received_amount: tx.received_by(&receiver).saturating_sub(tx.spent_by(&receiver)),
            payment_reference: tx.reference,
            one_to_one: tx.inputs.len() == 1 && tx.outputs.len() == 1,
            status: tx.status.code(),
        }))
    }

    fn attest_balance_decreasing(
        &self,
        request: &BalanceDecreasingTransactionRequest,
    ) -> Option<AttestationResponseBody> {
        let (tx, number) = self.find_transaction(&request.tx_id)?;
        let (index, source) = tx
            .inputs
            .iter()
            .enumerate()
            .find(|(_, io)| address_hash(&io.address) == request.source_address_hash)?;
        let block = self.chain.block(number)?;
        Some(AttestationResponseBody::BalanceDecreasingTransaction(
            BalanceDecreasingTransactionResponse {
                block_number: number,
                block_timestamp: block.timestamp.as_secs(),
                transaction_hash: request.tx_id,
                in_utxo: u16::try_from(index).ok()?,
                source_address_hash: request.source_address_hash,
                spent_amount: tx
                    .spent_by(&source.address)
                    .saturating_sub(tx.received_by(&source.address)),
                payment_reference: tx.reference,
            },
        ))
    }

    fn attest_block_height(
        &self,
        request: &ConfirmedBlockHeightExistsRequest,
    ) -> Option<AttestationResponseBody> {
        let block = self.chain.block(request.block_number)?;
        let window_start = block.timestamp.as_secs().saturating_sub(request.query_window);
        let lowest = (0..=request.block_number)
            .filter_map(|n| self.chain.block(n))
            .find(|b| b.timestamp.as_secs() >= window_start)?;
        Some(AttestationResponseBody::ConfirmedBlockHeightExists(
            ConfirmedBlockHeightExistsResponse {
                block_number: block.number,
                block_timestamp: block.timestamp.as_secs(),
                number_of_confirmations: self.chain.height().saturating_sub(block.number),
                average_block_production_time_ms: 0,
                lowest_query_window_block_number: lowest.number,
                lowest_query_window_block_timestamp: lowest.timestamp.as_secs(),
            },
        ))
    }

    fn attest_nonexistence(
        &self,
        request: &ReferencedPaymentNonexistenceRequest,
    ) -> Option<AttestationResponseBody> {
        let paid = self.chain.transactions().into_iter().any(|(tx, number)| {
            number >= request.minimal_block_number
                && number <= request.deadline_block_number
                && tx.has_reference(&request.payment_reference)
                && tx.status != TxStatus::Failed
                && tx
                    .outputs
                    .iter()
                    .filter(|io| address_hash(&io.address) == request.destination_address_hash)
                    .map(|io| io.amount)
                    .sum::<UbaAmount>()
                    >= request.amount
        });
        if paid {
            return None;
        }
        let lower_bound = self.chain.block(request.minimal_block_number)?;
        let overflow = ((request.deadline_block_number + 1)..=self.chain.height())
            .filter_map(|n| self.chain.block(n))
            .find(|b| b.timestamp.as_secs() > request.deadline_timestamp)?;
        Some(AttestationResponseBody::ReferencedPaymentNonexistence(
            ReferencedPaymentNonexistenceResponse {
                deadline_block_number: request.deadline_block_number,
                deadline_timestamp: request.deadline_timestamp,
                destination_address_hash: request.destination_address_hash,
                payment_reference: request.payment_reference,
                amount: request.amount,
                lower_bound_block_number: lower_bound.number,
                lower_bound_block_timestamp: lower_bound.timestamp.as_secs(),
                first_overflow_block_number: overflow.number,
                first_overflow_block_timestamp: overflow.timestamp.as_secs(),
            },
        ))
    }

    fn round_responses(&self, round: u64) -> Vec<AttestedResponse> {
        let requests = self
            .rounds
            .lock()
            .unwrap()
            .submissions
            .get(&round)
            .cloned()
            .unwrap_or_default();
        requests
            .into_iter()
            .filter_map(|request| {
                let response = self.attest(&request)?;
                let hash = keccak256(request.encode().as_bytes());
                Some(AttestedResponse {
                    request,
                    response,
                    hash,
                })
            })
            .collect()
    }

    /// Merkle root of a finalized round's responses.
    pub fn root(&self, round: u64) -> Option<Bytes32> {
        let finalized = self.rounds.lock().unwrap().finalized;
        if !finalized.is_some_and(|f| round <= f) {
            return None;
        }
        MerkleTree::new(self.round_responses(round).iter().map(|r| r.hash)).root()
    }
}

#[async_trait]
impl AttestationNetwork for NullAttestationNetwork {
    async fn latest_finalized_round(&self) -> Result<Option<u64>, AttestationHelperError> {
        Ok(self.rounds.lock().unwrap().finalized)
    }

    async fn submit_request(&self, data: &str) -> Result<Option<u64>, AttestationHelperError> {
        if self.declining.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let request = AttestationRequest::decode(data)?;
        let round = {
            let mut rounds = self.rounds.lock().unwrap();
            let round = rounds.current;
            rounds.submissions.entry(round).or_default().push(request);
            round
        };
        if self.auto_finalize.load(Ordering::SeqCst) {
            self.finalize_current_round();
        }
        Ok(Some(round))
    }

    async fn responses_for_round(
        &self,
        round: u64,
    ) -> Result<Vec<AttestedResponse>, AttestationHelperError> {
        Ok(self.round_responses(round))
    }
}

#[async_trait]
impl MerkleRootRelay for NullAttestationNetwork {
    async fn merkle_root(&self, round: u64) -> Result<Option<Bytes32>, ContractError> {
        Ok(self.root(round))
    }
}

/// A verifier that accepts or rejects every proof.
#[derive(Debug)]
pub struct NullVerifier {
    accept: AtomicBool,
}

impl NullVerifier {
    pub fn new(accept: bool) -> Self {
        Self {
            accept: AtomicBool::new(accept),
        }
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }
}

impl Default for NullVerifier {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ProofVerifier for NullVerifier {
    async fn verify(&self, _proof: &AttestationProof) -> Result<bool, AttestationHelperError> {
        Ok(self.accept.load(Ordering::SeqCst))
    }
}
