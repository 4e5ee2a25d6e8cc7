//! Request → round wait → Merkle-verified retrieval, against scripted peers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use synth_attestation::{
    AttestationClient, AttestationHelperError, AttestationNetwork, AttestationProof,
    AttestationRequest, AttestationResponseBody, AttestationType, AttestedResponse,
    ConfirmedBlockHeightExistsResponse, PaymentResponse, ProofVerifier,
};
use synth_chain::{
    BlockId, ChainBlock, ChainError, ChainTransaction, IndexerClient, TxInputOutput, TxStatus,
};
use synth_crypto::{keccak256, verify_merkle_proof, MerkleTree};
use synth_types::{Bytes32, PaymentReference, SourceId, Timestamp, UbaAmount};
use synth_utils::PollSettings;

const TX: &str = "aa00000000000000000000000000000000000000000000000000000000000001";

struct Chain {
    height: u64,
}

#[async_trait]
impl IndexerClient for Chain {
    fn source_id(&self) -> SourceId {
        SourceId::Btc
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ChainError> {
        Ok((hash == TX).then(|| ChainTransaction {
            hash: TX.into(),
            inputs: vec![TxInputOutput::new("minter", 20_500u128)],
            outputs: vec![
                TxInputOutput::new("change", 100u128),
                TxInputOutput::new("agent", 20_400u128),
            ],
            reference: Some(PaymentReference::minting(42)),
            status: TxStatus::Success,
        }))
    }

    async fn get_transaction_block(&self, hash: &str) -> Result<Option<BlockId>, ChainError> {
        Ok((hash == TX).then(|| BlockId {
            hash: "b90".into(),
            number: 90,
        }))
    }

    async fn get_block(&self, _hash: &str) -> Result<Option<ChainBlock>, ChainError> {
        Ok(None)
    }

    async fn get_block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError> {
        Ok((number <= self.height).then(|| ChainBlock {
            hash: format!("b{number}"),
            number,
            timestamp: Timestamp::new(1_000 + number * 10),
            transactions: Vec::new(),
        }))
    }

    async fn get_block_height(&self) -> Result<u64, ChainError> {
        Ok(self.height)
    }

    async fn get_transactions_by_reference(
        &self,
        _reference: &PaymentReference,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        Ok(Vec::new())
    }

    async fn get_transactions_within_block_range(
        &self,
        _from: u64,
        _to: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        Ok(Vec::new())
    }

    async fn get_transactions_in_block(
        &self,
        _number: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        Ok(Vec::new())
    }
}

/// Every submission lands in round 5; the round finalizes after `finalize_after` status polls.
#[derive(Default)]
struct Network {
    submitted: Mutex<Vec<AttestationRequest>>,
    status_polls: AtomicU64,
    finalize_after: u64,
    decline: bool,
    roots: Mutex<HashMap<u64, Bytes32>>,
}

fn respond(request: &AttestationRequest) -> AttestationResponseBody {
    match request {
        AttestationRequest::Payment(r) => AttestationResponseBody::Payment(PaymentResponse {
            block_number: r.block_number,
            block_timestamp: 1_900,
            transaction_hash: r.tx_id,
            in_utxo: r.in_utxo,
            utxo: r.utxo,
            source_address_hash: keccak256(b"minter"),
            receiving_address_hash: keccak256(b"agent"),
            spent_amount: UbaAmount::new(20_500),
            received_amount: UbaAmount::new(20_400),
            payment_reference: Some(PaymentReference::minting(42)),
            one_to_one: false,
            status: 0,
        }),
        AttestationRequest::ConfirmedBlockHeightExists(r) => {
            AttestationResponseBody::ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsResponse {
                block_number: r.block_number,
                block_timestamp: 2_000,
                number_of_confirmations: 6,
                average_block_production_time_ms: 600_000,
                lowest_query_window_block_number: 10,
                lowest_query_window_block_timestamp: 1_100,
            })
        }
        other => panic!("unexpected request {other:?}"),
    }
}

impl Network {
    fn round_entries(&self) -> Vec<AttestedResponse> {
        let mut entries: Vec<AttestedResponse> = self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .map(|request| AttestedResponse {
                request: request.clone(),
                response: respond(request),
                hash: keccak256(request.encode().as_bytes()),
            })
            .collect();
        // Unrelated responses from other requesters share the round.
        for i in 0..3u8 {
            let filler = AttestationRequest::ConfirmedBlockHeightExists(
                synth_attestation::ConfirmedBlockHeightExistsRequest {
                    source_id: SourceId::Doge,
                    block_number: u64::from(i),
                    query_window: 1,
                    integrity_code: Bytes32::ZERO,
                },
            );
            entries.push(AttestedResponse {
                response: respond(&filler),
                hash: keccak256(&[i]),
                request: filler,
            });
        }
        entries
    }
}

#[async_trait]
impl AttestationNetwork for Network {
    async fn latest_finalized_round(&self) -> Result<Option<u64>, AttestationHelperError> {
        let polls = self.status_polls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Some(if polls > self.finalize_after { 5 } else { 4 }))
    }

    async fn submit_request(&self, data: &str) -> Result<Option<u64>, AttestationHelperError> {
        if self.decline {
            return Ok(None);
        }
        let request = AttestationRequest::decode(data)?;
        self.submitted.lock().unwrap().push(request);
        Ok(Some(5))
    }

    async fn responses_for_round(
        &self,
        round: u64,
    ) -> Result<Vec<AttestedResponse>, AttestationHelperError> {
        let entries = self.round_entries();
        if let Some(root) = MerkleTree::new(entries.iter().map(|e| e.hash)).root() {
            self.roots.lock().unwrap().insert(round, root);
        }
        Ok(entries)
    }
}

struct RootVerifier {
    network: Arc<Network>,
    accept: bool,
}

#[async_trait]
impl ProofVerifier for RootVerifier {
    async fn verify(&self, proof: &AttestationProof) -> Result<bool, AttestationHelperError> {
        let root = self.network.roots.lock().unwrap().get(&proof.round).copied();
        Ok(self.accept
            && root.is_some_and(|root| verify_merkle_proof(&proof.hash, &proof.merkle_proof, &root)))
    }
}

fn client(network: Arc<Network>, accept: bool) -> AttestationClient {
    AttestationClient::new(
        network.clone() as Arc<dyn AttestationNetwork>,
        Arc::new(RootVerifier { network, accept }),
        Arc::new(Chain { height: 100 }),
    )
    .with_poll_settings(PollSettings::new(
        Duration::from_millis(2),
        Duration::from_millis(300),
    ))
}

fn payment_request() -> AttestationRequest {
    AttestationRequest::Payment(synth_attestation::PaymentRequest {
        source_id: SourceId::Btc,
        tx_id: Bytes32::from_hex(TX).unwrap(),
        block_number: 90,
        in_utxo: 0,
        utxo: 1,
        integrity_code: Bytes32::ZERO,
    })
}

#[tokio::test]
async fn test_prove_payment_verifies_merkle_path() {
    let network = Arc::new(Network {
        finalize_after: 2,
        ..Default::default()
    });
    let client = client(network.clone(), true);
    let proof = client
        .prove_payment(TX, None, Some("agent"))
        .await
        .unwrap();
    assert_eq!(proof.attestation_type(), AttestationType::Payment);
    assert_eq!(proof.round, 5);
    assert_eq!(proof.as_payment().unwrap().utxo, 1);
    assert!(!proof.merkle_proof.is_empty());
    assert!(network.status_polls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_unfinalized_round_is_pending() {
    let network = Arc::new(Network {
        finalize_after: 1_000,
        ..Default::default()
    });
    let client = client(network, true);
    let id = client
        .request_payment_proof(TX, None, Some("agent"))
        .await
        .unwrap()
        .unwrap();
    let result = client.obtain_proof(id.round, &id.data).await.unwrap();
    assert!(!result.finalized);
    assert!(result.result.is_none());
}

#[tokio::test]
async fn test_rejected_verification_is_not_an_error() {
    let network = Arc::new(Network::default());
    let client = client(network, false);
    let id = client
        .request_payment_proof(TX, None, Some("agent"))
        .await
        .unwrap()
        .unwrap();
    let result = client.obtain_proof(id.round, &id.data).await.unwrap();
    assert!(!result.finalized);
}

#[tokio::test]
async fn test_unknown_request_is_pending() {
    let network = Arc::new(Network::default());
    let client = client(network, true);
    let never_submitted = payment_request().encode();
    let result = client.obtain_proof(5, &never_submitted).await.unwrap();
    assert!(!result.finalized);
}

#[tokio::test]
async fn test_declined_submission_is_not_proved() {
    let network = Arc::new(Network {
        decline: true,
        ..Default::default()
    });
    let client = client(network, true);
    let err = client.prove_payment(TX, None, None).await.unwrap_err();
    assert!(matches!(err, AttestationHelperError::NotProved(AttestationType::Payment)));
}

#[tokio::test]
async fn test_receiver_not_in_outputs() {
    let client = client(Arc::new(Network::default()), true);
    let err = client
        .request_payment_proof(TX, None, Some("stranger"))
        .await
        .unwrap_err();
    assert!(matches!(err, AttestationHelperError::AddressNotFound(_)));
}

#[tokio::test]
async fn test_missing_transaction() {
    let client = client(Arc::new(Network::default()), true);
    let err = client
        .request_payment_proof("ff", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AttestationHelperError::TransactionNotFound(_)));
}

#[tokio::test]
async fn test_overflow_block_must_exist() {
    let client = client(Arc::new(Network::default()), true);
    // Block 100 (the tip) has timestamp 2_000; nothing exceeds 5_000 yet.
    let err = client
        .request_referenced_payment_nonexistence_proof(
            "agent",
            PaymentReference::minting(42),
            UbaAmount::new(20_500),
            10,
            50,
            Timestamp::new(5_000),
        )
        .await
        .unwrap_err();
    match err {
        AttestationHelperError::OverflowBlockNotFound { block, height, .. } => {
            assert_eq!(block, 51);
            assert_eq!(height, 100);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_block_height_proof_uses_finalized_height() {
    let network = Arc::new(Network::default());
    let client = client(network, true);
    let proof = client
        .prove_confirmed_block_height_exists(86_400)
        .await
        .unwrap();
    let body = proof.as_confirmed_block_height().unwrap();
    assert_eq!(body.block_number, 100 - SourceId::Btc.finalization_blocks());
    assert_eq!(body.lowest_query_window_block_number, 10);
}

#[tokio::test]
async fn test_round_wait_times_out() {
    let network = Arc::new(Network {
        finalize_after: u64::MAX,
        ..Default::default()
    });
    let client = client(network, true).with_poll_settings(PollSettings::new(
        Duration::from_millis(5),
        Duration::from_millis(30),
    ));
    let err = client.wait_for_round_finalization(5).await.unwrap_err();
    assert!(matches!(err, AttestationHelperError::TimedOut(_)));
    assert!(err.is_transient());
}
