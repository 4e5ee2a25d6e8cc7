//! Attested responses and the proofs built from them.

use serde::{Deserialize, Serialize};
use synth_types::{Bytes32, PaymentReference, SourceId, UbaAmount};

use crate::request::{AttestationRequest, AttestationType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: Bytes32,
    pub in_utxo: u16,
    pub utxo: u16,
    pub source_address_hash: Bytes32,
    pub receiving_address_hash: Bytes32,
    pub spent_amount: UbaAmount,
    pub received_amount: UbaAmount,
    #[serde(default)]
    pub payment_reference: Option<PaymentReference>,
    #[serde(default)]
    pub one_to_one: bool,
    /// 0 success, 1 sender failure, 2 receiver failure (blocked).
    #[serde(default)]
    pub status: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDecreasingTransactionResponse {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: Bytes32,
    pub in_utxo: u16,
    pub source_address_hash: Bytes32,
    pub spent_amount: UbaAmount,
    #[serde(default)]
    pub payment_reference: Option<PaymentReference>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedBlockHeightExistsResponse {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub number_of_confirmations: u64,
    #[serde(default)]
    pub average_block_production_time_ms: u64,
    pub lowest_query_window_block_number: u64,
    pub lowest_query_window_block_timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedPaymentNonexistenceResponse {
    pub deadline_block_number: u64,
    pub deadline_timestamp: u64,
    pub destination_address_hash: Bytes32,
    pub payment_reference: PaymentReference,
    pub amount: UbaAmount,
    pub lower_bound_block_number: u64,
    pub lower_bound_block_timestamp: u64,
    pub first_overflow_block_number: u64,
    pub first_overflow_block_timestamp: u64,
}

/// What the network attests to, by attestation type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attestationType")]
pub enum AttestationResponseBody {
    Payment(PaymentResponse),
    BalanceDecreasingTransaction(BalanceDecreasingTransactionResponse),
    ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsResponse),
    ReferencedPaymentNonexistence(ReferencedPaymentNonexistenceResponse),
}

impl AttestationResponseBody {
    pub fn attestation_type(&self) -> AttestationType {
        match self {
            Self::Payment(_) => AttestationType::Payment,
            Self::BalanceDecreasingTransaction(_) => AttestationType::BalanceDecreasingTransaction,
            Self::ConfirmedBlockHeightExists(_) => AttestationType::ConfirmedBlockHeightExists,
            Self::ReferencedPaymentNonexistence(_) => AttestationType::ReferencedPaymentNonexistence,
        }
    }
}

/// One entry of `votes-for-round`: the request, the attested response and the
/// response hash that is a leaf of the round's Merkle tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedResponse {
    pub request: AttestationRequest,
    pub response: AttestationResponseBody,
    pub hash: Bytes32,
}

/// A matched response with its inclusion path, ready for on-chain submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationProof {
    pub round: u64,
    pub hash: Bytes32,
    pub merkle_proof: Vec<Bytes32>,
    pub request: AttestationRequest,
    pub response: AttestationResponseBody,
}

impl AttestationProof {
    pub fn attestation_type(&self) -> AttestationType {
        self.response.attestation_type()
    }

    pub fn source_id(&self) -> SourceId {
        self.request.source_id()
    }

    pub fn as_payment(&self) -> Option<&PaymentResponse> {
        match &self.response {
            AttestationResponseBody::Payment(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_balance_decreasing(&self) -> Option<&BalanceDecreasingTransactionResponse> {
        match &self.response {
            AttestationResponseBody::BalanceDecreasingTransaction(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_confirmed_block_height(&self) -> Option<&ConfirmedBlockHeightExistsResponse> {
        match &self.response {
            AttestationResponseBody::ConfirmedBlockHeightExists(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_nonexistence(&self) -> Option<&ReferencedPaymentNonexistenceResponse> {
        match &self.response {
            AttestationResponseBody::ReferencedPaymentNonexistence(r) => Some(r),
            _ => None,
        }
    }
}

/// Outcome of a proof retrieval attempt.
///
/// `finalized == false` means "try again later": the round is empty, the
/// request was not found in it, or the verifier rejected the proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofResult {
    pub finalized: bool,
    pub result: Option<AttestationProof>,
}

impl ProofResult {
    pub fn pending() -> Self {
        Self {
            finalized: false,
            result: None,
        }
    }

    pub fn proved(proof: AttestationProof) -> Self {
        Self {
            finalized: true,
            result: Some(proof),
        }
    }

    pub fn into_proof(self) -> Option<AttestationProof> {
        if self.finalized {
            self.result
        } else {
            None
        }
    }
}
