//! Attestation protocol client.
//!
//! Requests are pure functions of chain facts, encoded canonically
//! ([`AttestationRequest::encode`]) and submitted to the attestation network.
//! Once the round is finalized, [`AttestationClient::obtain_proof`] finds the
//! matching response by content, builds the round's Merkle tree and hands the
//! inclusion path to a [`ProofVerifier`].

pub mod client;
pub mod error;
pub mod helper;
pub mod network;
pub mod request;
pub mod response;

pub use client::HttpAttestationNetwork;
pub use error::AttestationHelperError;
pub use helper::AttestationClient;
pub use network::{AttestationNetwork, ProofVerifier};
pub use request::{
    address_hash, transaction_id_bytes, type_of, AttestationRequest, AttestationRequestId,
    AttestationType, BalanceDecreasingTransactionRequest, ConfirmedBlockHeightExistsRequest,
    PaymentRequest, ReferencedPaymentNonexistenceRequest,
};
pub use response::{
    AttestationProof, AttestationResponseBody, AttestedResponse,
    BalanceDecreasingTransactionResponse, ConfirmedBlockHeightExistsResponse, PaymentResponse,
    ProofResult, ReferencedPaymentNonexistenceResponse,
};
