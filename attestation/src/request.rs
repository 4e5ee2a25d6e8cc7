//! Attestation requests and their canonical byte encoding.
//!
//! Layout (big-endian, fixed width):
//!
//! ```text
//! type:u16 | sourceId:u32 | integrityCode:32B | body
//! ```
//!
//! The encoded hex string is what gets submitted, persisted as a record's
//! pending `proofRequest`, and matched byte-for-byte against the requests a
//! finalized round attests to.

use std::fmt;

use serde::{Deserialize, Serialize};
use synth_crypto::keccak256;
use synth_types::{Bytes32, PaymentReference, SourceId, UbaAmount};

use crate::error::AttestationHelperError;

const HEADER_LEN: usize = 2 + 4 + 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttestationType {
    Payment,
    BalanceDecreasingTransaction,
    ConfirmedBlockHeightExists,
    ReferencedPaymentNonexistence,
}

impl AttestationType {
    pub fn code(self) -> u16 {
        match self {
            Self::Payment => 1,
            Self::BalanceDecreasingTransaction => 2,
            Self::ConfirmedBlockHeightExists => 3,
            Self::ReferencedPaymentNonexistence => 4,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Payment),
            2 => Some(Self::BalanceDecreasingTransaction),
            3 => Some(Self::ConfirmedBlockHeightExists),
            4 => Some(Self::ReferencedPaymentNonexistence),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::BalanceDecreasingTransaction => "balanceDecreasingTransaction",
            Self::ConfirmedBlockHeightExists => "confirmedBlockHeightExists",
            Self::ReferencedPaymentNonexistence => "referencedPaymentNonexistence",
        }
    }
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub source_id: SourceId,
    pub tx_id: Bytes32,
    pub block_number: u64,
    pub in_utxo: u16,
    pub utxo: u16,
    #[serde(default)]
    pub integrity_code: Bytes32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDecreasingTransactionRequest {
    pub source_id: SourceId,
    pub tx_id: Bytes32,
    pub block_number: u64,
    pub source_address_hash: Bytes32,
    #[serde(default)]
    pub integrity_code: Bytes32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedPaymentNonexistenceRequest {
    pub source_id: SourceId,
    pub minimal_block_number: u64,
    pub deadline_block_number: u64,
    pub deadline_timestamp: u64,
    pub destination_address_hash: Bytes32,
    pub amount: UbaAmount,
    pub payment_reference: PaymentReference,
    #[serde(default)]
    pub integrity_code: Bytes32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedBlockHeightExistsRequest {
    pub source_id: SourceId,
    pub block_number: u64,
    pub query_window: u64,
    #[serde(default)]
    pub integrity_code: Bytes32,
}

/// A request as the attestation network echoes it back in round responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attestationType")]
pub enum AttestationRequest {
    Payment(PaymentRequest),
    BalanceDecreasingTransaction(BalanceDecreasingTransactionRequest),
    ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsRequest),
    ReferencedPaymentNonexistence(ReferencedPaymentNonexistenceRequest),
}

impl AttestationRequest {
    pub fn attestation_type(&self) -> AttestationType {
        match self {
            Self::Payment(_) => AttestationType::Payment,
            Self::BalanceDecreasingTransaction(_) => AttestationType::BalanceDecreasingTransaction,
            Self::ConfirmedBlockHeightExists(_) => AttestationType::ConfirmedBlockHeightExists,
            Self::ReferencedPaymentNonexistence(_) => AttestationType::ReferencedPaymentNonexistence,
        }
    }

    pub fn source_id(&self) -> SourceId {
        match self {
            Self::Payment(r) => r.source_id,
            Self::BalanceDecreasingTransaction(r) => r.source_id,
            Self::ConfirmedBlockHeightExists(r) => r.source_id,
            Self::ReferencedPaymentNonexistence(r) => r.source_id,
        }
    }

    fn integrity_code(&self) -> &Bytes32 {
        match self {
            Self::Payment(r) => &r.integrity_code,
            Self::BalanceDecreasingTransaction(r) => &r.integrity_code,
            Self::ConfirmedBlockHeightExists(r) => &r.integrity_code,
            Self::ReferencedPaymentNonexistence(r) => &r.integrity_code,
        }
    }

    /// Canonical bytes of this request.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + 96);
        out.extend_from_slice(&self.attestation_type().code().to_be_bytes());
        out.extend_from_slice(&self.source_id().code().to_be_bytes());
        out.extend_from_slice(self.integrity_code().as_bytes());
        match self {
            Self::Payment(r) => {
                out.extend_from_slice(r.tx_id.as_bytes());
                out.extend_from_slice(&r.block_number.to_be_bytes());
                out.extend_from_slice(&r.in_utxo.to_be_bytes());
                out.extend_from_slice(&r.utxo.to_be_bytes());
            }
            Self::BalanceDecreasingTransaction(r) => {
                out.extend_from_slice(r.tx_id.as_bytes());
                out.extend_from_slice(&r.block_number.to_be_bytes());
                out.extend_from_slice(r.source_address_hash.as_bytes());
            }
            Self::ConfirmedBlockHeightExists(r) => {
                out.extend_from_slice(&r.block_number.to_be_bytes());
                out.extend_from_slice(&r.query_window.to_be_bytes());
            }
            Self::ReferencedPaymentNonexistence(r) => {
                out.extend_from_slice(&r.minimal_block_number.to_be_bytes());
                out.extend_from_slice(&r.deadline_block_number.to_be_bytes());
                out.extend_from_slice(&r.deadline_timestamp.to_be_bytes());
                out.extend_from_slice(r.destination_address_hash.as_bytes());
                out.extend_from_slice(&r.amount.raw().to_be_bytes());
                out.extend_from_slice(r.payment_reference.as_bytes32().as_bytes());
            }
        }
        out
    }

    /// `0x`-prefixed hex of [`to_bytes`](Self::to_bytes).
    pub fn encode(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Big-endian cursor over canonical request bytes.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], AttestationHelperError> {
        if self.bytes.len() < n {
            return Err(AttestationHelperError::Decode(format!(
                "request data truncated: need {n} more bytes, have {}",
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], AttestationHelperError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, AttestationHelperError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, AttestationHelperError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, AttestationHelperError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn u128(&mut self) -> Result<u128, AttestationHelperError> {
        Ok(u128::from_be_bytes(self.array()?))
    }

    fn bytes32(&mut self) -> Result<Bytes32, AttestationHelperError> {
        Ok(Bytes32::new(self.array()?))
    }
}

impl AttestationRequest {
    /// Parse hex request data produced by [`encode`](Self::encode).
    pub fn decode(data: &str) -> Result<Self, AttestationHelperError> {
        let body = data.strip_prefix("0x").unwrap_or(data);
        let bytes = hex::decode(body).map_err(|e| AttestationHelperError::Decode(e.to_string()))?;
        let mut r = Reader { bytes: &bytes };

        let code = r.u16()?;
        let kind = AttestationType::from_code(code)
            .ok_or_else(|| AttestationHelperError::Decode(format!("unknown attestation type {code}")))?;
        let source_code = r.u32()?;
        let source_id = SourceId::from_code(source_code)
            .ok_or_else(|| AttestationHelperError::Decode(format!("unknown source id {source_code}")))?;
        let integrity_code = r.bytes32()?;

        let request = match kind {
            AttestationType::Payment => Self::Payment(PaymentRequest {
                source_id,
                tx_id: r.bytes32()?,
                block_number: r.u64()?,
                in_utxo: r.u16()?,
                utxo: r.u16()?,
                integrity_code,
            }),
            AttestationType::BalanceDecreasingTransaction => {
                Self::BalanceDecreasingTransaction(BalanceDecreasingTransactionRequest {
                    source_id,
                    tx_id: r.bytes32()?,
                    block_number: r.u64()?,
                    source_address_hash: r.bytes32()?,
                    integrity_code,
                })
            }
            AttestationType::ConfirmedBlockHeightExists => {
                Self::ConfirmedBlockHeightExists(ConfirmedBlockHeightExistsRequest {
                    source_id,
                    block_number: r.u64()?,
                    query_window: r.u64()?,
                    integrity_code,
                })
            }
            AttestationType::ReferencedPaymentNonexistence => {
                Self::ReferencedPaymentNonexistence(ReferencedPaymentNonexistenceRequest {
                    source_id,
                    minimal_block_number: r.u64()?,
                    deadline_block_number: r.u64()?,
                    deadline_timestamp: r.u64()?,
                    destination_address_hash: r.bytes32()?,
                    amount: UbaAmount::new(r.u128()?),
                    payment_reference: PaymentReference::from_bytes32(r.bytes32()?),
                    integrity_code,
                })
            }
        };
        if !r.bytes.is_empty() {
            return Err(AttestationHelperError::Decode(format!(
                "{} trailing bytes after {kind} request",
                r.bytes.len()
            )));
        }
        Ok(request)
    }
}

/// Attestation type of previously encoded request data.
pub fn type_of(data: &str) -> Result<AttestationType, AttestationHelperError> {
    let body = data.strip_prefix("0x").unwrap_or(data);
    let prefix = body
        .get(..4)
        .ok_or_else(|| AttestationHelperError::Decode(format!("request data too short: {data}")))?;
    let code = u16::from_str_radix(prefix, 16)
        .map_err(|e| AttestationHelperError::Decode(format!("{prefix}: {e}")))?;
    AttestationType::from_code(code)
        .ok_or_else(|| AttestationHelperError::Decode(format!("unknown attestation type {code}")))
}

/// 32-byte form of a chain transaction id.
///
/// Hex ids decode directly (case-insensitive, so XRP's upper-case ids match);
/// ids in other alphabets are hashed.
pub fn transaction_id_bytes(hash: &str) -> Bytes32 {
    Bytes32::from_hex(hash).unwrap_or_else(|_| keccak256(hash.as_bytes()))
}

/// Keccak-256 of an underlying address, as used in request bodies.
pub fn address_hash(address: &str) -> Bytes32 {
    keccak256(address.as_bytes())
}

/// Round a request was submitted in, plus its encoded data.
///
/// Persisted on records while a proof is pending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequestId {
    pub round: u64,
    pub data: String,
}
