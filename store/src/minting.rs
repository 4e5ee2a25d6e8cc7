//! Minting record storage.

use serde::{Deserialize, Serialize};
use synth_types::{Address, MintingState, PaymentReference, Timestamp, UbaAmount};

use crate::{ProofRequest, StoreError};

/// A collateral reservation the agent is expected to be paid for.
///
/// Keyed by the reservation (request) id, unique per asset manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintingRecord {
    pub request_id: u64,
    pub state: MintingState,
    pub agent_address: Address,
    pub agent_underlying_address: String,
    pub value_uba: UbaAmount,
    pub fee_uba: UbaAmount,
    pub first_underlying_block: u64,
    pub last_underlying_block: u64,
    pub last_underlying_timestamp: Timestamp,
    pub payment_reference: PaymentReference,
    /// Submitted attestation request whose round has not been read yet.
    #[serde(default)]
    pub proof_request: Option<ProofRequest>,
}

impl MintingRecord {
    /// Amount the minter must pay the agent.
    pub fn total_uba(&self) -> UbaAmount {
        self.value_uba.saturating_add(self.fee_uba)
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`. Returns false (and changes nothing) when already there.
    pub fn transition(&mut self, next: MintingState) -> Result<bool, StoreError> {
        if self.state == next {
            return Ok(false);
        }
        if !self.state.can_transition_to(next) {
            return Err(StoreError::IllegalTransition {
                record: "minting",
                id: self.request_id,
                from: format!("{:?}", self.state),
                to: format!("{next:?}"),
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.proof_request = None;
        }
        Ok(true)
    }
}

/// Trait for minting record storage.
pub trait MintingStore: Send + Sync {
    /// Store a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    fn insert_minting(&self, record: &MintingRecord) -> Result<(), StoreError>;

    /// Overwrite an existing record.
    fn put_minting(&self, record: &MintingRecord) -> Result<(), StoreError>;

    fn get_minting(&self, request_id: u64) -> Result<MintingRecord, StoreError>;

    fn minting_exists(&self, request_id: u64) -> Result<bool, StoreError>;

    /// Records of `agent` not yet in a terminal state.
    fn open_mintings(&self, agent: &Address) -> Result<Vec<MintingRecord>, StoreError>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn agent() -> Address {
        Address::parse("0x00000000000000000000000000000000000000a1").unwrap()
    }

    pub fn minting(request_id: u64) -> MintingRecord {
        MintingRecord {
            request_id,
            state: MintingState::Start,
            agent_address: agent(),
            agent_underlying_address: "agent-underlying".into(),
            value_uba: UbaAmount::new(20_000),
            fee_uba: UbaAmount::new(500),
            first_underlying_block: 10,
            last_underlying_block: 500,
            last_underlying_timestamp: Timestamp::new(5_000),
            payment_reference: PaymentReference::minting(request_id),
            proof_request: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::minting;
    use super::*;

    #[test]
    fn test_done_is_idempotent() {
        let mut record = minting(42);
        record.proof_request = Some(ProofRequest::new(3, "0x00"));
        assert!(record.transition(MintingState::Done).unwrap());
        assert!(record.proof_request.is_none());
        assert!(!record.transition(MintingState::Done).unwrap());
    }

    #[test]
    fn test_no_way_back() {
        let mut record = minting(42);
        record.transition(MintingState::Done).unwrap();
        assert!(matches!(
            record.transition(MintingState::Start),
            Err(StoreError::IllegalTransition { id: 42, .. })
        ));
    }

    #[test]
    fn test_total_includes_fee() {
        assert_eq!(minting(1).total_uba(), UbaAmount::new(20_500));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(minting(7)).unwrap();
        assert_eq!(json["state"], "START");
        assert_eq!(json["valueUba"], "20000");
    }
}
