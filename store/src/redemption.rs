//! Redemption record storage.

use serde::{Deserialize, Serialize};
use synth_types::{Address, PaymentReference, RedemptionState, Timestamp, UbaAmount};

use crate::{ProofRequest, StoreError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub request_id: u64,
    pub state: RedemptionState,
    pub agent_address: Address,
    pub agent_underlying_address: String,
    /// Redeemer's underlying address.
    pub payment_address: String,
    pub value_uba: UbaAmount,
    pub fee_uba: UbaAmount,
    pub payment_reference: PaymentReference,
    pub first_underlying_block: u64,
    pub last_underlying_block: u64,
    pub last_underlying_timestamp: Timestamp,
    /// Set once the agent has paid.
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub proof_request: Option<ProofRequest>,
}

impl RedemptionRecord {
    /// What the agent pays: the value minus the redemption fee it keeps.
    pub fn payment_amount(&self) -> UbaAmount {
        self.value_uba.saturating_sub(self.fee_uba)
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the pending proof is for the agent's own payment (as opposed to
    /// non-payment).
    pub fn proves_payment(&self) -> bool {
        self.tx_hash.is_some()
    }

    /// Move to `next`. Returns false (and changes nothing) when already there.
    pub fn transition(&mut self, next: RedemptionState) -> Result<bool, StoreError> {
        if self.state == next {
            return Ok(false);
        }
        if !self.state.can_transition_to(next) {
            return Err(StoreError::IllegalTransition {
                record: "redemption",
                id: self.request_id,
                from: format!("{:?}", self.state),
                to: format!("{next:?}"),
            });
        }
        self.state = next;
        Ok(true)
    }
}

/// Trait for redemption record storage.
pub trait RedemptionStore: Send + Sync {
    /// Store a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    fn insert_redemption(&self, record: &RedemptionRecord) -> Result<(), StoreError>;

    /// Overwrite an existing record.
    fn put_redemption(&self, record: &RedemptionRecord) -> Result<(), StoreError>;

    fn get_redemption(&self, request_id: u64) -> Result<RedemptionRecord, StoreError>;

    fn redemption_exists(&self, request_id: u64) -> Result<bool, StoreError>;

    /// Records of `agent` not yet in a terminal state.
    fn open_redemptions(&self, agent: &Address) -> Result<Vec<RedemptionRecord>, StoreError>;
}
