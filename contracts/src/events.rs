//! Asset manager events the off-chain actors react to.

use serde::{Deserialize, Serialize};
use synth_types::{Address, PaymentReference, Timestamp, UbaAmount};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralReserved {
    pub agent_vault: Address,
    pub minter: Address,
    pub collateral_reservation_id: u64,
    pub value_uba: UbaAmount,
    pub fee_uba: UbaAmount,
    pub first_underlying_block: u64,
    pub last_underlying_block: u64,
    pub last_underlying_timestamp: Timestamp,
    pub payment_address: String,
    pub payment_reference: PaymentReference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequested {
    pub agent_vault: Address,
    pub redeemer: Address,
    pub request_id: u64,
    pub payment_address: String,
    pub value_uba: UbaAmount,
    pub fee_uba: UbaAmount,
    pub first_underlying_block: u64,
    pub last_underlying_block: u64,
    pub last_underlying_timestamp: Timestamp,
    pub payment_reference: PaymentReference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum AssetManagerEvent {
    CollateralReserved(CollateralReserved),
    MintingExecuted {
        agent_vault: Address,
        collateral_reservation_id: u64,
        minted_amount_uba: UbaAmount,
    },
    MintingPaymentDefault {
        agent_vault: Address,
        collateral_reservation_id: u64,
    },
    CollateralReservationDeleted {
        agent_vault: Address,
        collateral_reservation_id: u64,
    },
    RedemptionRequested(RedemptionRequested),
    RedemptionPerformed {
        agent_vault: Address,
        request_id: u64,
        transaction_hash: String,
    },
    RedemptionDefault {
        agent_vault: Address,
        request_id: u64,
    },
    RedemptionPaymentBlocked {
        agent_vault: Address,
        request_id: u64,
        transaction_hash: String,
    },
    RedemptionPaymentFailed {
        agent_vault: Address,
        request_id: u64,
        transaction_hash: String,
    },
    UnderlyingWithdrawalConfirmed {
        agent_vault: Address,
        announcement_id: u64,
        transaction_hash: String,
    },
    LiquidationStarted {
        agent_vault: Address,
        timestamp: Timestamp,
    },
    FullLiquidationStarted {
        agent_vault: Address,
        timestamp: Timestamp,
    },
    LiquidationEnded {
        agent_vault: Address,
    },
    AgentDestroyed {
        agent_vault: Address,
    },
    PriceEpochFinalized {
        epoch: u64,
    },
}

impl AssetManagerEvent {
    /// The agent an event concerns; `None` for system-wide events.
    pub fn agent_vault(&self) -> Option<&Address> {
        use AssetManagerEvent::*;
        match self {
            CollateralReserved(e) => Some(&e.agent_vault),
            RedemptionRequested(e) => Some(&e.agent_vault),
            MintingExecuted { agent_vault, .. }
            | MintingPaymentDefault { agent_vault, .. }
            | CollateralReservationDeleted { agent_vault, .. }
            | RedemptionPerformed { agent_vault, .. }
            | RedemptionDefault { agent_vault, .. }
            | RedemptionPaymentBlocked { agent_vault, .. }
            | RedemptionPaymentFailed { agent_vault, .. }
            | UnderlyingWithdrawalConfirmed { agent_vault, .. }
            | LiquidationStarted { agent_vault, .. }
            | FullLiquidationStarted { agent_vault, .. }
            | LiquidationEnded { agent_vault }
            | AgentDestroyed { agent_vault } => Some(agent_vault),
            PriceEpochFinalized { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        use AssetManagerEvent::*;
        match self {
            CollateralReserved(_) => "CollateralReserved",
            MintingExecuted { .. } => "MintingExecuted",
            MintingPaymentDefault { .. } => "MintingPaymentDefault",
            CollateralReservationDeleted { .. } => "CollateralReservationDeleted",
            RedemptionRequested(_) => "RedemptionRequested",
            RedemptionPerformed { .. } => "RedemptionPerformed",
            RedemptionDefault { .. } => "RedemptionDefault",
            RedemptionPaymentBlocked { .. } => "RedemptionPaymentBlocked",
            RedemptionPaymentFailed { .. } => "RedemptionPaymentFailed",
            UnderlyingWithdrawalConfirmed { .. } => "UnderlyingWithdrawalConfirmed",
            LiquidationStarted { .. } => "LiquidationStarted",
            FullLiquidationStarted { .. } => "FullLiquidationStarted",
            LiquidationEnded { .. } => "LiquidationEnded",
            AgentDestroyed { .. } => "AgentDestroyed",
            PriceEpochFinalized { .. } => "PriceEpochFinalized",
        }
    }
}

/// An event with its position on the smart-contract chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub block_number: u64,
    pub log_index: u32,
    #[serde(flatten)]
    pub event: AssetManagerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::json!({
            "blockNumber": 12,
            "logIndex": 0,
            "event": "RedemptionDefault",
            "agentVault": "0x00000000000000000000000000000000000000A1",
            "requestId": 9
        });
        let record: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.event.name(), "RedemptionDefault");
        assert_eq!(
            record.event.agent_vault().map(Address::as_str),
            Some("0x00000000000000000000000000000000000000a1")
        );
    }

    #[test]
    fn test_price_epoch_has_no_agent() {
        assert!(AssetManagerEvent::PriceEpochFinalized { epoch: 1 }
            .agent_vault()
            .is_none());
    }
}
