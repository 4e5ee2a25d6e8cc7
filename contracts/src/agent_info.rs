//! Agent state as reported by the asset manager.

use serde::{Deserialize, Serialize};
use synth_collateral::{AgentPosition, CollateralType};
use synth_types::{Address, AgentStatus, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub status: AgentStatus,
    pub owner_address: Address,
    pub underlying_address: String,
    pub total_vault_collateral_wei: u128,
    pub vault_collateral_ratio_bips: u128,
    pub total_pool_collateral_wei: u128,
    pub pool_collateral_ratio_bips: u128,
    pub total_agent_pool_tokens_wei: u128,
    pub total_pool_token_supply_wei: u128,
    pub minted_uba: u128,
    pub reserved_uba: u128,
    pub redeeming_uba: u128,
    pub pool_redeeming_uba: u128,
    #[serde(default)]
    pub ccb_start_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub liquidation_start_timestamp: Option<Timestamp>,
    pub underlying_balance_uba: i128,
    pub free_underlying_balance_uba: i128,
    /// Zero when no withdrawal is announced.
    #[serde(default)]
    pub announced_underlying_withdrawal_id: u64,
}

impl AgentInfo {
    pub fn position(&self) -> AgentPosition {
        AgentPosition {
            minted_uba: self.minted_uba,
            reserved_uba: self.reserved_uba,
            redeeming_uba: self.redeeming_uba,
            pool_redeeming_uba: self.pool_redeeming_uba,
            vault_collateral_wei: self.total_vault_collateral_wei,
            pool_collateral_wei: self.total_pool_collateral_wei,
            agent_pool_tokens_wei: self.total_agent_pool_tokens_wei,
            total_pool_tokens_wei: self.total_pool_token_supply_wei,
            underlying_balance_uba: self.underlying_balance_uba,
        }
    }

    pub fn announced_withdrawal(&self) -> Option<u64> {
        (self.announced_underlying_withdrawal_id != 0).then_some(self.announced_underlying_withdrawal_id)
    }
}

/// The two collateral types an agent is backed by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCollateralTypes {
    pub vault: CollateralType,
    pub pool: CollateralType,
}
