//! The asset manager contract as the off-chain actors see it.

use async_trait::async_trait;
use synth_attestation::AttestationProof;
use synth_collateral::AssetSettings;
use synth_types::Address;

use crate::agent_info::{AgentCollateralTypes, AgentInfo};
use crate::error::ContractError;
use crate::events::EventRecord;

/// Hash of the smart-contract-chain transaction that carried a call.
pub type CallHash = String;

#[async_trait]
pub trait AssetManager: Send + Sync {
    fn address(&self) -> &Address;

    /// Latest smart-contract-chain block considered final.
    async fn finalized_block(&self) -> Result<u64, ContractError>;

    /// Events in `[from_block, to_block]`, optionally only those of `agent`.
    async fn events(
        &self,
        from_block: u64,
        to_block: u64,
        agent: Option<&Address>,
    ) -> Result<Vec<EventRecord>, ContractError>;

    async fn get_agent_info(&self, agent: &Address) -> Result<AgentInfo, ContractError>;

    async fn asset_settings(&self) -> Result<AssetSettings, ContractError>;

    async fn agent_collateral_types(
        &self,
        agent: &Address,
    ) -> Result<AgentCollateralTypes, ContractError>;

    // Minting

    async fn execute_minting(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn minting_payment_default(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn unstick_minting(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    // Redemption

    async fn confirm_redemption_payment(
        &self,
        proof: &AttestationProof,
        request_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn redemption_payment_default(
        &self,
        proof: &AttestationProof,
        request_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    // Challenges

    async fn illegal_payment_challenge(
        &self,
        proof: &AttestationProof,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn double_payment_challenge(
        &self,
        first: &AttestationProof,
        second: &AttestationProof,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn free_balance_negative_challenge(
        &self,
        proofs: &[AttestationProof],
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    // Liquidation

    async fn start_liquidation(
        &self,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn end_liquidation(&self, agent: &Address, from: &Address)
        -> Result<CallHash, ContractError>;

    // Collateral top-up, sent by the agent owner

    async fn deposit_vault_collateral(
        &self,
        agent: &Address,
        amount_wei: u128,
        from: &Address,
    ) -> Result<CallHash, ContractError>;

    async fn buy_collateral_pool_tokens(
        &self,
        agent: &Address,
        amount_wei: u128,
        from: &Address,
    ) -> Result<CallHash, ContractError>;
}
