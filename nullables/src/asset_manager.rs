//! A tiny in-memory asset manager that records every call.
//!
//! Every call is recorded. Settlement calls check that the referenced
//! reservation or redemption exists and is still open, emit the event the
//! real contract would, and revert with the real contract's messages
//! otherwise. Reverts can also be scripted per method.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use synth_attestation::AttestationProof;
use synth_collateral::{AssetSettings, CollateralType};
use synth_contracts::{
    AgentCollateralTypes, AgentInfo, AssetManager, AssetManagerEvent, CallHash, ContractError,
    EventRecord,
};
use synth_types::{Address, AgentStatus, Timestamp};

/// A recorded contract call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractCall {
    ExecuteMinting { id: u64, proof: Box<AttestationProof> },
    MintingPaymentDefault { id: u64, proof: Box<AttestationProof> },
    UnstickMinting { id: u64, proof: Box<AttestationProof> },
    ConfirmRedemptionPayment { id: u64, proof: Box<AttestationProof> },
    RedemptionPaymentDefault { id: u64, proof: Box<AttestationProof> },
    IllegalPaymentChallenge { agent: Address },
    DoublePaymentChallenge { agent: Address },
    FreeBalanceNegativeChallenge { agent: Address, payments: usize },
    StartLiquidation { agent: Address },
    EndLiquidation { agent: Address },
    DepositVaultCollateral { agent: Address, amount_wei: u128 },
    BuyCollateralPoolTokens { agent: Address, amount_wei: u128 },
}

impl ContractCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::ExecuteMinting { .. } => "executeMinting",
            Self::MintingPaymentDefault { .. } => "mintingPaymentDefault",
            Self::UnstickMinting { .. } => "unstickMinting",
            Self::ConfirmRedemptionPayment { .. } => "confirmRedemptionPayment",
            Self::RedemptionPaymentDefault { .. } => "redemptionPaymentDefault",
            Self::IllegalPaymentChallenge { .. } => "illegalPaymentChallenge",
            Self::DoublePaymentChallenge { .. } => "doublePaymentChallenge",
            Self::FreeBalanceNegativeChallenge { .. } => "freeBalanceNegativeChallenge",
            Self::StartLiquidation { .. } => "startLiquidation",
            Self::EndLiquidation { .. } => "endLiquidation",
            Self::DepositVaultCollateral { .. } => "depositVaultCollateral",
            Self::BuyCollateralPoolTokens { .. } => "buyCollateralPoolTokens",
        }
    }
}

struct ContractState {
    block: u64,
    events: Vec<EventRecord>,
    agents: HashMap<Address, AgentInfo>,
    collateral_types: Option<AgentCollateralTypes>,
    settled_mintings: HashSet<u64>,
    settled_redemptions: HashSet<u64>,
    calls: Vec<ContractCall>,
    scripted_reverts: HashMap<&'static str, String>,
}

pub struct NullAssetManager {
    address: Address,
    settings: AssetSettings,
    timestamp: AtomicU64,
    unreachable: AtomicBool,
    state: Mutex<ContractState>,
}

impl NullAssetManager {
    pub fn new(address: Address, settings: AssetSettings) -> Self {
        Self {
            address,
            settings,
            timestamp: AtomicU64::new(0),
            unreachable: AtomicBool::new(false),
            state: Mutex::new(ContractState {
                block: 0,
                events: Vec::new(),
                agents: HashMap::new(),
                collateral_types: None,
                settled_mintings: HashSet::new(),
                settled_redemptions: HashSet::new(),
                calls: Vec::new(),
                scripted_reverts: HashMap::new(),
            }),
        }
    }

    /// Timestamp stamped on liquidation events.
    pub fn set_timestamp(&self, secs: u64) {
        self.timestamp.store(secs, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_agent_info(&self, agent: &Address, info: AgentInfo) {
        self.state.lock().unwrap().agents.insert(agent.clone(), info);
    }

    pub fn agent_info(&self, agent: &Address) -> Option<AgentInfo> {
        self.state.lock().unwrap().agents.get(agent).cloned()
    }

    pub fn set_collateral_types(&self, types: AgentCollateralTypes) {
        self.state.lock().unwrap().collateral_types = Some(types);
    }

    /// Append `event` in a new block; returns the block number.
    pub fn emit(&self, event: AssetManagerEvent) -> u64 {
        let mut state = self.state.lock().unwrap();
        Self::push_event(&mut state, event)
    }

    /// Make the next call of `method` revert with `reason`.
    pub fn revert_next(&self, method: &'static str, reason: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .scripted_reverts
            .insert(method, reason.into());
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<ContractCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method() == method)
            .collect()
    }

    fn push_event(state: &mut ContractState, event: AssetManagerEvent) -> u64 {
        state.block += 1;
        let block_number = state.block;
        state.events.push(EventRecord {
            block_number,
            log_index: 0,
            event,
        });
        block_number
    }

    fn reservation_agent(state: &ContractState, id: u64) -> Option<Address> {
        state.events.iter().find_map(|r| match &r.event {
            AssetManagerEvent::CollateralReserved(e) if e.collateral_reservation_id == id => {
                Some(e.agent_vault.clone())
            }
            _ => None,
        })
    }

    fn redemption_agent(state: &ContractState, id: u64) -> Option<Address> {
        state.events.iter().find_map(|r| match &r.event {
            AssetManagerEvent::RedemptionRequested(e) if e.request_id == id => {
                Some(e.agent_vault.clone())
            }
            _ => None,
        })
    }

    /// Record `call`, then fail if the node is down or a revert is scripted.
    fn begin(&self, call: ContractCall) -> Result<std::sync::MutexGuard<'_, ContractState>, ContractError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ContractError::Transient("null node offline".into()));
        }
        let mut state = self.state.lock().unwrap();
        let method = call.method();
        state.calls.push(call);
        if let Some(reason) = state.scripted_reverts.remove(method) {
            return Err(ContractError::Reverted(reason));
        }
        Ok(state)
    }

    fn call_hash(state: &ContractState) -> CallHash {
        format!("0x{:064x}", state.block)
    }

    fn settle_minting(
        &self,
        call: ContractCall,
        id: u64,
        event: impl FnOnce(Address) -> AssetManagerEvent,
    ) -> Result<CallHash, ContractError> {
        let mut state = self.begin(call)?;
        let agent = Self::reservation_agent(&state, id)
            .filter(|_| !state.settled_mintings.contains(&id))
            .ok_or_else(|| ContractError::Reverted("invalid crt id".into()))?;
        state.settled_mintings.insert(id);
        Self::push_event(&mut state, event(agent));
        Ok(Self::call_hash(&state))
    }

    fn settle_redemption(
        &self,
        call: ContractCall,
        id: u64,
        event: impl FnOnce(Address) -> AssetManagerEvent,
    ) -> Result<CallHash, ContractError> {
        let mut state = self.begin(call)?;
        let agent = Self::redemption_agent(&state, id)
            .filter(|_| !state.settled_redemptions.contains(&id))
            .ok_or_else(|| ContractError::Reverted("invalid redemption status".into()))?;
        state.settled_redemptions.insert(id);
        Self::push_event(&mut state, event(agent));
        Ok(Self::call_hash(&state))
    }

    fn liquidate(
        &self,
        call: ContractCall,
        agent: &Address,
        already: &str,
    ) -> Result<CallHash, ContractError> {
        let timestamp = Timestamp::new(self.timestamp.load(Ordering::SeqCst));
        let mut state = self.begin(call)?;
        let info = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))?;
        if info.status == AgentStatus::FullLiquidation {
            return Err(ContractError::Reverted(already.to_string()));
        }
        info.status = AgentStatus::FullLiquidation;
        info.liquidation_start_timestamp = Some(timestamp);
        Self::push_event(
            &mut state,
            AssetManagerEvent::FullLiquidationStarted {
                agent_vault: agent.clone(),
                timestamp,
            },
        );
        Ok(Self::call_hash(&state))
    }
}

#[async_trait]
impl AssetManager for NullAssetManager {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn finalized_block(&self) -> Result<u64, ContractError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ContractError::Transient("null node offline".into()));
        }
        Ok(self.state.lock().unwrap().block)
    }

    async fn events(
        &self,
        from_block: u64,
        to_block: u64,
        agent: Option<&Address>,
    ) -> Result<Vec<EventRecord>, ContractError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ContractError::Transient("null node offline".into()));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|r| (from_block..=to_block).contains(&r.block_number))
            .filter(|r| agent.is_none() || r.event.agent_vault() == agent)
            .cloned()
            .collect())
    }

    async fn get_agent_info(&self, agent: &Address) -> Result<AgentInfo, ContractError> {
        self.agent_info(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))
    }

    async fn asset_settings(&self) -> Result<AssetSettings, ContractError> {
        Ok(self.settings.clone())
    }

    async fn agent_collateral_types(
        &self,
        _agent: &Address,
    ) -> Result<AgentCollateralTypes, ContractError> {
        self.state
            .lock()
            .unwrap()
            .collateral_types
            .clone()
            .ok_or_else(|| ContractError::Call("collateral types not configured".into()))
    }

    async fn execute_minting(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let minted = proof
            .as_payment()
            .map(|p| p.received_amount)
            .ok_or_else(|| ContractError::Reverted("invalid payment proof".into()))?;
        let call = ContractCall::ExecuteMinting {
            id: collateral_reservation_id,
            proof: Box::new(proof.clone()),
        };
        self.settle_minting(call, collateral_reservation_id, |agent_vault| {
            AssetManagerEvent::MintingExecuted {
                agent_vault,
                collateral_reservation_id,
                minted_amount_uba: minted,
            }
        })
    }

    async fn minting_payment_default(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let call = ContractCall::MintingPaymentDefault {
            id: collateral_reservation_id,
            proof: Box::new(proof.clone()),
        };
        self.settle_minting(call, collateral_reservation_id, |agent_vault| {
            AssetManagerEvent::MintingPaymentDefault {
                agent_vault,
                collateral_reservation_id,
            }
        })
    }

    async fn unstick_minting(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let call = ContractCall::UnstickMinting {
            id: collateral_reservation_id,
            proof: Box::new(proof.clone()),
        };
        self.settle_minting(call, collateral_reservation_id, |agent_vault| {
            AssetManagerEvent::CollateralReservationDeleted {
                agent_vault,
                collateral_reservation_id,
            }
        })
    }

    async fn confirm_redemption_payment(
        &self,
        proof: &AttestationProof,
        request_id: u64,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let payment = proof
            .as_payment()
            .cloned()
            .ok_or_else(|| ContractError::Reverted("invalid payment proof".into()))?;
        let call = ContractCall::ConfirmRedemptionPayment {
            id: request_id,
            proof: Box::new(proof.clone()),
        };
        let transaction_hash = payment.transaction_hash.to_hex();
        self.settle_redemption(call, request_id, |agent_vault| match payment.status {
            0 => AssetManagerEvent::RedemptionPerformed {
                agent_vault,
                request_id,
                transaction_hash,
            },
            2 => AssetManagerEvent::RedemptionPaymentBlocked {
                agent_vault,
                request_id,
                transaction_hash,
            },
            _ => AssetManagerEvent::RedemptionPaymentFailed {
                agent_vault,
                request_id,
                transaction_hash,
            },
        })
    }

    async fn redemption_payment_default(
        &self,
        proof: &AttestationProof,
        request_id: u64,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let call = ContractCall::RedemptionPaymentDefault {
            id: request_id,
            proof: Box::new(proof.clone()),
        };
        self.settle_redemption(call, request_id, |agent_vault| {
            AssetManagerEvent::RedemptionDefault {
                agent_vault,
                request_id,
            }
        })
    }

    async fn illegal_payment_challenge(
        &self,
        _proof: &AttestationProof,
        agent: &Address,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let call = ContractCall::IllegalPaymentChallenge {
            agent: agent.clone(),
        };
        self.liquidate(call, agent, "chlg: already liquidating")
    }

    async fn double_payment_challenge(
        &self,
        _first: &AttestationProof,
        _second: &AttestationProof,
        agent: &Address,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let call = ContractCall::DoublePaymentChallenge {
            agent: agent.clone(),
        };
        self.liquidate(call, agent, "chlg dbl: already liquidating")
    }

    async fn free_balance_negative_challenge(
        &self,
        proofs: &[AttestationProof],
        agent: &Address,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let call = ContractCall::FreeBalanceNegativeChallenge {
            agent: agent.clone(),
            payments: proofs.len(),
        };
        self.liquidate(call, agent, "mult chlg: already liquidating")
    }

    async fn start_liquidation(
        &self,
        agent: &Address,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let timestamp = Timestamp::new(self.timestamp.load(Ordering::SeqCst));
        let mut state = self.begin(ContractCall::StartLiquidation {
            agent: agent.clone(),
        })?;
        let types = state.collateral_types.clone();
        let info = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))?;
        if info.status.is_liquidating() {
            return Err(ContractError::Reverted("liquidation already started".into()));
        }
        // Reported ratios decide between the call band and liquidation.
        let below = |pick: fn(&CollateralType) -> u128| {
            types.as_ref().map_or(true, |t| {
                info.vault_collateral_ratio_bips < pick(&t.vault)
                    || info.pool_collateral_ratio_bips < pick(&t.pool)
            })
        };
        if !below(|t| t.ccb_min_collateral_ratio_bips) && info.status == AgentStatus::Normal {
            if !below(|t| t.min_collateral_ratio_bips) {
                return Err(ContractError::Reverted("liquidation not started".into()));
            }
            info.status = AgentStatus::Ccb;
            info.ccb_start_timestamp = Some(timestamp);
            return Ok(Self::call_hash(&state));
        }
        info.status = AgentStatus::Liquidation;
        info.ccb_start_timestamp = None;
        info.liquidation_start_timestamp = Some(timestamp);
        Self::push_event(
            &mut state,
            AssetManagerEvent::LiquidationStarted {
                agent_vault: agent.clone(),
                timestamp,
            },
        );
        Ok(Self::call_hash(&state))
    }

    async fn end_liquidation(
        &self,
        agent: &Address,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let mut state = self.begin(ContractCall::EndLiquidation {
            agent: agent.clone(),
        })?;
        let info = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))?;
        if !matches!(info.status, AgentStatus::Liquidation | AgentStatus::Ccb) {
            return Err(ContractError::Reverted("cannot stop liquidation".into()));
        }
        info.status = AgentStatus::Normal;
        info.ccb_start_timestamp = None;
        info.liquidation_start_timestamp = None;
        Self::push_event(
            &mut state,
            AssetManagerEvent::LiquidationEnded {
                agent_vault: agent.clone(),
            },
        );
        Ok(Self::call_hash(&state))
    }

    async fn deposit_vault_collateral(
        &self,
        agent: &Address,
        amount_wei: u128,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let mut state = self.begin(ContractCall::DepositVaultCollateral {
            agent: agent.clone(),
            amount_wei,
        })?;
        let info = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))?;
        info.vault_collateral_ratio_bips =
            scaled_ratio(info.vault_collateral_ratio_bips, info.total_vault_collateral_wei, amount_wei);
        info.total_vault_collateral_wei += amount_wei;
        Ok(Self::call_hash(&state))
    }

    async fn buy_collateral_pool_tokens(
        &self,
        agent: &Address,
        amount_wei: u128,
        _from: &Address,
    ) -> Result<CallHash, ContractError> {
        let mut state = self.begin(ContractCall::BuyCollateralPoolTokens {
            agent: agent.clone(),
            amount_wei,
        })?;
        let info = state
            .agents
            .get_mut(agent)
            .ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))?;
        info.pool_collateral_ratio_bips =
            scaled_ratio(info.pool_collateral_ratio_bips, info.total_pool_collateral_wei, amount_wei);
        info.total_pool_collateral_wei += amount_wei;
        // Pool tokens are bought one to one with collateral.
        info.total_agent_pool_tokens_wei += amount_wei;
        info.total_pool_token_supply_wei += amount_wei;
        Ok(Self::call_hash(&state))
    }
}

/// Ratio after `added` wei join `total`, backing unchanged.
fn scaled_ratio(ratio: u128, total: u128, added: u128) -> u128 {
    if total == 0 {
        return ratio;
    }
    ratio * (total + added) / total
}
