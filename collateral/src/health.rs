//! Agent health: collateral ratios per class and the liquidation status
//! machine they drive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use synth_types::math::{mul_div, BIPS, MAX_RATIO_BIPS};
use synth_types::{Address, AgentStatus, Timestamp};
use tracing::{debug, info, warn};

use crate::amg::{
    amg_to_token_wei_price, amg_to_token_wei_price_direct, convert_amg_to_token_wei,
    convert_uba_to_amg,
};
use crate::error::CollateralError;
use crate::price::{PriceReader, PriceSnapshot};
use crate::ratio::{collateral_ratio_bips, pool_token_amg_price, AgentPosition};
use crate::settings::{AssetSettings, CollateralClass, CollateralType};

pub type CollateralRatios = BTreeMap<CollateralClass, u128>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealthState {
    pub vault_address: Address,
    pub status: AgentStatus,
    pub collateral_ratios_by_class: CollateralRatios,
    pub last_status_change_timestamp: Timestamp,
    /// Set on entering the collateral call band.
    pub ccb_start_timestamp: Option<Timestamp>,
}

impl AgentHealthState {
    pub fn new(vault_address: Address, status: AgentStatus, now: Timestamp) -> Self {
        Self {
            vault_address,
            status,
            collateral_ratios_by_class: CollateralRatios::new(),
            last_status_change_timestamp: now,
            ccb_start_timestamp: (status == AgentStatus::Ccb).then_some(now),
        }
    }

    pub fn ratio(&self, class: CollateralClass) -> Option<u128> {
        self.collateral_ratios_by_class.get(&class).copied()
    }
}

/// Ratios that drive transitions. Agent pool tokens carry no thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoverningRatios {
    pub vault: u128,
    pub pool: u128,
}

impl GoverningRatios {
    pub fn from_ratios(ratios: &CollateralRatios) -> Self {
        Self {
            vault: ratios
                .get(&CollateralClass::Vault)
                .copied()
                .unwrap_or(MAX_RATIO_BIPS),
            pool: ratios
                .get(&CollateralClass::Pool)
                .copied()
                .unwrap_or(MAX_RATIO_BIPS),
        }
    }

    fn any_below(&self, vault: u128, pool: u128) -> bool {
        self.vault < vault || self.pool < pool
    }
}

/// Everything a transition decision depends on besides the ratios.
#[derive(Clone, Copy, Debug)]
pub struct TransitionContext<'a> {
    pub vault_type: &'a CollateralType,
    pub pool_type: &'a CollateralType,
    pub ccb_start: Option<Timestamp>,
    pub ccb_time_seconds: u64,
    pub now: Timestamp,
    /// The contract has reported the end of liquidation.
    pub liquidation_ended: bool,
}

/// The status the agent should have given current ratios.
///
/// Returns `current` when no transition applies.
pub fn possible_transition(
    current: AgentStatus,
    ratios: GoverningRatios,
    ctx: &TransitionContext<'_>,
) -> AgentStatus {
    let liquidation_min = (
        ctx.vault_type.ccb_min_collateral_ratio_bips,
        ctx.pool_type.ccb_min_collateral_ratio_bips,
    );
    let ccb_min = (
        ctx.vault_type.min_collateral_ratio_bips,
        ctx.pool_type.min_collateral_ratio_bips,
    );
    let safety_min = (
        ctx.vault_type.safety_min_collateral_ratio_bips,
        ctx.pool_type.safety_min_collateral_ratio_bips,
    );
    match current {
        AgentStatus::Normal => {
            if ratios.any_below(liquidation_min.0, liquidation_min.1) {
                AgentStatus::Liquidation
            } else if ratios.any_below(ccb_min.0, ccb_min.1) {
                AgentStatus::Ccb
            } else {
                current
            }
        }
        AgentStatus::Ccb => {
            if !ratios.any_below(ccb_min.0, ccb_min.1) {
                AgentStatus::Normal
            } else if ratios.any_below(liquidation_min.0, liquidation_min.1)
                || ctx
                    .ccb_start
                    .is_some_and(|start| start.has_expired(ctx.ccb_time_seconds, ctx.now))
            {
                AgentStatus::Liquidation
            } else {
                current
            }
        }
        AgentStatus::Liquidation => {
            if ctx.liquidation_ended && !ratios.any_below(safety_min.0, safety_min.1) {
                AgentStatus::Normal
            } else {
                current
            }
        }
        AgentStatus::FullLiquidation | AgentStatus::Destroying => current,
    }
}

/// Outcome of one recomputation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthUpdate {
    pub previous: AgentStatus,
    pub status: AgentStatus,
    pub ratios: CollateralRatios,
}

impl HealthUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.status
    }
}

/// Collateral to deposit per class, in token wei. Zero means none needed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TopUp {
    pub vault_wei: u128,
    pub pool_wei: u128,
}

impl TopUp {
    pub fn is_needed(&self) -> bool {
        self.vault_wei > 0 || self.pool_wei > 0
    }
}

/// Tracks one agent's health from prices and on-chain position.
#[derive(Debug)]
pub struct HealthTracker {
    prices: PriceReader,
    asset: AssetSettings,
    vault_type: CollateralType,
    pool_type: CollateralType,
    state: AgentHealthState,
}

impl HealthTracker {
    pub fn new(
        prices: PriceReader,
        asset: AssetSettings,
        vault_type: CollateralType,
        pool_type: CollateralType,
        state: AgentHealthState,
    ) -> Result<Self, CollateralError> {
        asset.validate()?;
        vault_type.validate()?;
        pool_type.validate()?;
        Ok(Self {
            prices,
            asset,
            vault_type,
            pool_type,
            state,
        })
    }

    pub fn state(&self) -> &AgentHealthState {
        &self.state
    }

    pub fn status(&self) -> AgentStatus {
        self.state.status
    }

    pub fn asset_settings(&self) -> &AssetSettings {
        &self.asset
    }

    /// Replace the vault collateral type, e.g. after the agent switched tokens.
    pub fn set_vault_type(&mut self, vault_type: CollateralType) -> Result<(), CollateralError> {
        vault_type.validate()?;
        self.vault_type = vault_type;
        Ok(())
    }

    fn transition_context(
        &self,
        ccb_start: Option<Timestamp>,
        now: Timestamp,
        liquidation_ended: bool,
    ) -> TransitionContext<'_> {
        TransitionContext {
            vault_type: &self.vault_type,
            pool_type: &self.pool_type,
            ccb_start,
            ccb_time_seconds: self.asset.ccb_time_seconds,
            now,
            liquidation_ended,
        }
    }

    /// Ratios for every class, using one fresh price snapshot.
    pub async fn compute_ratios(
        &self,
        position: &AgentPosition,
    ) -> Result<CollateralRatios, CollateralError> {
        let mut snapshot = self.prices.snapshot();
        let vault_price = self.amg_price(&mut snapshot, &self.vault_type).await?;
        let pool_price = self.amg_price(&mut snapshot, &self.pool_type).await?;
        let granularity = self.asset.asset_minting_granularity_uba;

        let mut ratios = CollateralRatios::new();
        for (class, price) in [
            (CollateralClass::Vault, Some(vault_price)),
            (CollateralClass::Pool, Some(pool_price)),
            (
                CollateralClass::AgentPoolTokens,
                pool_token_amg_price(pool_price, position),
            ),
        ] {
            let backed = position.backed_uba(class);
            let ratio = match price {
                Some(price) => {
                    collateral_ratio_bips(position.collateral_wei(class), backed, granularity, price)?
                }
                None if backed == 0 => MAX_RATIO_BIPS,
                None => 0,
            };
            ratios.insert(class, ratio);
        }
        Ok(ratios)
    }

    async fn amg_price(
        &self,
        snapshot: &mut PriceSnapshot<'_>,
        collateral: &CollateralType,
    ) -> Result<u128, CollateralError> {
        let asset_price = snapshot.selected_price(&collateral.asset_ftso_symbol).await?;
        if collateral.direct_price_pair {
            return amg_to_token_wei_price_direct(
                collateral.decimals,
                self.asset.asset_minting_decimals,
                asset_price,
            );
        }
        let token_price = snapshot.selected_price(&collateral.token_ftso_symbol).await?;
        amg_to_token_wei_price(
            collateral.decimals,
            token_price,
            self.asset.asset_minting_decimals,
            asset_price,
        )
    }

    /// Deposits that lift the vault and pool ratios to `factor_bips` times
    /// their liquidation threshold.
    pub async fn required_top_up(
        &self,
        position: &AgentPosition,
        factor_bips: u128,
    ) -> Result<TopUp, CollateralError> {
        let mut snapshot = self.prices.snapshot();
        let vault_price = self.amg_price(&mut snapshot, &self.vault_type).await?;
        let pool_price = self.amg_price(&mut snapshot, &self.pool_type).await?;
        Ok(TopUp {
            vault_wei: self.shortfall(position, &self.vault_type, vault_price, factor_bips)?,
            pool_wei: self.shortfall(position, &self.pool_type, pool_price, factor_bips)?,
        })
    }

    fn shortfall(
        &self,
        position: &AgentPosition,
        collateral: &CollateralType,
        amg_price: u128,
        factor_bips: u128,
    ) -> Result<u128, CollateralError> {
        let backed_amg = convert_uba_to_amg(
            position.backed_uba(collateral.class),
            self.asset.asset_minting_granularity_uba,
        );
        let backing_wei = convert_amg_to_token_wei(backed_amg, amg_price)
            .ok_or(CollateralError::Overflow("backing value"))?;
        let target_bips = mul_div(collateral.ccb_min_collateral_ratio_bips, factor_bips, BIPS)
            .ok_or(CollateralError::Overflow("top-up ratio"))?;
        let required = mul_div(backing_wei, target_bips, BIPS)
            .ok_or(CollateralError::Overflow("top-up amount"))?;
        Ok(required.saturating_sub(position.collateral_wei(collateral.class)))
    }

    /// Re-read prices, recompute ratios and apply any status transition.
    pub async fn recompute(
        &mut self,
        position: &AgentPosition,
        now: Timestamp,
    ) -> Result<HealthUpdate, CollateralError> {
        let ratios = self.compute_ratios(position).await?;
        Ok(self.apply_ratios(ratios, now, false))
    }

    /// Apply already computed ratios.
    pub fn apply_ratios(
        &mut self,
        ratios: CollateralRatios,
        now: Timestamp,
        liquidation_ended: bool,
    ) -> HealthUpdate {
        let previous = self.state.status;
        let ctx = self.transition_context(self.state.ccb_start_timestamp, now, liquidation_ended);
        let next = possible_transition(previous, GoverningRatios::from_ratios(&ratios), &ctx);
        debug!(
            vault = %self.state.vault_address,
            status = %previous,
            ?ratios,
            "collateral ratios recomputed"
        );
        self.state.collateral_ratios_by_class = ratios.clone();
        self.set_status(next, now);
        HealthUpdate {
            previous,
            status: self.state.status,
            ratios,
        }
    }

    /// The contract does not liquidate the agent (any more). A tracked
    /// liquidation is dropped unless `ratios` are still below the
    /// liquidation threshold.
    pub fn leave_liquidation(&mut self, ratios: &CollateralRatios, now: Timestamp) -> bool {
        if self.state.status != AgentStatus::Liquidation {
            return false;
        }
        let ctx = self.transition_context(None, now, false);
        let from_normal =
            possible_transition(AgentStatus::Normal, GoverningRatios::from_ratios(ratios), &ctx);
        if from_normal == AgentStatus::Liquidation {
            return false;
        }
        self.set_status(AgentStatus::Normal, now)
    }

    /// Where the contract should move an agent it reports in `contract`
    /// status. A running liquidation may be ended once ratios reach the
    /// safety level.
    pub fn contract_transition(
        &self,
        contract: AgentStatus,
        ccb_start: Option<Timestamp>,
        ratios: &CollateralRatios,
        now: Timestamp,
    ) -> AgentStatus {
        let ctx = self.transition_context(ccb_start, now, true);
        possible_transition(contract, GoverningRatios::from_ratios(ratios), &ctx)
    }

    /// Mirror a status observed on-chain (challenge, contract-side liquidation).
    pub fn apply_status(&mut self, observed: AgentStatus, now: Timestamp) -> bool {
        if observed == self.state.status {
            return false;
        }
        if !self.state.status.can_transition_to(observed) {
            warn!(
                vault = %self.state.vault_address,
                from = %self.state.status,
                to = %observed,
                "ignoring impossible status report"
            );
            return false;
        }
        self.set_status(observed, now)
    }

    pub fn mark_destroying(&mut self, now: Timestamp) -> bool {
        self.set_status(AgentStatus::Destroying, now)
    }

    fn set_status(&mut self, next: AgentStatus, now: Timestamp) -> bool {
        let previous = self.state.status;
        if next == previous || !previous.can_transition_to(next) {
            return false;
        }
        info!(
            vault = %self.state.vault_address,
            from = %previous,
            to = %next,
            "agent status changed"
        );
        self.state.status = next;
        self.state.last_status_change_timestamp = now;
        self.state.ccb_start_timestamp = (next == AgentStatus::Ccb).then_some(now);
        true
    }
}
