//! Keeps the agent's off-chain health status in step with prices and the
//! contract, and tops up collateral before the agent gets liquidated.
//!
//! Starting and ending liquidation is left to the
//! [`SystemKeeper`](crate::system_keeper::SystemKeeper); the agent only
//! follows what the contract reports.

use synth_collateral::{
    AgentHealthState, AgentPosition, CollateralClass, HealthTracker, HealthUpdate, PriceReader,
};
use synth_types::AgentStatus;
use tracing::{debug, info, warn};

use crate::context::{AgentContext, AgentIdentity};
use crate::AgentError;

/// Top up once a ratio is below 1.2 times its liquidation threshold.
pub const DEFAULT_TOP_UP_FACTOR_BIPS: u128 = 12_000;

pub struct HealthKeeper {
    ctx: AgentContext,
    identity: AgentIdentity,
    tracker: HealthTracker,
    top_up_factor_bips: u128,
}

impl HealthKeeper {
    /// Read settings, collateral types and the current status from the contract.
    pub async fn load(
        ctx: AgentContext,
        identity: AgentIdentity,
        prices: PriceReader,
    ) -> Result<Self, AgentError> {
        let asset_manager = &ctx.asset_manager;
        let settings = asset_manager.asset_settings().await?;
        let types = asset_manager.agent_collateral_types(&identity.vault).await?;
        let info = asset_manager.get_agent_info(&identity.vault).await?;
        let state = AgentHealthState::new(identity.vault.clone(), info.status, ctx.clock.now());
        let tracker = HealthTracker::new(prices, settings, types.vault, types.pool, state)?;
        let keeper = Self {
            ctx,
            identity,
            tracker,
            top_up_factor_bips: DEFAULT_TOP_UP_FACTOR_BIPS,
        };
        keeper.publish();
        Ok(keeper)
    }

    pub fn with_top_up_factor(mut self, factor_bips: u128) -> Self {
        self.top_up_factor_bips = factor_bips;
        self
    }

    pub fn status(&self) -> AgentStatus {
        self.tracker.status()
    }

    pub fn state(&self) -> &AgentHealthState {
        self.tracker.state()
    }

    /// Re-read the agent and prices, follow the contract's liquidation
    /// status, apply any transition the fresh ratios call for and top up.
    pub async fn recompute(&mut self) -> Result<HealthUpdate, AgentError> {
        let info = self
            .ctx
            .asset_manager
            .get_agent_info(&self.identity.vault)
            .await?;
        let now = self.ctx.clock.now();
        let previous = self.tracker.status();
        if info.status.is_liquidating() {
            self.tracker.apply_status(info.status, now);
        }
        let position = info.position();
        let ratios = self.tracker.compute_ratios(&position).await?;
        if !info.status.is_liquidating() && self.tracker.leave_liquidation(&ratios, now) {
            info!(vault = %self.identity.vault, contract = %info.status, "liquidation over");
        }
        let mut update = self.tracker.apply_ratios(ratios, now, false);
        update.previous = previous;
        self.publish();

        self.top_up(&position).await?;
        Ok(update)
    }

    /// Deposit vault collateral and buy pool tokens from the owner's account
    /// for every class below the top-up ratio. A rejected deposit is logged;
    /// the next price epoch tries again.
    async fn top_up(&self, position: &AgentPosition) -> Result<(), AgentError> {
        if matches!(
            self.tracker.status(),
            AgentStatus::FullLiquidation | AgentStatus::Destroying
        ) {
            return Ok(());
        }
        let needed = self
            .tracker
            .required_top_up(position, self.top_up_factor_bips)
            .await?;
        if !needed.is_needed() {
            debug!(vault = %self.identity.vault, "no top-up needed");
            return Ok(());
        }
        let asset_manager = &self.ctx.asset_manager;
        let vault = &self.identity.vault;
        let owner = &self.identity.owner;
        for (class, amount_wei) in [
            (CollateralClass::Vault, needed.vault_wei),
            (CollateralClass::Pool, needed.pool_wei),
        ] {
            if amount_wei == 0 {
                continue;
            }
            let result = match class {
                CollateralClass::Pool => {
                    asset_manager
                        .buy_collateral_pool_tokens(vault, amount_wei, owner)
                        .await
                }
                _ => {
                    asset_manager
                        .deposit_vault_collateral(vault, amount_wei, owner)
                        .await
                }
            };
            match result {
                Ok(tx) => {
                    self.ctx
                        .metrics
                        .top_ups
                        .with_label_values(&[class.as_str()])
                        .inc();
                    info!(%vault, class = class.as_str(), amount_wei, tx = %tx, "collateral topped up");
                }
                Err(e) if e.is_transient() => return Err(e.into()),
                Err(e) => {
                    warn!(%vault, class = class.as_str(), amount_wei, error = %e, "collateral top-up failed")
                }
            }
        }
        Ok(())
    }

    /// The contract reports a status; mirror it when it is reachable from ours.
    pub fn status_observed(&mut self, status: AgentStatus) -> bool {
        let changed = self.tracker.apply_status(status, self.ctx.clock.now());
        self.publish();
        changed
    }

    pub fn destroyed(&mut self) -> bool {
        let changed = self.tracker.mark_destroying(self.ctx.clock.now());
        self.publish();
        changed
    }

    fn publish(&self) {
        self.ctx
            .metrics
            .agent_status
            .set(i64::from(self.tracker.status().code()));
    }
}
