//! The agent bot: one actor driving an agent's mintings, redemptions and
//! health from the asset manager's event stream.

use std::sync::Arc;

use async_trait::async_trait;
use synth_contracts::{AssetManagerEvent, EventRecord};
use synth_store::AgentStore;
use synth_types::AgentStatus;
use synth_wallet::BlockchainWallet;
use tracing::{debug, warn, Instrument};

use crate::context::{AgentContext, AgentIdentity};
use crate::events::EventReader;
use crate::health_keeper::HealthKeeper;
use crate::minting::MintingLifecycle;
use crate::redemption::RedemptionLifecycle;
use crate::runner::Actor;
use crate::tracing_spans::{agent_span, health_span};
use crate::AgentError;

pub struct AgentBot {
    identity: AgentIdentity,
    events: EventReader,
    minting: MintingLifecycle,
    redemption: RedemptionLifecycle,
    health: HealthKeeper,
}

impl AgentBot {
    pub fn new(
        ctx: AgentContext,
        identity: AgentIdentity,
        store: Arc<dyn AgentStore>,
        wallet: BlockchainWallet,
        health: HealthKeeper,
    ) -> Self {
        let owner = format!("agent:{}", identity.vault);
        let events = EventReader::new(ctx.asset_manager.clone(), store.clone(), owner);
        Self {
            minting: MintingLifecycle::new(ctx.clone(), identity.clone(), store.clone()),
            redemption: RedemptionLifecycle::new(ctx, identity.clone(), store, wallet),
            identity,
            events,
            health,
        }
    }

    pub fn with_event_reader(mut self, events: EventReader) -> Self {
        self.events = events;
        self
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn minting(&self) -> &MintingLifecycle {
        &self.minting
    }

    pub fn redemption(&self) -> &RedemptionLifecycle {
        &self.redemption
    }

    pub fn health(&self) -> &HealthKeeper {
        &self.health
    }

    /// Handle every unhandled finalized event, then mark the range done.
    /// A failure leaves the range to be read again; handlers are idempotent.
    pub async fn handle_events(&mut self) -> Result<usize, AgentError> {
        let batch = self.events.read_unhandled().await?;
        let mut recompute = false;
        for record in &batch.events {
            recompute |= self.handle_event(record)?;
        }
        if recompute {
            self.recompute_health().await?;
        }
        self.events.mark_handled(&batch)?;
        Ok(batch.events.len())
    }

    /// Returns whether the event calls for a health recomputation.
    fn handle_event(&mut self, record: &EventRecord) -> Result<bool, AgentError> {
        let event = &record.event;
        if event
            .agent_vault()
            .is_some_and(|vault| vault != &self.identity.vault)
        {
            return Ok(false);
        }
        debug!(event = event.name(), block = record.block_number, "event");
        match event {
            AssetManagerEvent::CollateralReserved(e) => self.minting.reservation_created(e)?,
            AssetManagerEvent::MintingExecuted {
                collateral_reservation_id,
                ..
            } => {
                self.minting.settled(*collateral_reservation_id, "executed")?;
                return Ok(true);
            }
            AssetManagerEvent::MintingPaymentDefault {
                collateral_reservation_id,
                ..
            } => self.minting.settled(*collateral_reservation_id, "defaulted")?,
            AssetManagerEvent::CollateralReservationDeleted {
                collateral_reservation_id,
                ..
            } => self.minting.settled(*collateral_reservation_id, "unstuck")?,
            AssetManagerEvent::RedemptionRequested(e) => self.redemption.redemption_requested(e)?,
            AssetManagerEvent::RedemptionPerformed { request_id, .. } => {
                self.redemption.settled(*request_id, "performed")?
            }
            AssetManagerEvent::RedemptionDefault { request_id, .. } => {
                self.redemption.settled(*request_id, "defaulted")?
            }
            AssetManagerEvent::RedemptionPaymentBlocked { request_id, .. } => {
                self.redemption.settled(*request_id, "blocked")?
            }
            AssetManagerEvent::RedemptionPaymentFailed { request_id, .. } => {
                self.redemption.settled(*request_id, "failed")?
            }
            AssetManagerEvent::PriceEpochFinalized { .. } => return Ok(true),
            AssetManagerEvent::LiquidationStarted { .. } => {
                self.health.status_observed(AgentStatus::Liquidation);
            }
            AssetManagerEvent::FullLiquidationStarted { .. } => {
                self.health.status_observed(AgentStatus::FullLiquidation);
            }
            // Ratios are re-read with the contract's new status.
            AssetManagerEvent::LiquidationEnded { .. } => return Ok(true),
            AssetManagerEvent::AgentDestroyed { .. } => {
                self.health.destroyed();
            }
            AssetManagerEvent::UnderlyingWithdrawalConfirmed { .. } => {}
        }
        Ok(false)
    }

    /// Price or position changed. Missing prices only delay the check.
    async fn recompute_health(&mut self) -> Result<(), AgentError> {
        let span = health_span(&self.identity.vault);
        match self.health.recompute().instrument(span).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                warn!(error = %e, "health not recomputed");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Actor for AgentBot {
    fn name(&self) -> &'static str {
        "agent"
    }

    async fn step(&mut self) -> Result<(), AgentError> {
        let span = agent_span(&self.identity.vault);
        async {
            self.handle_events().await?;
            let minting = self.minting.step_open().await;
            let redemption = self.redemption.step_open().await;
            minting?;
            redemption?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}
