//! Protocol-wide keeper of agent liquidation.
//!
//! Any account may move an unhealthy agent into the collateral call band or
//! liquidation, and end it once the agent is healthy again. The keeper
//! re-checks every known agent after each finalized price epoch and one
//! agent after it minted. Agents are configured up front or learned from
//! events. A failed check is logged and the other agents are still checked.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use synth_collateral::{AgentHealthState, AssetSettings, HealthTracker, PriceReader};
use synth_contracts::{AssetManagerEvent, ContractError};
use synth_store::AgentStore;
use synth_types::{Address, AgentStatus};
use tracing::{debug, info, warn, Instrument};

use crate::context::AgentContext;
use crate::events::EventReader;
use crate::runner::Actor;
use crate::tracing_spans::system_keeper_span;
use crate::AgentError;

const EVENT_OWNER: &str = "system_keeper";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LiquidationCall {
    Start,
    End,
}

impl LiquidationCall {
    fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

pub struct SystemKeeper {
    ctx: AgentContext,
    address: Address,
    prices: PriceReader,
    events: EventReader,
    settings: Option<AssetSettings>,
    agents: HashMap<Address, HealthTracker>,
}

impl SystemKeeper {
    pub fn new(
        ctx: AgentContext,
        address: Address,
        store: Arc<dyn AgentStore>,
        prices: PriceReader,
    ) -> Self {
        let events = EventReader::new(ctx.asset_manager.clone(), store, EVENT_OWNER);
        Self {
            ctx,
            address,
            prices,
            events,
            settings: None,
            agents: HashMap::new(),
        }
    }

    pub fn with_event_reader(mut self, events: EventReader) -> Self {
        self.events = events;
        self
    }

    pub fn is_tracking(&self, vault: &Address) -> bool {
        self.agents.contains_key(vault)
    }

    /// Start keeping `vault`. Addresses the contract does not know are skipped.
    pub async fn track(&mut self, vault: &Address) -> Result<bool, AgentError> {
        if self.agents.contains_key(vault) {
            return Ok(true);
        }
        let asset_manager = self.ctx.asset_manager.clone();
        let info = match asset_manager.get_agent_info(vault).await {
            Ok(info) => info,
            Err(ContractError::UnknownAgent(_)) => {
                debug!(%vault, "not an agent, ignoring");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        let settings = match &self.settings {
            Some(settings) => settings.clone(),
            None => {
                let settings = asset_manager.asset_settings().await?;
                self.settings = Some(settings.clone());
                settings
            }
        };
        let types = asset_manager.agent_collateral_types(vault).await?;
        let state = AgentHealthState::new(vault.clone(), info.status, self.ctx.clock.now());
        let tracker =
            HealthTracker::new(self.prices.clone(), settings, types.vault, types.pool, state)?;
        info!(%vault, status = %info.status, "keeping agent");
        self.agents.insert(vault.clone(), tracker);
        Ok(true)
    }

    async fn handle_events(&mut self) -> Result<(), AgentError> {
        let batch = self.events.read_unhandled().await?;
        let mut all = false;
        let mut minted = BTreeSet::new();
        for record in &batch.events {
            match &record.event {
                AssetManagerEvent::PriceEpochFinalized { .. } => all = true,
                AssetManagerEvent::AgentDestroyed { agent_vault } => {
                    self.agents.remove(agent_vault);
                    minted.remove(agent_vault);
                }
                AssetManagerEvent::MintingExecuted { agent_vault, .. } => {
                    if self.track(agent_vault).await? {
                        minted.insert(agent_vault.clone());
                    }
                }
                event => {
                    if let Some(vault) = event.agent_vault() {
                        self.track(vault).await?;
                    }
                }
            }
        }
        let due: Vec<Address> = if all {
            self.agents.keys().cloned().collect()
        } else {
            minted.into_iter().collect()
        };
        for vault in due {
            if let Err(e) = self.check_agent(&vault).await {
                warn!(%vault, error = %e, "agent not checked");
            }
        }
        self.events.mark_handled(&batch)
    }

    /// Compare the contract's status of `vault` with what fresh ratios call
    /// for, and start or end liquidation when they differ.
    pub async fn check_agent(&self, vault: &Address) -> Result<(), AgentError> {
        let Some(tracker) = self.agents.get(vault) else {
            return Ok(());
        };
        let info = self.ctx.asset_manager.get_agent_info(vault).await?;
        let now = self.ctx.clock.now();
        let ratios = tracker.compute_ratios(&info.position()).await?;
        let next = tracker.contract_transition(info.status, info.ccb_start_timestamp, &ratios, now);
        let call = match (info.status, next) {
            (AgentStatus::Normal, AgentStatus::Ccb | AgentStatus::Liquidation)
            | (AgentStatus::Ccb, AgentStatus::Liquidation) => LiquidationCall::Start,
            (AgentStatus::Ccb | AgentStatus::Liquidation, AgentStatus::Normal) => {
                LiquidationCall::End
            }
            _ => {
                debug!(%vault, status = %info.status, ?ratios, "agent status holds");
                return Ok(());
            }
        };

        let asset_manager = &self.ctx.asset_manager;
        let result = match call {
            LiquidationCall::Start => asset_manager.start_liquidation(vault, &self.address).await,
            LiquidationCall::End => asset_manager.end_liquidation(vault, &self.address).await,
        };
        let tx = result?;
        self.ctx
            .metrics
            .liquidation_calls
            .with_label_values(&[call.name()])
            .inc();
        info!(%vault, from = %info.status, to = %next, action = call.name(), tx = %tx, "liquidation call sent");
        Ok(())
    }
}

#[async_trait]
impl Actor for SystemKeeper {
    fn name(&self) -> &'static str {
        "system_keeper"
    }

    async fn step(&mut self) -> Result<(), AgentError> {
        let span = system_keeper_span(&self.address);
        self.handle_events().instrument(span).await
    }
}
