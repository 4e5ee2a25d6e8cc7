//! Read-only watcher that challenges agents paying from their underlying
//! address without cause.
//!
//! The challenger follows asset manager events to learn which payments are
//! legitimate (open redemptions, announced withdrawals) and scans finalized
//! underlying blocks for transactions spending from tracked agents. Three
//! offences are challenged with balance-decreasing proofs: an illegal
//! payment, two payments with the same reference, and unconfirmed payments
//! that together exceed the agent's free underlying balance.
//!
//! A check or challenge that fails with an unexpected error is queued and
//! retried on the next steps, so one stuck agent never stops the scan.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use synth_attestation::{transaction_id_bytes, AttestationProof};
use synth_chain::ChainTransaction;
use synth_contracts::error::{
    DOUBLE_PAYMENT_EXPECTED, FREE_BALANCE_EXPECTED, ILLEGAL_PAYMENT_EXPECTED,
};
use synth_contracts::{AssetManagerEvent, CallHash, ContractError};
use synth_store::{AgentStore, StoreError};
use synth_types::{Address, AgentStatus, Bytes32, PaymentReference, UbaAmount};
use tracing::{debug, error, info, warn, Instrument};

use crate::context::AgentContext;
use crate::events::EventReader;
use crate::runner::Actor;
use crate::tracing_spans::challenger_span;
use crate::AgentError;

const UNDERLYING_CURSOR_KEY: &str = "challenger.underlying_block";
const EVENT_OWNER: &str = "challenger";
/// Most payments bundled into one free-balance challenge.
const MAX_FREE_BALANCE_PAYMENTS: usize = 50;
/// Attempts of one queued check or challenge before it is dropped.
const MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
struct TrackedAgent {
    underlying_address: String,
    status: AgentStatus,
}

#[derive(Clone, Debug)]
struct ActiveRedemption {
    agent: Address,
    amount: UbaAmount,
}

/// Work that failed and is tried again on the next step.
#[derive(Clone, Debug)]
enum Retry {
    /// Whether `tx` is a legal payment of `vault` could not be decided.
    Legality { vault: Address, tx: ChainTransaction },
    FreeBalance { vault: Address },
    Challenge {
        kind: ChallengeKind,
        vault: Address,
        tx_hashes: Vec<String>,
    },
}

impl Retry {
    fn label(&self) -> &'static str {
        match self {
            Self::Legality { .. } => ChallengeKind::IllegalPayment.name(),
            Self::FreeBalance { .. } => ChallengeKind::FreeBalanceNegative.name(),
            Self::Challenge { kind, .. } => kind.name(),
        }
    }

    fn vault(&self) -> &Address {
        match self {
            Self::Legality { vault, .. }
            | Self::FreeBalance { vault }
            | Self::Challenge { vault, .. } => vault,
        }
    }
}

#[derive(Debug)]
struct Queued {
    work: Retry,
    attempts: u32,
}

/// Kind of offence found on the underlying chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeKind {
    IllegalPayment,
    DoublePayment,
    FreeBalanceNegative,
}

impl ChallengeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::IllegalPayment => "illegal_payment",
            Self::DoublePayment => "double_payment",
            Self::FreeBalanceNegative => "free_balance_negative",
        }
    }

    fn expected_reverts(self) -> &'static [&'static str] {
        match self {
            Self::IllegalPayment => ILLEGAL_PAYMENT_EXPECTED,
            Self::DoublePayment => DOUBLE_PAYMENT_EXPECTED,
            Self::FreeBalanceNegative => FREE_BALANCE_EXPECTED,
        }
    }
}

pub struct Challenger {
    ctx: AgentContext,
    address: Address,
    store: Arc<dyn AgentStore>,
    events: EventReader,
    agents: HashMap<Address, TrackedAgent>,
    active_redemptions: HashMap<PaymentReference, ActiveRedemption>,
    transaction_for_reference: HashMap<PaymentReference, String>,
    unconfirmed: HashMap<Address, BTreeMap<Bytes32, ChainTransaction>>,
    retries: VecDeque<Queued>,
}

impl Challenger {
    pub fn new(ctx: AgentContext, address: Address, store: Arc<dyn AgentStore>) -> Self {
        let events = EventReader::new(ctx.asset_manager.clone(), store.clone(), EVENT_OWNER);
        Self {
            ctx,
            address,
            store,
            events,
            agents: HashMap::new(),
            active_redemptions: HashMap::new(),
            transaction_for_reference: HashMap::new(),
            unconfirmed: HashMap::new(),
            retries: VecDeque::new(),
        }
    }

    pub fn with_event_reader(mut self, events: EventReader) -> Self {
        self.events = events;
        self
    }

    /// Start watching `vault`. Agents the contract does not know are skipped.
    pub async fn track(&mut self, vault: &Address) -> Result<bool, AgentError> {
        if self.agents.contains_key(vault) {
            return Ok(true);
        }
        match self.ctx.asset_manager.get_agent_info(vault).await {
            Ok(info) => {
                info!(%vault, underlying = %info.underlying_address, "tracking agent");
                self.agents.insert(
                    vault.clone(),
                    TrackedAgent {
                        underlying_address: info.underlying_address,
                        status: info.status,
                    },
                );
                Ok(true)
            }
            Err(ContractError::UnknownAgent(_)) => {
                debug!(%vault, "not an agent, ignoring");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_tracking(&self, vault: &Address) -> bool {
        self.agents.contains_key(vault)
    }

    /// First transaction seen paying `reference`, while its redemption is open.
    pub fn payment_for_reference(&self, reference: &PaymentReference) -> Option<&str> {
        self.transaction_for_reference
            .get(reference)
            .map(String::as_str)
    }

    /// Checks and challenges waiting for another attempt.
    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    async fn handle_events(&mut self) -> Result<(), AgentError> {
        let batch = self.events.read_unhandled().await?;
        for record in &batch.events {
            self.handle_event(&record.event).await?;
        }
        self.events.mark_handled(&batch)
    }

    async fn handle_event(&mut self, event: &AssetManagerEvent) -> Result<(), AgentError> {
        if let Some(vault) = event.agent_vault() {
            if !matches!(event, AssetManagerEvent::AgentDestroyed { .. })
                && !self.track(vault).await?
            {
                return Ok(());
            }
        }
        match event {
            AssetManagerEvent::RedemptionRequested(e) => {
                self.active_redemptions.insert(
                    e.payment_reference,
                    ActiveRedemption {
                        agent: e.agent_vault.clone(),
                        amount: e.value_uba,
                    },
                );
            }
            AssetManagerEvent::RedemptionPerformed {
                agent_vault,
                request_id,
                transaction_hash,
            }
            | AssetManagerEvent::RedemptionPaymentBlocked {
                agent_vault,
                request_id,
                transaction_hash,
            }
            | AssetManagerEvent::RedemptionPaymentFailed {
                agent_vault,
                request_id,
                transaction_hash,
            } => {
                self.redemption_finished(*request_id);
                self.confirmed(agent_vault, transaction_hash);
            }
            AssetManagerEvent::RedemptionDefault { request_id, .. } => {
                self.redemption_finished(*request_id);
            }
            AssetManagerEvent::UnderlyingWithdrawalConfirmed {
                agent_vault,
                transaction_hash,
                ..
            } => {
                self.confirmed(agent_vault, transaction_hash);
                self.run_or_queue(
                    Retry::FreeBalance {
                        vault: agent_vault.clone(),
                    },
                    0,
                )
                .await;
            }
            AssetManagerEvent::LiquidationStarted { agent_vault, .. } => {
                self.set_status(agent_vault, AgentStatus::Liquidation);
            }
            AssetManagerEvent::FullLiquidationStarted { agent_vault, .. } => {
                self.set_status(agent_vault, AgentStatus::FullLiquidation);
            }
            AssetManagerEvent::LiquidationEnded { agent_vault } => {
                self.set_status(agent_vault, AgentStatus::Normal);
            }
            AssetManagerEvent::AgentDestroyed { agent_vault } => {
                self.agents.remove(agent_vault);
                self.unconfirmed.remove(agent_vault);
                self.retries.retain(|q| q.work.vault() != agent_vault);
                info!(vault = %agent_vault, "agent destroyed, no longer tracked");
            }
            _ => {}
        }
        Ok(())
    }

    /// Any later payment with this reference is illegal, not double.
    fn redemption_finished(&mut self, request_id: u64) {
        let reference = PaymentReference::redemption(request_id);
        self.active_redemptions.remove(&reference);
        self.transaction_for_reference.remove(&reference);
    }

    fn set_status(&mut self, vault: &Address, status: AgentStatus) {
        if let Some(agent) = self.agents.get_mut(vault) {
            agent.status = status;
        }
    }

    /// The contract accepted the payment; it no longer counts against the
    /// free balance.
    fn confirmed(&mut self, vault: &Address, transaction_hash: &str) {
        if let Some(pending) = self.unconfirmed.get_mut(vault) {
            pending.remove(&transaction_id_bytes(transaction_hash));
        }
    }

    /// Scan finalized underlying blocks not seen before. Once the range is
    /// fetched the cursor moves past it; failed checks wait in the retry queue.
    async fn scan_underlying(&mut self) -> Result<(), AgentError> {
        let height = self.ctx.chain.get_block_height().await?;
        let finalized = height.saturating_sub(self.ctx.chain.finalization_blocks());
        let from = match self.underlying_cursor()? {
            Some(next) => next,
            None => finalized,
        };
        if from > finalized {
            return Ok(());
        }
        let transactions = self
            .ctx
            .chain
            .get_transactions_within_block_range(from, finalized)
            .await?;
        debug!(from, to = finalized, count = transactions.len(), "underlying blocks scanned");
        for tx in transactions {
            self.transaction_seen(tx).await;
        }
        self.set_underlying_cursor(finalized + 1)
    }

    fn underlying_cursor(&self) -> Result<Option<u64>, AgentError> {
        match self.store.get_meta(UNDERLYING_CURSOR_KEY) {
            Ok(bytes) => {
                let raw = <[u8; 8]>::try_from(bytes.as_slice()).map_err(|_| {
                    StoreError::Corruption(format!("{UNDERLYING_CURSOR_KEY}: {} bytes", bytes.len()))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_underlying_cursor(&self, next: u64) -> Result<(), AgentError> {
        self.store
            .put_meta(UNDERLYING_CURSOR_KEY, &next.to_be_bytes())?;
        Ok(())
    }

    /// Check one underlying transaction against every tracked agent it spends from.
    pub async fn transaction_seen(&mut self, tx: ChainTransaction) {
        let spenders: Vec<Address> = self
            .agents
            .iter()
            .filter(|(_, agent)| tx.spends_from(&agent.underlying_address))
            .map(|(vault, _)| vault.clone())
            .collect();
        for vault in spenders {
            self.unconfirmed
                .entry(vault.clone())
                .or_default()
                .insert(transaction_id_bytes(&tx.hash), tx.clone());
            self.run_or_queue(
                Retry::Legality {
                    vault: vault.clone(),
                    tx: tx.clone(),
                },
                0,
            )
            .await;
            if let Some(first) = self.duplicate_of(&tx) {
                let challenge = Retry::Challenge {
                    kind: ChallengeKind::DoublePayment,
                    vault: vault.clone(),
                    tx_hashes: vec![first, tx.hash.clone()],
                };
                self.run_or_queue(challenge, 0).await;
            }
            self.run_or_queue(Retry::FreeBalance { vault }, 0).await;
        }
    }

    /// Run `work` and whatever challenge it finds. A failure is queued until
    /// `MAX_ATTEMPTS` is reached.
    async fn run_or_queue(&mut self, work: Retry, attempts: u32) {
        let mut work = work;
        let mut attempts = attempts;
        loop {
            match self.attempt(&work).await {
                Ok(Some(next)) => {
                    work = next;
                    attempts = 0;
                }
                Ok(None) => return,
                Err(e) => {
                    self.ctx
                        .metrics
                        .challenge_failures
                        .with_label_values(&[work.label()])
                        .inc();
                    let attempts = attempts + 1;
                    if attempts >= MAX_ATTEMPTS {
                        error!(vault = %work.vault(), kind = work.label(), attempts, error = %e, "giving up");
                    } else {
                        warn!(vault = %work.vault(), kind = work.label(), attempts, error = %e, "will retry");
                        self.retries.push_back(Queued { work, attempts });
                    }
                    return;
                }
            }
        }
    }

    /// One try of `work`. Checks return the challenge they call for.
    async fn attempt(&mut self, work: &Retry) -> Result<Option<Retry>, AgentError> {
        match work {
            Retry::Legality { vault, tx } => {
                if !self.is_illegal(vault, tx).await? {
                    return Ok(None);
                }
                Ok(Some(Retry::Challenge {
                    kind: ChallengeKind::IllegalPayment,
                    vault: vault.clone(),
                    tx_hashes: vec![tx.hash.clone()],
                }))
            }
            Retry::FreeBalance { vault } => self.check_free_balance(vault).await,
            Retry::Challenge {
                kind,
                vault,
                tx_hashes,
            } => {
                let underlying = self.underlying_of(vault);
                self.challenge(*kind, vault, tx_hashes, &underlying).await?;
                Ok(None)
            }
        }
    }

    async fn run_retries(&mut self) {
        let queued: Vec<Queued> = self.retries.drain(..).collect();
        if !queued.is_empty() {
            debug!(count = queued.len(), "retrying failed checks");
        }
        for Queued { work, attempts } in queued {
            if self.is_tracking(work.vault()) {
                self.run_or_queue(work, attempts).await;
            }
        }
    }

    fn underlying_of(&self, vault: &Address) -> String {
        self.agents
            .get(vault)
            .map(|a| a.underlying_address.clone())
            .unwrap_or_default()
    }

    /// A payment is legal when it carries a valid reference of an open
    /// redemption of the agent or of its announced withdrawal.
    async fn is_illegal(&self, vault: &Address, tx: &ChainTransaction) -> Result<bool, AgentError> {
        let Some(reference) = tx.reference.filter(PaymentReference::is_valid) else {
            return Ok(true);
        };
        if self
            .active_redemptions
            .get(&reference)
            .is_some_and(|r| &r.agent == vault)
        {
            return Ok(false);
        }
        let info = self.ctx.asset_manager.get_agent_info(vault).await?;
        Ok(info
            .announced_withdrawal()
            .map_or(true, |id| reference != PaymentReference::announced_withdrawal(id)))
    }

    /// Earlier transaction with the same valid reference, if any. The first
    /// transaction seen for a reference is remembered.
    fn duplicate_of(&mut self, tx: &ChainTransaction) -> Option<String> {
        let reference = tx.reference.filter(PaymentReference::is_valid)?;
        match self.transaction_for_reference.get(&reference) {
            Some(first) if transaction_id_bytes(first) != transaction_id_bytes(&tx.hash) => {
                Some(first.clone())
            }
            Some(_) => None,
            None => {
                self.transaction_for_reference
                    .insert(reference, tx.hash.clone());
                None
            }
        }
    }

    async fn check_free_balance(&self, vault: &Address) -> Result<Option<Retry>, AgentError> {
        let Some(agent) = self.agents.get(vault) else {
            return Ok(None);
        };
        let underlying = agent.underlying_address.clone();
        let Some(pending) = self.unconfirmed.get(vault).filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        let info = self.ctx.asset_manager.get_agent_info(vault).await?;
        let withdrawal = info
            .announced_withdrawal()
            .map(PaymentReference::announced_withdrawal);
        let mut spends: Vec<(i128, String)> = pending
            .values()
            .filter_map(|tx| {
                self.balance_decrease(vault, &underlying, withdrawal.as_ref(), tx)
                    .map(|net| (net, tx.hash.clone()))
            })
            .filter(|(net, _)| *net > 0)
            .collect();
        spends.sort_by(|a, b| b.0.cmp(&a.0));
        spends.truncate(MAX_FREE_BALANCE_PAYMENTS);
        let total: i128 = spends.iter().map(|(net, _)| net).sum();

        if total <= info.free_underlying_balance_uba {
            return Ok(None);
        }
        info!(
            %vault,
            total,
            free = info.free_underlying_balance_uba,
            payments = spends.len(),
            "unconfirmed spending exceeds free balance"
        );
        Ok(Some(Retry::Challenge {
            kind: ChallengeKind::FreeBalanceNegative,
            vault: vault.clone(),
            tx_hashes: spends.into_iter().map(|(_, hash)| hash).collect(),
        }))
    }

    /// What the transaction takes out of the agent's free balance. Only
    /// payments of an open redemption (less the redemption value) and of the
    /// announced withdrawal count; anything else is an illegal payment and
    /// is challenged as one.
    fn balance_decrease(
        &self,
        vault: &Address,
        underlying: &str,
        withdrawal: Option<&PaymentReference>,
        tx: &ChainTransaction,
    ) -> Option<i128> {
        let reference = tx.reference.filter(PaymentReference::is_valid)?;
        let net = to_i128(tx.spent_by(underlying)) - to_i128(tx.received_by(underlying));
        if let Some(redemption) = self
            .active_redemptions
            .get(&reference)
            .filter(|r| &r.agent == vault)
        {
            return Some(net - to_i128(redemption.amount));
        }
        (withdrawal == Some(&reference)).then_some(net)
    }

    /// Prove `tx_hashes` and submit the challenge. An agent already in full
    /// liquidation is not challenged again.
    async fn challenge(
        &mut self,
        kind: ChallengeKind,
        vault: &Address,
        tx_hashes: &[String],
        underlying: &str,
    ) -> Result<(), AgentError> {
        if self
            .agents
            .get(vault)
            .map_or(true, |a| a.status == AgentStatus::FullLiquidation)
        {
            debug!(%vault, kind = kind.name(), "agent already in full liquidation");
            return Ok(());
        }
        let mut proofs = Vec::with_capacity(tx_hashes.len());
        for hash in tx_hashes {
            proofs.push(self.prove(hash, underlying).await?);
        }

        let asset_manager = &self.ctx.asset_manager;
        let from = &self.address;
        let result: Result<CallHash, ContractError> = match (kind, proofs.as_slice()) {
            (ChallengeKind::IllegalPayment, [proof]) => {
                asset_manager.illegal_payment_challenge(proof, vault, from).await
            }
            (ChallengeKind::DoublePayment, [first, second]) => {
                asset_manager
                    .double_payment_challenge(first, second, vault, from)
                    .await
            }
            (ChallengeKind::FreeBalanceNegative, proofs) => {
                asset_manager
                    .free_balance_negative_challenge(proofs, vault, from)
                    .await
            }
            (kind, proofs) => {
                return Err(AgentError::UnexpectedProof(format!(
                    "{} challenge with {} proofs",
                    kind.name(),
                    proofs.len()
                )))
            }
        };
        match result {
            Ok(tx) => {
                self.ctx
                    .metrics
                    .challenges
                    .with_label_values(&[kind.name()])
                    .inc();
                self.set_status(vault, AgentStatus::FullLiquidation);
                info!(%vault, kind = kind.name(), tx = %tx, "agent challenged");
            }
            Err(e) if e.is_expected_revert(kind.expected_reverts()) => {
                info!(%vault, kind = kind.name(), reason = %e, "challenge not needed");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn prove(&self, tx_hash: &str, underlying: &str) -> Result<AttestationProof, AgentError> {
        let proof = self
            .ctx
            .attestation
            .prove_balance_decreasing_transaction(tx_hash, underlying)
            .await?;
        self.ctx
            .metrics
            .proofs_obtained
            .with_label_values(&[proof.attestation_type().name()])
            .inc();
        Ok(proof)
    }
}

fn to_i128(amount: UbaAmount) -> i128 {
    i128::try_from(amount.raw()).unwrap_or(i128::MAX)
}

#[async_trait]
impl Actor for Challenger {
    fn name(&self) -> &'static str {
        "challenger"
    }

    async fn step(&mut self) -> Result<(), AgentError> {
        let span = challenger_span(&self.address);
        async {
            self.handle_events().await?;
            self.run_retries().await;
            self.scan_underlying().await
        }
        .instrument(span)
        .await
    }
}
