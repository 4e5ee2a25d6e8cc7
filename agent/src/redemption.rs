//! Redemption lifecycle: `START -> PAID -> REQUESTED_PROOF -> DONE`, or
//! `START -> REQUESTED_PROOF -> DONE` when the payment deadline has passed.
//!
//! Every step performs at most one transition and persists it before
//! returning.

use std::sync::Arc;

use synth_attestation::{
    AttestationHelperError, AttestationProof, AttestationRequestId, AttestationType,
};
use synth_contracts::error::REDEMPTION_ALREADY_SETTLED;
use synth_contracts::{CallHash, RedemptionRequested};
use synth_store::{AgentStore, RedemptionRecord, StoreError};
use synth_types::{Address, RedemptionState};
use synth_wallet::BlockchainWallet;
use tracing::{debug, info, warn, Instrument};

use crate::context::{stored_request, AgentContext, AgentIdentity, PendingProof};
use crate::tracing_spans::redemption_span;
use crate::AgentError;

fn payment_marker(request_id: u64) -> String {
    format!("redemption_payment/{request_id}")
}

pub struct RedemptionLifecycle {
    ctx: AgentContext,
    identity: AgentIdentity,
    store: Arc<dyn AgentStore>,
    wallet: BlockchainWallet,
}

impl RedemptionLifecycle {
    pub fn new(
        ctx: AgentContext,
        identity: AgentIdentity,
        store: Arc<dyn AgentStore>,
        wallet: BlockchainWallet,
    ) -> Self {
        Self {
            ctx,
            identity,
            store,
            wallet,
        }
    }

    pub fn redemption_requested(&self, event: &RedemptionRequested) -> Result<(), AgentError> {
        if event.agent_vault != self.identity.vault {
            return Ok(());
        }
        let record = RedemptionRecord {
            request_id: event.request_id,
            state: RedemptionState::Start,
            agent_address: self.identity.vault.clone(),
            agent_underlying_address: self.identity.underlying_address.clone(),
            payment_address: event.payment_address.clone(),
            value_uba: event.value_uba,
            fee_uba: event.fee_uba,
            payment_reference: event.payment_reference,
            first_underlying_block: event.first_underlying_block,
            last_underlying_block: event.last_underlying_block,
            last_underlying_timestamp: event.last_underlying_timestamp,
            tx_hash: None,
            proof_request: None,
        };
        match self.store.insert_redemption(&record) {
            Ok(()) => {
                info!(
                    request_id = record.request_id,
                    redeemer = %event.redeemer,
                    value = %record.value_uba,
                    "redemption requested"
                );
                self.count_transition("start");
                Ok(())
            }
            Err(StoreError::Duplicate(_)) => {
                debug!(request_id = record.request_id, "redemption already tracked");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The contract closed the redemption (performed, defaulted, blocked or failed).
    pub fn settled(&self, request_id: u64, outcome: &'static str) -> Result<(), AgentError> {
        let mut record = match self.store.get_redemption(request_id) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                debug!(request_id, outcome, "settled redemption is not tracked");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.finish(&mut record, outcome)
    }

    /// Step every open record, unpaid ones first.
    pub async fn step_open(&self) -> Result<usize, AgentError> {
        let mut open = self.store.open_redemptions(&self.identity.vault)?;
        open.sort_by_key(|r| (r.state != RedemptionState::Start, r.request_id));
        let count = open.len();
        let mut transient = None;
        for record in open {
            let request_id = record.request_id;
            if let Err(e) = self
                .step(request_id)
                .instrument(redemption_span(request_id))
                .await
            {
                self.ctx
                    .metrics
                    .step_errors
                    .with_label_values(&["redemption"])
                    .inc();
                warn!(request_id, error = %e, "redemption step failed");
                if e.is_transient() && transient.is_none() {
                    transient = Some(e);
                }
            }
        }
        match transient {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    pub async fn step(&self, request_id: u64) -> Result<RedemptionState, AgentError> {
        let mut record = self.store.get_redemption(request_id)?;
        match record.state {
            RedemptionState::Start => self.pay_or_default(&mut record).await,
            RedemptionState::Paid => self.request_payment_proof(&mut record).await,
            RedemptionState::RequestedProof => self.settle_pending(&mut record).await,
            RedemptionState::Done => Ok(record.state),
        }
    }

    async fn pay_or_default(
        &self,
        record: &mut RedemptionRecord,
    ) -> Result<RedemptionState, AgentError> {
        if self
            .ctx
            .deadline_passed(record.last_underlying_block, record.last_underlying_timestamp)
            .await?
        {
            let Some(request) = self.request_nonexistence(record).await? else {
                return Ok(record.state);
            };
            info!(
                request_id = record.request_id,
                "payment deadline passed, proving non-payment"
            );
            return self.move_to_requested_proof(record, &request);
        }

        if let Some(tx_hash) = self.existing_payment(record).await? {
            info!(request_id = record.request_id, tx = %tx_hash, "payment already on chain, not paying again");
            return self.record_payment(record, tx_hash);
        }
        let marker = payment_marker(record.request_id);
        match self.store.get_meta(&marker) {
            Ok(_) => {
                warn!(
                    request_id = record.request_id,
                    "earlier payment not seen on chain yet, not paying again"
                );
                return Ok(record.state);
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        // The marker outlives a crash or a failed write between paying and
        // recording the payment.
        self.store.put_meta(&marker, &[1])?;
        let amount = record.payment_amount();
        let tx_hash = match self
            .wallet
            .add_transaction(
                &record.agent_underlying_address,
                &record.payment_address,
                amount,
                Some(record.payment_reference),
            )
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                self.store.delete_meta(&marker)?;
                return Err(e.into());
            }
        };
        info!(request_id = record.request_id, tx = %tx_hash, %amount, "redemption paid");
        self.record_payment(record, tx_hash)
    }

    fn record_payment(
        &self,
        record: &mut RedemptionRecord,
        tx_hash: String,
    ) -> Result<RedemptionState, AgentError> {
        record.tx_hash = Some(tx_hash);
        record.transition(RedemptionState::Paid)?;
        self.store.put_redemption(record)?;
        self.store.delete_meta(&payment_marker(record.request_id))?;
        self.count_transition("paid");
        Ok(record.state)
    }

    /// A transaction from the agent's address carrying the record's reference.
    async fn existing_payment(&self, record: &RedemptionRecord) -> Result<Option<String>, AgentError> {
        let transactions = self
            .ctx
            .chain
            .get_transactions_by_reference(&record.payment_reference)
            .await?;
        Ok(transactions
            .into_iter()
            .find(|tx| !tx.spent_by(&record.agent_underlying_address).is_zero())
            .map(|tx| tx.hash))
    }

    async fn request_payment_proof(
        &self,
        record: &mut RedemptionRecord,
    ) -> Result<RedemptionState, AgentError> {
        let tx_hash = record.tx_hash.clone().ok_or_else(|| {
            StoreError::Corruption(format!("paid redemption {} has no tx hash", record.request_id))
        })?;
        if !self.ctx.is_finalized(&tx_hash).await? {
            debug!(request_id = record.request_id, tx = %tx_hash, "payment not final yet");
            return Ok(record.state);
        }
        let Some(request) = self.payment_request(record, &tx_hash).await? else {
            return Ok(record.state);
        };
        self.move_to_requested_proof(record, &request)
    }

    async fn settle_pending(
        &self,
        record: &mut RedemptionRecord,
    ) -> Result<RedemptionState, AgentError> {
        let Some(pending) = record.proof_request.clone() else {
            return self.request_again(record).await;
        };
        match self.ctx.obtain(&pending).await? {
            PendingProof::Waiting => Ok(record.state),
            PendingProof::Failed => {
                warn!(
                    request_id = record.request_id,
                    round = pending.round,
                    "proof not obtained, requesting again"
                );
                record.proof_request = None;
                self.store.put_redemption(record)?;
                Ok(record.state)
            }
            PendingProof::Proved(proof) => self.submit(record, &proof).await,
        }
    }

    /// Re-submit the proof request after a round came back without it.
    async fn request_again(
        &self,
        record: &mut RedemptionRecord,
    ) -> Result<RedemptionState, AgentError> {
        if record.tx_hash.is_none() {
            record.tx_hash = self.existing_payment(record).await?;
        }
        let request = match record.tx_hash.clone() {
            Some(tx_hash) => self.payment_request(record, &tx_hash).await?,
            None => self.request_nonexistence(record).await?,
        };
        if let Some(request) = request {
            self.ctx.proof_requested(&request);
            record.proof_request = Some(stored_request(&request));
            self.store.put_redemption(record)?;
        }
        Ok(record.state)
    }

    async fn payment_request(
        &self,
        record: &RedemptionRecord,
        tx_hash: &str,
    ) -> Result<Option<AttestationRequestId>, AgentError> {
        Ok(self
            .ctx
            .attestation
            .request_payment_proof(
                tx_hash,
                Some(&record.agent_underlying_address),
                Some(&record.payment_address),
            )
            .await?)
    }

    async fn request_nonexistence(
        &self,
        record: &RedemptionRecord,
    ) -> Result<Option<AttestationRequestId>, AgentError> {
        match self
            .ctx
            .attestation
            .request_referenced_payment_nonexistence_proof(
                &record.payment_address,
                record.payment_reference,
                record.payment_amount(),
                record.first_underlying_block,
                record.last_underlying_block,
                record.last_underlying_timestamp,
            )
            .await
        {
            Ok(request) => Ok(request),
            Err(AttestationHelperError::OverflowBlockNotFound { .. }) => {
                debug!(request_id = record.request_id, "no block past the deadline yet");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn move_to_requested_proof(
        &self,
        record: &mut RedemptionRecord,
        request: &AttestationRequestId,
    ) -> Result<RedemptionState, AgentError> {
        self.ctx.proof_requested(request);
        record.proof_request = Some(stored_request(request));
        record.transition(RedemptionState::RequestedProof)?;
        self.store.put_redemption(record)?;
        self.count_transition("requested_proof");
        info!(
            request_id = record.request_id,
            round = request.round,
            "redemption proof requested"
        );
        Ok(record.state)
    }

    async fn submit(
        &self,
        record: &mut RedemptionRecord,
        proof: &AttestationProof,
    ) -> Result<RedemptionState, AgentError> {
        let id = record.request_id;
        let from = &self.identity.owner;
        let asset_manager = &self.ctx.asset_manager;
        let (result, outcome) = match proof.attestation_type() {
            AttestationType::Payment => (
                asset_manager.confirm_redemption_payment(proof, id, from).await,
                "confirmed",
            ),
            AttestationType::ReferencedPaymentNonexistence => (
                asset_manager.redemption_payment_default(proof, id, from).await,
                "defaulted",
            ),
            other => {
                record.proof_request = None;
                self.store.put_redemption(record)?;
                return Err(AgentError::UnexpectedProof(format!("redemption {id}: {other}")));
            }
        };
        match result {
            Ok(tx) => info!(request_id = id, tx = %tx, outcome, "redemption settled on chain"),
            Err(e) if e.is_expected_revert(REDEMPTION_ALREADY_SETTLED) => {
                info!(request_id = id, reason = %e, "redemption already settled");
            }
            Err(e) => return Err(e.into()),
        }
        self.finish(record, outcome)?;
        Ok(record.state)
    }

    /// Confirm the agent's payment from `account` with an already obtained
    /// proof. Allowed once the grace period after the payment block is over.
    pub async fn confirm_on_behalf(
        &self,
        record: &RedemptionRecord,
        proof: &AttestationProof,
        account: &Address,
    ) -> Result<CallHash, AgentError> {
        let payment = proof.as_payment().ok_or_else(|| {
            AgentError::UnexpectedProof(format!(
                "redemption {}: {}",
                record.request_id,
                proof.attestation_type()
            ))
        })?;
        if payment.payment_reference != Some(record.payment_reference) {
            return Err(AgentError::UnexpectedProof(format!(
                "redemption {}: payment reference",
                record.request_id
            )));
        }
        let allowed_at = payment
            .block_timestamp
            .saturating_add(self.ctx.confirmation_grace_seconds);
        if self.ctx.clock.now().as_secs() < allowed_at {
            return Err(AgentError::ConfirmationTooEarly {
                request_id: record.request_id,
                allowed_at,
            });
        }
        let tx = self
            .ctx
            .asset_manager
            .confirm_redemption_payment(proof, record.request_id, account)
            .await?;
        info!(
            request_id = record.request_id,
            %account,
            tx = %tx,
            "redemption confirmed by non-owner"
        );
        Ok(tx)
    }

    fn finish(&self, record: &mut RedemptionRecord, outcome: &str) -> Result<(), AgentError> {
        if record.transition(RedemptionState::Done)? {
            record.proof_request = None;
            self.store.put_redemption(record)?;
            self.count_transition("done");
            info!(request_id = record.request_id, outcome, "redemption done");
        }
        Ok(())
    }

    fn count_transition(&self, state: &str) {
        self.ctx
            .metrics
            .transitions
            .with_label_values(&["redemption", state])
            .inc();
    }
}
