//! Minting lifecycle: `START -> DONE`.
//!
//! A record is created when the agent's collateral is reserved. Each step
//! either settles it with a proof (payment, non-payment or expired window)
//! or leaves it in `START` for the next tick.

use std::sync::Arc;

use synth_attestation::{
    AttestationHelperError, AttestationProof, AttestationRequestId, AttestationType,
};
use synth_chain::TxStatus;
use synth_contracts::error::MINTING_ALREADY_SETTLED;
use synth_contracts::CollateralReserved;
use synth_store::{AgentStore, MintingRecord, StoreError};
use synth_types::MintingState;
use tracing::{debug, info, warn, Instrument};

use crate::context::{stored_request, AgentContext, AgentIdentity, PendingProof};
use crate::tracing_spans::minting_span;
use crate::AgentError;

/// Where a stored proof left the record.
enum Settled {
    State(MintingState),
    /// A block-height proof showed the deadline is still inside the query window.
    InWindow,
}

pub struct MintingLifecycle {
    ctx: AgentContext,
    identity: AgentIdentity,
    store: Arc<dyn AgentStore>,
}

impl MintingLifecycle {
    pub fn new(ctx: AgentContext, identity: AgentIdentity, store: Arc<dyn AgentStore>) -> Self {
        Self {
            ctx,
            identity,
            store,
        }
    }

    /// Start tracking a reservation against this agent. Seeing the same
    /// event twice is harmless.
    pub fn reservation_created(&self, event: &CollateralReserved) -> Result<(), AgentError> {
        if event.agent_vault != self.identity.vault {
            return Ok(());
        }
        let record = MintingRecord {
            request_id: event.collateral_reservation_id,
            state: MintingState::Start,
            agent_address: self.identity.vault.clone(),
            agent_underlying_address: self.identity.underlying_address.clone(),
            value_uba: event.value_uba,
            fee_uba: event.fee_uba,
            first_underlying_block: event.first_underlying_block,
            last_underlying_block: event.last_underlying_block,
            last_underlying_timestamp: event.last_underlying_timestamp,
            payment_reference: event.payment_reference,
            proof_request: None,
        };
        match self.store.insert_minting(&record) {
            Ok(()) => {
                info!(
                    request_id = record.request_id,
                    value = %record.value_uba,
                    fee = %record.fee_uba,
                    last_block = record.last_underlying_block,
                    "minting started"
                );
                self.count_transition("start");
                Ok(())
            }
            Err(StoreError::Duplicate(_)) => {
                debug!(request_id = record.request_id, "minting already tracked");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The contract reports the reservation settled (`outcome` names how).
    pub fn settled(&self, request_id: u64, outcome: &'static str) -> Result<(), AgentError> {
        let mut record = match self.store.get_minting(request_id) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                debug!(request_id, outcome, "settled minting is not tracked");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.finish(&mut record, outcome)
    }

    /// Step every open record. A failing record does not stop the others;
    /// the first transient failure is returned so the caller can back off.
    pub async fn step_open(&self) -> Result<usize, AgentError> {
        let open = self.store.open_mintings(&self.identity.vault)?;
        let count = open.len();
        let mut transient = None;
        for record in open {
            let request_id = record.request_id;
            if let Err(e) = self.step(request_id).instrument(minting_span(request_id)).await {
                self.ctx
                    .metrics
                    .step_errors
                    .with_label_values(&["minting"])
                    .inc();
                warn!(request_id, error = %e, "minting step failed");
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

    /// Advance one record as far as the chain and the attestation network allow.
    ///
    /// Every attestation request is stored on the record before its round is
    /// awaited, so a restart or a slow round picks it up on a later step.
    pub async fn step(&self, request_id: u64) -> Result<MintingState, AgentError> {
        let mut record = self.store.get_minting(request_id)?;
        if record.is_done() {
            return Ok(record.state);
        }
        if record.proof_request.is_none() && !self.request_proof(&mut record).await? {
            return Ok(record.state);
        }
        match self.settle_pending(&mut record).await? {
            Settled::State(state) => return Ok(state),
            Settled::InWindow => {}
        }

        info!(request_id, "minting not paid in time, proving non-payment");
        if !self.request_non_payment(&mut record).await? {
            return Ok(record.state);
        }
        match self.settle_pending(&mut record).await? {
            Settled::State(state) => Ok(state),
            Settled::InWindow => Ok(record.state),
        }
    }

    /// Submit the request the record needs next: a payment proof once the
    /// payment is final, or a block-height proof once the deadline passed.
    /// True when a request is stored and its round is final.
    async fn request_proof(&self, record: &mut MintingRecord) -> Result<bool, AgentError> {
        let request_id = record.request_id;
        if let Some(tx_hash) = self.find_payment(record).await? {
            if !self.ctx.is_finalized(&tx_hash).await? {
                debug!(request_id, tx = %tx_hash, "minting payment not final yet");
                return Ok(false);
            }
            let request = self
                .ctx
                .attestation
                .request_payment_proof(&tx_hash, None, Some(&record.agent_underlying_address))
                .await?;
            return self.keep_request(record, request).await;
        }

        if !self
            .ctx
            .deadline_passed(record.last_underlying_block, record.last_underlying_timestamp)
            .await?
        {
            return Ok(false);
        }
        // Whether the deadline already left the attestation window decides
        // between unsticking and proving non-payment.
        let request = self
            .ctx
            .attestation
            .request_confirmed_block_height_exists_proof(self.ctx.query_window_seconds)
            .await?;
        self.keep_request(record, request).await
    }

    async fn request_non_payment(&self, record: &mut MintingRecord) -> Result<bool, AgentError> {
        let request = match self
            .ctx
            .attestation
            .request_referenced_payment_nonexistence_proof(
                &record.agent_underlying_address,
                record.payment_reference,
                record.total_uba(),
                record.first_underlying_block,
                record.last_underlying_block,
                record.last_underlying_timestamp,
            )
            .await
        {
            Ok(request) => request,
            Err(AttestationHelperError::OverflowBlockNotFound { .. }) => {
                debug!(request_id = record.request_id, "no block past the payment deadline yet");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        self.keep_request(record, request).await
    }

    /// A successful payment of the full amount with the record's reference.
    async fn find_payment(&self, record: &MintingRecord) -> Result<Option<String>, AgentError> {
        let transactions = self
            .ctx
            .chain
            .get_transactions_by_reference(&record.payment_reference)
            .await?;
        Ok(transactions
            .into_iter()
            .find(|tx| {
                tx.status == TxStatus::Success
                    && tx.received_by(&record.agent_underlying_address) >= record.total_uba()
            })
            .map(|tx| tx.hash))
    }

    /// Persist the submitted request, then wait for its round. False when the
    /// network declined it or the round is still open.
    async fn keep_request(
        &self,
        record: &mut MintingRecord,
        request: Option<AttestationRequestId>,
    ) -> Result<bool, AgentError> {
        let Some(request) = request else {
            warn!(request_id = record.request_id, "attestation request declined");
            return Ok(false);
        };
        self.ctx.proof_requested(&request);
        record.proof_request = Some(stored_request(&request));
        self.store.put_minting(record)?;

        match self.ctx.attestation.wait_for_round_finalization(request.round).await {
            Ok(()) => Ok(true),
            Err(AttestationHelperError::TimedOut(_)) => {
                info!(
                    request_id = record.request_id,
                    round = request.round,
                    "round not finalized yet, keeping proof request"
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn settle_pending(&self, record: &mut MintingRecord) -> Result<Settled, AgentError> {
        let Some(pending) = record.proof_request.clone() else {
            return Ok(Settled::State(record.state));
        };
        let proof = match self.ctx.obtain(&pending).await? {
            PendingProof::Waiting => return Ok(Settled::State(record.state)),
            PendingProof::Failed => {
                warn!(
                    request_id = record.request_id,
                    round = pending.round,
                    "proof not obtained, requesting again"
                );
                record.proof_request = None;
                self.store.put_minting(record)?;
                return Ok(Settled::State(record.state));
            }
            PendingProof::Proved(proof) => *proof,
        };
        if proof.attestation_type() == AttestationType::ConfirmedBlockHeightExists {
            let request_id = record.request_id;
            if !self.ctx.window_passed(
                &proof,
                record.last_underlying_block,
                record.last_underlying_timestamp,
            ) {
                debug!(request_id, "payment window still attestable");
                record.proof_request = None;
                self.store.put_minting(record)?;
                return Ok(Settled::InWindow);
            }
            info!(request_id, "payment window left the attestation window, unsticking");
        }
        self.submit(record, proof).await.map(Settled::State)
    }

    async fn submit(
        &self,
        record: &mut MintingRecord,
        proof: AttestationProof,
    ) -> Result<MintingState, AgentError> {
        let id = record.request_id;
        let from = &self.identity.owner;
        let asset_manager = &self.ctx.asset_manager;
        let (result, outcome) = match proof.attestation_type() {
            AttestationType::Payment => (
                asset_manager.execute_minting(&proof, id, from).await,
                "executed",
            ),
            AttestationType::ReferencedPaymentNonexistence => (
                asset_manager.minting_payment_default(&proof, id, from).await,
                "defaulted",
            ),
            AttestationType::ConfirmedBlockHeightExists => {
                (asset_manager.unstick_minting(&proof, id, from).await, "unstuck")
            }
            other => {
                record.proof_request = None;
                self.store.put_minting(record)?;
                return Err(AgentError::UnexpectedProof(format!("minting {id}: {other}")));
            }
        };
        match result {
            Ok(tx) => info!(request_id = id, tx = %tx, outcome, "minting settled on chain"),
            Err(e) if e.is_expected_revert(MINTING_ALREADY_SETTLED) => {
                info!(request_id = id, reason = %e, "minting already settled");
            }
            Err(e) => return Err(e.into()),
        }
        self.finish(record, outcome)?;
        Ok(record.state)
    }

    fn finish(&self, record: &mut MintingRecord, outcome: &str) -> Result<(), AgentError> {
        if record.transition(MintingState::Done)? {
            self.store.put_minting(record)?;
            self.count_transition("done");
            info!(request_id = record.request_id, outcome, "minting done");
        }
        Ok(())
    }

    fn count_transition(&self, state: &str) {
        self.ctx
            .metrics
            .transitions
            .with_label_values(&["minting", state])
            .inc();
    }
}
