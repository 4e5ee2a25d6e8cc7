//! Account-model chains (ALGO): sender pays `amount + fee` to one receiver.

use synth_types::SourceId;

use crate::adapter::{ChainFormatAdapter, PrevoutMap};
use crate::error::ChainError;
use crate::types::{ChainTransaction, TxInputOutput, TxStatus};
use crate::wire::{amount_field, IndexerTransaction};

#[derive(Clone, Debug)]
pub struct AccountAdapter {
    source: SourceId,
}

impl AccountAdapter {
    pub fn new(source: SourceId) -> Self {
        Self { source }
    }
}

impl ChainFormatAdapter for AccountAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    fn decode(
        &self,
        raw: &IndexerTransaction,
        _prevouts: &PrevoutMap,
    ) -> Result<ChainTransaction, ChainError> {
        let body = raw.body();
        let amount = amount_field(&body["amount"], "amount")?;
        let fee = amount_field(&body["fee"], "fee")?;
        let spent = amount
            .checked_add(fee)
            .ok_or_else(|| ChainError::decode("amount", "amount plus fee overflows"))?;
        let sender = body["sender"].as_str().unwrap_or_default();
        let receiver = body["receiver"].as_str().unwrap_or_default();

        Ok(ChainTransaction {
            hash: self.source.normalize_tx_hash(&raw.transaction_id),
            inputs: vec![TxInputOutput::new(sender, spent)],
            outputs: vec![TxInputOutput::new(receiver, amount)],
            reference: raw.reference(),
            status: self.success_status(raw)?,
        })
    }

    /// Only executed transactions are indexed.
    fn success_status(&self, _raw: &IndexerTransaction) -> Result<TxStatus, ChainError> {
        Ok(TxStatus::Success)
    }
}
