//! XRP ledger payments: one sender, one destination, a result code.

use serde_json::Value;
use synth_types::SourceId;

use crate::adapter::{ChainFormatAdapter, PrevoutMap};
use crate::error::ChainError;
use crate::types::{ChainTransaction, TxInputOutput, TxStatus};
use crate::wire::{amount_field, IndexerTransaction};

const SUCCESS_CODE: &str = "tesSUCCESS";

/// Result codes meaning the destination refused the payment.
const BLOCKED_CODES: [&str; 4] = [
    "tecDST_TAG_NEEDED",
    "tecNO_DST",
    "tecNO_DST_INSUF_XRP",
    "tecNO_PERMISSION",
];

#[derive(Clone, Debug)]
pub struct XrpAdapter {
    source: SourceId,
}

impl XrpAdapter {
    pub fn new(source: SourceId) -> Self {
        Self { source }
    }

    fn result(raw: &IndexerTransaction) -> &Value {
        &raw.body()["result"]
    }

    /// Newer nodes send `meta`, older ones `metaData`.
    fn meta(result: &Value) -> &Value {
        match &result["meta"] {
            Value::Null => &result["metaData"],
            meta => meta,
        }
    }

    fn result_code(result: &Value) -> &str {
        Self::meta(result)["TransactionResult"]
            .as_str()
            .unwrap_or_default()
    }

    fn is_native_payment(raw: &IndexerTransaction, result: &Value) -> bool {
        // Issued-currency amounts are objects; native XRP is a drops string.
        raw.is_native_payment
            || (result["TransactionType"] == "Payment" && !result["Amount"].is_object())
    }
}

impl ChainFormatAdapter for XrpAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    fn decode(
        &self,
        raw: &IndexerTransaction,
        _prevouts: &PrevoutMap,
    ) -> Result<ChainTransaction, ChainError> {
        let result = Self::result(raw);
        let account = result["Account"].as_str().unwrap_or_default();
        let fee = amount_field(&result["Fee"], "Fee")?;
        let status = self.success_status(raw)?;
        let native = Self::is_native_payment(raw, result);

        let spent = if native {
            amount_field(&result["Amount"], "Amount")?
                .checked_add(fee)
                .ok_or_else(|| ChainError::decode("Amount", "amount plus fee overflows"))?
        } else {
            fee
        };
        let inputs = vec![TxInputOutput::new(account, spent)];

        let outputs = if native && status == TxStatus::Success {
            let destination = result["Destination"].as_str().unwrap_or_default();
            let delivered = amount_field(&Self::meta(result)["delivered_amount"], "delivered_amount")?;
            vec![TxInputOutput::new(destination, delivered)]
        } else {
            vec![TxInputOutput::empty()]
        };

        Ok(ChainTransaction {
            hash: self.source.normalize_tx_hash(&raw.transaction_id),
            inputs,
            outputs,
            reference: raw.reference(),
            status,
        })
    }

    fn success_status(&self, raw: &IndexerTransaction) -> Result<TxStatus, ChainError> {
        let code = Self::result_code(Self::result(raw));
        if code.is_empty() {
            return Err(ChainError::decode("TransactionResult", "missing result code"));
        }
        Ok(if code == SUCCESS_CODE {
            TxStatus::Success
        } else if BLOCKED_CODES.contains(&code) {
            TxStatus::Blocked
        } else {
            TxStatus::Failed
        })
    }
}
