//! JSON shapes served by the underlying-chain indexer.

use serde::Deserialize;
use serde_json::Value;
use synth_types::{PaymentReference, Timestamp};

use crate::error::ChainError;
use crate::types::{BlockId, ChainBlock};

/// `{status, data, errorMessage, errorDetails}` wrapper around every response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl<T> IndexerEnvelope<T> {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }

    /// OK envelopes yield their data; "not found" errors yield `None`.
    pub fn into_result(self, operation: &str) -> Result<Option<T>, ChainError> {
        if self.is_ok() {
            return Ok(self.data);
        }
        let message = match (&self.error_message, &self.error_details) {
            (Some(m), Some(d)) => format!("{m}, {d}"),
            (Some(m), None) => m.clone(),
            (None, Some(d)) => d.clone(),
            (None, None) => String::new(),
        };
        if message.to_ascii_lowercase().contains("not found") {
            return Ok(None);
        }
        Err(ChainError::Indexer {
            operation: operation.to_string(),
            status: self.status,
            message,
        })
    }
}

/// One indexed transaction with the chain node's raw response attached.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub is_native_payment: bool,
    #[serde(default)]
    pub transaction_type: String,
    #[serde(default)]
    pub response: Value,
}

impl IndexerTransaction {
    /// Marker rows the indexer inserts for blocks without transactions.
    pub fn is_empty_block_indicator(&self) -> bool {
        self.transaction_type == "EMPTY_BLOCK_INDICATOR"
    }

    /// The node's transaction body (`response.data`).
    pub fn body(&self) -> &Value {
        &self.response["data"]
    }

    /// A zero or missing reference is no reference.
    pub fn reference(&self) -> Option<PaymentReference> {
        let raw = self.payment_reference.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let reference = PaymentReference::parse(raw).ok()?;
        if reference.as_bytes32().is_zero() {
            None
        } else {
            Some(reference)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerBlock {
    pub block_hash: String,
    pub block_number: u64,
    #[serde(default)]
    pub timestamp: u64,
}

impl IndexerBlock {
    pub fn into_block(self, transactions: Vec<String>) -> ChainBlock {
        ChainBlock {
            hash: self.block_hash,
            number: self.block_number,
            timestamp: Timestamp::new(self.timestamp),
            transactions,
        }
    }

    pub fn id(&self) -> BlockId {
        BlockId {
            hash: self.block_hash.clone(),
            number: self.block_number,
        }
    }
}

/// Parse an integer amount the node may send as a JSON number or string.
pub fn amount_field(value: &Value, what: &str) -> Result<u128, ChainError> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| ChainError::decode(what, format!("not an unsigned integer: {n}"))),
        Value::String(s) => s
            .parse::<u128>()
            .map_err(|e| ChainError::decode(what, format!("{s}: {e}"))),
        other => Err(ChainError::decode(what, format!("unexpected value {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_envelope_yields_data() {
        let env: IndexerEnvelope<u64> =
            serde_json::from_value(json!({"status": "OK", "data": 812})).unwrap();
        assert_eq!(env.into_result("block-height").unwrap(), Some(812));
    }

    #[test]
    fn test_ok_envelope_without_data_yields_none() {
        let env: IndexerEnvelope<IndexerTransaction> =
            serde_json::from_value(json!({"status": "OK"})).unwrap();
        assert!(env.into_result("transaction").unwrap().is_none());
    }

    #[test]
    fn test_not_found_envelope_yields_none() {
        let env: IndexerEnvelope<IndexerTransaction> = serde_json::from_value(json!({
            "status": "ERROR",
            "errorMessage": "Transaction not found"
        }))
        .unwrap();
        assert!(env.into_result("transaction").unwrap().is_none());
    }

    #[test]
    fn test_error_envelope_is_typed() {
        let env: IndexerEnvelope<u64> = serde_json::from_value(json!({
            "status": "ERROR",
            "errorMessage": "database down",
            "errorDetails": "timeout"
        }))
        .unwrap();
        match env.into_result("block-height") {
            Err(ChainError::Indexer { operation, message, .. }) => {
                assert_eq!(operation, "block-height");
                assert_eq!(message, "database down, timeout");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_transaction_reference_parsing() {
        let reference = PaymentReference::minting(42);
        let tx: IndexerTransaction = serde_json::from_value(json!({
            "transactionId": "abc",
            "blockNumber": 10,
            "timestamp": 1000,
            "paymentReference": reference.to_string(),
        }))
        .unwrap();
        assert_eq!(tx.reference(), Some(reference));

        let zero: IndexerTransaction = serde_json::from_value(json!({
            "transactionId": "abc",
            "paymentReference": format!("0x{}", "0".repeat(64)),
        }))
        .unwrap();
        assert_eq!(zero.reference(), None);
    }

    #[test]
    fn test_amount_field_accepts_numbers_and_strings() {
        assert_eq!(amount_field(&json!("10000"), "Amount").unwrap(), 10_000);
        assert_eq!(amount_field(&json!(12), "Fee").unwrap(), 12);
        assert_eq!(amount_field(&Value::Null, "Fee").unwrap(), 0);
        assert!(amount_field(&json!({"currency": "USD"}), "Amount").is_err());
    }
}
