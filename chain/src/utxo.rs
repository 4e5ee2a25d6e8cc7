//! BTC-family transactions: `vin` references previous outputs, `vout` carries
//! float coin values.

use serde_json::Value;
use synth_types::SourceId;

use crate::adapter::{ChainFormatAdapter, OutPoint, PrevoutMap};
use crate::error::ChainError;
use crate::types::{ChainTransaction, TxInputOutput, TxStatus};
use crate::wire::IndexerTransaction;

/// Base units per coin (satoshi per BTC, koinu per DOGE).
const UNITS_PER_COIN: f64 = 100_000_000.0;

#[derive(Clone, Debug)]
pub struct UtxoAdapter {
    source: SourceId,
}

impl UtxoAdapter {
    pub fn new(source: SourceId) -> Self {
        Self { source }
    }

    fn vout_entry(entry: &Value) -> TxInputOutput {
        let address = entry["scriptPubKey"]["address"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        TxInputOutput::new(address, coin_to_units(&entry["value"]))
    }

    fn outputs(&self, raw: &IndexerTransaction) -> Vec<TxInputOutput> {
        let outputs: Vec<TxInputOutput> = raw.body()["vout"]
            .as_array()
            .map(|vout| vout.iter().map(Self::vout_entry).collect())
            .unwrap_or_default();
        if outputs.is_empty() {
            vec![TxInputOutput::empty()]
        } else {
            outputs
        }
    }

    fn is_coinbase(raw: &IndexerTransaction) -> bool {
        raw.transaction_type == "coinbase"
    }
}

fn coin_to_units(value: &Value) -> u128 {
    let coins = value.as_f64().unwrap_or(0.0);
    if coins <= 0.0 {
        0
    } else {
        (coins * UNITS_PER_COIN).round() as u128
    }
}

impl ChainFormatAdapter for UtxoAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    fn required_prevouts(&self, raw: &IndexerTransaction) -> Result<Vec<OutPoint>, ChainError> {
        // The indexer only resolves inputs of referenced transactions; the
        // lifecycles only care about those.
        if Self::is_coinbase(raw) || raw.reference().is_none() {
            return Ok(Vec::new());
        }
        let vin = match raw.body()["vin"].as_array() {
            Some(vin) => vin,
            None => return Ok(Vec::new()),
        };
        Ok(vin
            .iter()
            .filter_map(|input| {
                let txid = input["txid"].as_str()?;
                let vout = input["vout"].as_u64()?;
                Some(OutPoint {
                    txid: txid.to_string(),
                    vout: u32::try_from(vout).ok()?,
                })
            })
            .collect())
    }

    fn output_at(
        &self,
        raw: &IndexerTransaction,
        index: u32,
    ) -> Result<Option<TxInputOutput>, ChainError> {
        Ok(raw.body()["vout"]
            .as_array()
            .and_then(|vout| vout.get(index as usize))
            .map(Self::vout_entry))
    }

    fn decode(
        &self,
        raw: &IndexerTransaction,
        prevouts: &PrevoutMap,
    ) -> Result<ChainTransaction, ChainError> {
        let inputs = if Self::is_coinbase(raw) {
            vec![TxInputOutput::empty()]
        } else {
            let resolved: Vec<TxInputOutput> = self
                .required_prevouts(raw)?
                .iter()
                .filter_map(|outpoint| prevouts.get(outpoint).cloned())
                .collect();
            if resolved.is_empty() {
                vec![TxInputOutput::empty()]
            } else {
                resolved
            }
        };
        Ok(ChainTransaction {
            hash: self.source.normalize_tx_hash(&raw.transaction_id),
            inputs,
            outputs: self.outputs(raw),
            reference: raw.reference(),
            status: self.success_status(raw)?,
        })
    }

    /// Transactions that reach a UTXO block always executed.
    fn success_status(&self, _raw: &IndexerTransaction) -> Result<TxStatus, ChainError> {
        Ok(TxStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use synth_types::{PaymentReference, UbaAmount};

    fn raw(reference: Option<PaymentReference>, tx_type: &str) -> IndexerTransaction {
        serde_json::from_value(json!({
            "transactionId": "AABB",
            "blockNumber": 100,
            "timestamp": 1_700_000_000u64,
            "paymentReference": reference.map(|r| r.to_string()),
            "transactionType": tx_type,
            "response": {
                "data": {
                    "vin": [{"txid": "prev1", "vout": 1}, {"txid": "prev2", "vout": 0}],
                    "vout": [
                        {"value": 0.0002, "scriptPubKey": {"address": "agentAddr"}},
                        {"value": 0.00001, "scriptPubKey": {"address": "change"}}
                    ]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn outputs_convert_coins_to_base_units() {
        let adapter = UtxoAdapter::new(SourceId::Btc);
        let tx = adapter.decode(&raw(None, "payment"), &PrevoutMap::new()).unwrap();
        assert_eq!(tx.outputs[0], TxInputOutput::new("agentAddr", 20_000u128));
        assert_eq!(tx.outputs[1].amount, UbaAmount::new(1_000));
        assert_eq!(tx.hash, "aabb");
    }

    #[test]
    fn unreferenced_inputs_are_synthesized_zero() {
        let adapter = UtxoAdapter::new(SourceId::Doge);
        let r = raw(None, "payment");
        assert!(adapter.required_prevouts(&r).unwrap().is_empty());
        let tx = adapter.decode(&r, &PrevoutMap::new()).unwrap();
        assert_eq!(tx.inputs, vec![TxInputOutput::empty()]);
    }

    #[test]
    fn referenced_inputs_use_prevouts() {
        let adapter = UtxoAdapter::new(SourceId::Btc);
        let r = raw(Some(PaymentReference::redemption(5)), "payment");
        let needed = adapter.required_prevouts(&r).unwrap();
        assert_eq!(needed.len(), 2);
        let mut prevouts = PrevoutMap::new();
        prevouts.insert(needed[0].clone(), TxInputOutput::new("agentAddr", 50_000u128));
        let tx = adapter.decode(&r, &prevouts).unwrap();
        assert_eq!(tx.inputs, vec![TxInputOutput::new("agentAddr", 50_000u128)]);
        assert_eq!(tx.reference, Some(PaymentReference::redemption(5)));
    }

    #[test]
    fn coinbase_has_empty_input() {
        let adapter = UtxoAdapter::new(SourceId::Btc);
        let r = raw(Some(PaymentReference::redemption(5)), "coinbase");
        assert!(adapter.required_prevouts(&r).unwrap().is_empty());
        let tx = adapter.decode(&r, &PrevoutMap::new()).unwrap();
        assert_eq!(tx.inputs, vec![TxInputOutput::empty()]);
    }

    #[test]
    fn output_at_resolves_index() {
        let adapter = UtxoAdapter::new(SourceId::Btc);
        let r = raw(None, "payment");
        assert_eq!(
            adapter.output_at(&r, 1).unwrap(),
            Some(TxInputOutput::new("change", 1_000u128))
        );
        assert_eq!(adapter.output_at(&r, 7).unwrap(), None);
    }

    #[test]
    fn empty_vout_gives_placeholder() {
        let adapter = UtxoAdapter::new(SourceId::Btc);
        let r: IndexerTransaction = serde_json::from_value(json!({
            "transactionId": "cc",
            "response": {"data": {"vin": [], "vout": []}}
        }))
        .unwrap();
        let tx = adapter.decode(&r, &PrevoutMap::new()).unwrap();
        assert_eq!(tx.outputs, vec![TxInputOutput::empty()]);
        assert_eq!(tx.status, TxStatus::Success);
    }
}
