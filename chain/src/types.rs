//! The uniform transaction and block shapes every chain adapter produces.

use serde::{Deserialize, Serialize};
use synth_types::{PaymentReference, Timestamp, UbaAmount};

/// One `(address, amount)` entry of a transaction's inputs or outputs.
///
/// An empty address with a zero amount stands for "nothing attributable"
/// (coinbase input, non-payment output, unresolved UTXO input).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInputOutput {
    pub address: String,
    pub amount: UbaAmount,
}

impl TxInputOutput {
    pub fn new(address: impl Into<String>, amount: impl Into<UbaAmount>) -> Self {
        Self {
            address: address.into(),
            amount: amount.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new("", 0u128)
    }
}

/// Whether a transaction did what it was supposed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Failed,
    /// Failed because the receiver cannot accept it (missing tag,
    /// nonexistent destination, no permission). Counts as paid for redemptions.
    Blocked,
}

impl TxStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::Blocked => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub hash: String,
    pub inputs: Vec<TxInputOutput>,
    pub outputs: Vec<TxInputOutput>,
    pub reference: Option<PaymentReference>,
    pub status: TxStatus,
}

impl ChainTransaction {
    /// Total spent by `address` across all inputs.
    pub fn spent_by(&self, address: &str) -> UbaAmount {
        self.inputs
            .iter()
            .filter(|io| io.address == address)
            .map(|io| io.amount)
            .sum()
    }

    /// Total received by `address` across all outputs.
    pub fn received_by(&self, address: &str) -> UbaAmount {
        self.outputs
            .iter()
            .filter(|io| io.address == address)
            .map(|io| io.amount)
            .sum()
    }

    pub fn spends_from(&self, address: &str) -> bool {
        self.inputs.iter().any(|io| io.address == address)
    }

    pub fn has_reference(&self, reference: &PaymentReference) -> bool {
        self.reference.as_ref() == Some(reference)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId {
    pub hash: String,
    pub number: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBlock {
    pub hash: String,
    pub number: u64,
    pub timestamp: Timestamp,
    /// Ids of the transactions in the block.
    pub transactions: Vec<String>,
}

impl ChainBlock {
    pub fn id(&self) -> BlockId {
        BlockId {
            hash: self.hash.clone(),
            number: self.number,
        }
    }
}
