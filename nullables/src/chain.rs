//! An in-memory underlying chain with deterministic block times.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use synth_chain::{BlockId, ChainBlock, ChainError, ChainTransaction, IndexerClient};
use synth_types::{PaymentReference, SourceId, Timestamp};

struct ChainState {
    blocks: BTreeMap<u64, ChainBlock>,
    transactions: HashMap<String, (ChainTransaction, u64)>,
    /// Insertion order, for range queries.
    order: Vec<String>,
}

/// A chain whose blocks and transactions are added by the test.
///
/// Block `n` gets hash `"block-n"` and timestamp `genesis + n * block_time`.
pub struct NullIndexer {
    source_id: SourceId,
    genesis: u64,
    block_time: u64,
    state: Mutex<ChainState>,
}

impl NullIndexer {
    /// A chain with blocks `0..=height`.
    pub fn new(source_id: SourceId, height: u64, genesis: u64, block_time: u64) -> Self {
        let indexer = Self {
            source_id,
            genesis,
            block_time,
            state: Mutex::new(ChainState {
                blocks: BTreeMap::new(),
                transactions: HashMap::new(),
                order: Vec::new(),
            }),
        };
        indexer.mine_to(height);
        indexer
    }

    pub fn height(&self) -> u64 {
        self.state
            .lock()
            .unwrap()
            .blocks
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default()
    }

    pub fn block_timestamp(&self, number: u64) -> Timestamp {
        Timestamp::new(self.genesis + number * self.block_time)
    }

    /// Produce blocks up to `height`.
    pub fn mine_to(&self, height: u64) {
        let mut state = self.state.lock().unwrap();
        let start = state.blocks.keys().next_back().map_or(0, |h| h + 1);
        for number in start..=height {
            state.blocks.insert(
                number,
                ChainBlock {
                    hash: format!("block-{number}"),
                    number,
                    timestamp: self.block_timestamp(number),
                    transactions: Vec::new(),
                },
            );
        }
    }

    pub fn mine(&self, blocks: u64) {
        let height = self.height();
        self.mine_to(height + blocks);
    }

    /// Include `tx` in block `number` (mined if needed).
    pub fn add_transaction(&self, tx: ChainTransaction, number: u64) {
        self.mine_to(number);
        let mut state = self.state.lock().unwrap();
        if let Some(block) = state.blocks.get_mut(&number) {
            block.transactions.push(tx.hash.clone());
        }
        state.order.push(tx.hash.clone());
        state.transactions.insert(tx.hash.clone(), (tx, number));
    }

    /// Every transaction with its block number, in insertion order.
    pub fn transactions(&self) -> Vec<(ChainTransaction, u64)> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .filter_map(|h| state.transactions.get(h))
            .cloned()
            .collect()
    }

    pub fn block(&self, number: u64) -> Option<ChainBlock> {
        self.state.lock().unwrap().blocks.get(&number).cloned()
    }

    /// Include `tx` in the next block.
    pub fn add_to_next_block(&self, tx: ChainTransaction) -> u64 {
        let number = self.height() + 1;
        self.add_transaction(tx, number);
        number
    }
}

#[async_trait]
impl IndexerClient for NullIndexer {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .get(hash)
            .map(|(tx, _)| tx.clone()))
    }

    async fn get_transaction_block(&self, hash: &str) -> Result<Option<BlockId>, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .transactions
            .get(hash)
            .and_then(|(_, number)| state.blocks.get(number))
            .map(ChainBlock::id))
    }

    async fn get_block(&self, hash: &str) -> Result<Option<ChainBlock>, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .blocks
            .values()
            .find(|b| b.hash == hash)
            .cloned())
    }

    async fn get_block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError> {
        Ok(self.state.lock().unwrap().blocks.get(&number).cloned())
    }

    async fn get_block_height(&self) -> Result<u64, ChainError> {
        Ok(self.height())
    }

    async fn get_transactions_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .order
            .iter()
            .filter_map(|h| state.transactions.get(h))
            .filter(|(tx, _)| tx.has_reference(reference))
            .map(|(tx, _)| tx.clone())
            .collect())
    }

    async fn get_transactions_within_block_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .order
            .iter()
            .filter_map(|h| state.transactions.get(h))
            .filter(|(_, number)| (from..=to).contains(number))
            .map(|(tx, _)| tx.clone())
            .collect())
    }

    async fn get_transactions_in_block(
        &self,
        number: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        self.get_transactions_within_block_range(number, number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_chain::{TxInputOutput, TxStatus};

    fn tx(hash: &str) -> ChainTransaction {
        ChainTransaction {
            hash: hash.into(),
            inputs: vec![TxInputOutput::new("a", 10u128)],
            outputs: vec![TxInputOutput::new("b", 10u128)],
            reference: Some(PaymentReference::minting(1)),
            status: TxStatus::Success,
        }
    }

    #[tokio::test]
    async fn test_transactions_land_in_blocks() {
        let chain = NullIndexer::new(SourceId::Btc, 10, 1_000, 600);
        assert_eq!(chain.add_to_next_block(tx("t1")), 11);
        chain.add_transaction(tx("t2"), 15);
        assert_eq!(chain.get_block_height().await.unwrap(), 15);
        assert_eq!(chain.get_transaction_block("t1").await.unwrap().unwrap().number, 11);
        assert_eq!(
            chain
                .get_transactions_by_reference(&PaymentReference::minting(1))
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            chain.get_block_at(15).await.unwrap().unwrap().timestamp,
            Timestamp::new(1_000 + 15 * 600)
        );
        assert!(chain.get_transactions_in_block(12).await.unwrap().is_empty());
    }
}
