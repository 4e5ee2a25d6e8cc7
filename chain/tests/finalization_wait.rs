//! Bounded waits for underlying transactions against a scripted indexer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use synth_chain::{
    wait_for_transaction_finalization, BlockId, ChainBlock, ChainError, ChainTransaction,
    IndexerClient, TxInputOutput, TxStatus,
};
use synth_types::{PaymentReference, SourceId};
use synth_utils::PollSettings;

/// Height advances by one per height query; the transaction appears at `appears_at`.
struct ScriptedIndexer {
    height: AtomicU64,
    appears_at: Option<u64>,
    lookups: Mutex<u32>,
}

impl ScriptedIndexer {
    fn new(appears_at: Option<u64>) -> Self {
        Self {
            height: AtomicU64::new(100),
            appears_at,
            lookups: Mutex::new(0),
        }
    }
}

fn tx(hash: &str) -> ChainTransaction {
    ChainTransaction {
        hash: hash.to_string(),
        inputs: vec![TxInputOutput::new("agent", 10u128)],
        outputs: vec![TxInputOutput::new("user", 10u128)],
        reference: None,
        status: TxStatus::Success,
    }
}

#[async_trait]
impl IndexerClient for ScriptedIndexer {
    fn source_id(&self) -> SourceId {
        SourceId::Btc
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ChainError> {
        *self.lookups.lock().unwrap() += 1;
        let height = self.height.load(Ordering::SeqCst);
        Ok(match self.appears_at {
            Some(at) if height >= at => Some(tx(hash)),
            _ => None,
        })
    }

    async fn get_transaction_block(&self, _hash: &str) -> Result<Option<BlockId>, ChainError> {
        Ok(None)
    }

    async fn get_block(&self, _hash: &str) -> Result<Option<ChainBlock>, ChainError> {
        Ok(None)
    }

    async fn get_block_at(&self, _number: u64) -> Result<Option<ChainBlock>, ChainError> {
        Ok(None)
    }

    async fn get_block_height(&self) -> Result<u64, ChainError> {
        Ok(self.height.fetch_add(1, Ordering::SeqCst))
    }

    async fn get_transactions_by_reference(
        &self,
        _reference: &PaymentReference,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        Ok(Vec::new())
    }

    async fn get_transactions_within_block_range(
        &self,
        _from: u64,
        _to: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        Ok(Vec::new())
    }

    async fn get_transactions_in_block(
        &self,
        _number: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        Ok(Vec::new())
    }
}

fn quick() -> PollSettings {
    PollSettings::new(Duration::from_millis(2), Duration::from_millis(300))
}

#[tokio::test]
async fn test_returns_transaction_once_indexed() {
    let indexer = ScriptedIndexer::new(Some(103));
    let found = wait_for_transaction_finalization(&indexer, "ab", Some(50), quick())
        .await
        .unwrap();
    assert_eq!(found.map(|t| t.hash), Some("ab".to_string()));
}

#[tokio::test]
async fn test_gives_up_after_max_blocks() {
    let indexer = ScriptedIndexer::new(None);
    let found = wait_for_transaction_finalization(&indexer, "ab", Some(3), quick())
        .await
        .unwrap();
    assert!(found.is_none());
    assert!(*indexer.lookups.lock().unwrap() >= 3);
}

#[tokio::test]
async fn test_without_block_budget_times_out() {
    let indexer = ScriptedIndexer::new(None);
    let settings = PollSettings::new(Duration::from_millis(5), Duration::from_millis(40));
    let err = wait_for_transaction_finalization(&indexer, "ab", None, settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::TimedOut(_)));
    assert!(err.is_transient());
}

#[test]
fn test_finalization_blocks_follow_source() {
    let indexer = ScriptedIndexer::new(None);
    assert_eq!(indexer.finalization_blocks(), SourceId::Btc.finalization_blocks());
}

proptest! {
    #[test]
    fn spent_by_never_exceeds_total_inputs(amounts in proptest::collection::vec(0u64..1_000_000, 1..8)) {
        let inputs: Vec<TxInputOutput> = amounts
            .iter()
            .enumerate()
            .map(|(i, a)| TxInputOutput::new(if i % 2 == 0 { "agent" } else { "other" }, u128::from(*a)))
            .collect();
        let total: u128 = amounts.iter().map(|a| u128::from(*a)).sum();
        let t = ChainTransaction {
            hash: "h".into(),
            inputs,
            outputs: vec![TxInputOutput::empty()],
            reference: None,
            status: TxStatus::Success,
        };
        let spent = t.spent_by("agent").raw() + t.spent_by("other").raw();
        prop_assert_eq!(spent, total);
    }
}
