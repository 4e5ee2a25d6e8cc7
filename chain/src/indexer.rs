//! The lookup surface the lifecycles and the challenger consume.

use async_trait::async_trait;
use synth_types::{PaymentReference, SourceId};
use synth_utils::{poll_until, PollError, PollSettings};
use tracing::debug;

use crate::error::ChainError;
use crate::types::{BlockId, ChainBlock, ChainTransaction};

/// Read access to one underlying chain through its indexer.
///
/// Lookups that find nothing return `Ok(None)` or an empty list; errors are
/// reserved for transport and decoding failures. Implementations never retry
/// on their own, the calling actor decides.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Confirmations after which a transaction is final on this chain.
    fn finalization_blocks(&self) -> u64 {
        self.source_id().finalization_blocks()
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ChainError>;

    async fn get_transaction_block(&self, hash: &str) -> Result<Option<BlockId>, ChainError>;

    async fn get_block(&self, hash: &str) -> Result<Option<ChainBlock>, ChainError>;

    async fn get_block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError>;

    async fn get_block_height(&self) -> Result<u64, ChainError>;

    async fn get_transactions_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Vec<ChainTransaction>, ChainError>;

    /// Transactions in blocks `from..=to`.
    async fn get_transactions_within_block_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError>;

    async fn get_transactions_in_block(&self, number: u64)
        -> Result<Vec<ChainTransaction>, ChainError>;
}

/// Wait until transaction `hash` shows up in the indexer.
///
/// Returns `Ok(None)` once `max_blocks` new blocks have been produced since
/// the wait began without the transaction appearing, and
/// [`ChainError::TimedOut`] when `poll.timeout` elapses first.
pub async fn wait_for_transaction_finalization<I>(
    indexer: &I,
    hash: &str,
    max_blocks: Option<u64>,
    poll: PollSettings,
) -> Result<Option<ChainTransaction>, ChainError>
where
    I: IndexerClient + ?Sized,
{
    let start_height = indexer.get_block_height().await?;
    debug!(
        source = %indexer.source_id(),
        tx = hash,
        start_height,
        "waiting for underlying transaction"
    );
    let outcome = poll_until(poll, || check_arrival(indexer, hash, max_blocks, start_height)).await;
    match outcome {
        Ok(found) => Ok(found),
        Err(PollError::TimedOut(t)) => Err(ChainError::TimedOut(t)),
        Err(PollError::Check(e)) => Err(e),
    }
}

/// One poll of [`wait_for_transaction_finalization`]: `Some(Some(tx))` when
/// found, `Some(None)` when the block budget is spent, `None` to keep waiting.
async fn check_arrival<I>(
    indexer: &I,
    hash: &str,
    max_blocks: Option<u64>,
    start_height: u64,
) -> Result<Option<Option<ChainTransaction>>, ChainError>
where
    I: IndexerClient + ?Sized,
{
    if let Some(tx) = indexer.get_transaction(hash).await? {
        return Ok(Some(Some(tx)));
    }
    if let Some(max) = max_blocks {
        let height = indexer.get_block_height().await?;
        if height.saturating_sub(start_height) > max {
            return Ok(Some(None));
        }
    }
    Ok(None)
}
