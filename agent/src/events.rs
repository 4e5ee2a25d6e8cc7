//! Ordered reading of finalized asset manager events.

use std::sync::Arc;

use synth_contracts::{AssetManager, EventRecord};
use synth_store::AgentStore;
use tracing::debug;

use crate::AgentError;

const DEFAULT_MAX_BLOCKS: u64 = 1_000;

/// Events of one read, in chain order.
#[derive(Debug, Default)]
pub struct EventBatch {
    pub events: Vec<EventRecord>,
    /// Last block covered; `None` when there was nothing new to read.
    pub to_block: Option<u64>,
}

/// Reads events block range by block range and remembers, per owner, the
/// last block whose events were handled.
pub struct EventReader {
    asset_manager: Arc<dyn AssetManager>,
    store: Arc<dyn AgentStore>,
    owner: String,
    start_block: u64,
    max_blocks: u64,
}

impl EventReader {
    pub fn new(
        asset_manager: Arc<dyn AssetManager>,
        store: Arc<dyn AgentStore>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            asset_manager,
            store,
            owner: owner.into(),
            start_block: 0,
            max_blocks: DEFAULT_MAX_BLOCKS,
        }
    }

    /// First block to read when nothing was read before.
    pub fn with_start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    pub fn with_max_blocks(mut self, max_blocks: u64) -> Self {
        self.max_blocks = max_blocks.max(1);
        self
    }

    /// The next unhandled range, up to the finalized block.
    pub async fn read_unhandled(&self) -> Result<EventBatch, AgentError> {
        let from = match self.store.last_event_block(&self.owner)? {
            Some(last) => last + 1,
            None => self.start_block,
        };
        let finalized = self.asset_manager.finalized_block().await?;
        if from > finalized {
            return Ok(EventBatch::default());
        }
        let to = finalized.min(from.saturating_add(self.max_blocks - 1));
        let mut events = self.asset_manager.events(from, to, None).await?;
        events.sort_by_key(|e| (e.block_number, e.log_index));
        debug!(owner = %self.owner, from, to, count = events.len(), "events read");
        Ok(EventBatch {
            events,
            to_block: Some(to),
        })
    }

    /// Record that every event of `batch` was handled.
    pub fn mark_handled(&self, batch: &EventBatch) -> Result<(), AgentError> {
        if let Some(to) = batch.to_block {
            self.store.set_last_event_block(&self.owner, to)?;
        }
        Ok(())
    }
}
