//! One trait for every chain family, and the registry that picks by source id.

use std::collections::HashMap;
use std::sync::Arc;

use synth_types::{ChainFamily, SourceId};

use crate::account::AccountAdapter;
use crate::error::ChainError;
use crate::types::{ChainTransaction, TxInputOutput, TxStatus};
use crate::utxo::UtxoAdapter;
use crate::wire::IndexerTransaction;
use crate::xrp::XrpAdapter;

/// A previous transaction output referenced by a UTXO input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u32,
}

/// Resolved previous outputs, filled in by the caller before [`ChainFormatAdapter::decode`].
pub type PrevoutMap = HashMap<OutPoint, TxInputOutput>;

/// Normalizes raw indexer transactions of one chain family.
///
/// Adapters are pure: any lookup they need (previous outputs) is announced by
/// [`required_prevouts`](Self::required_prevouts) and resolved by the indexer
/// client, so decoding never touches the network.
pub trait ChainFormatAdapter: Send + Sync {
    fn source_id(&self) -> SourceId;

    /// Outpoints that must be resolved before decoding `raw`.
    fn required_prevouts(&self, _raw: &IndexerTransaction) -> Result<Vec<OutPoint>, ChainError> {
        Ok(Vec::new())
    }

    /// Output `index` of `raw`, used to resolve another transaction's input.
    fn output_at(
        &self,
        _raw: &IndexerTransaction,
        _index: u32,
    ) -> Result<Option<TxInputOutput>, ChainError> {
        Ok(None)
    }

    fn decode(
        &self,
        raw: &IndexerTransaction,
        prevouts: &PrevoutMap,
    ) -> Result<ChainTransaction, ChainError>;

    fn success_status(&self, raw: &IndexerTransaction) -> Result<TxStatus, ChainError>;
}

/// The adapter a source chain uses by default.
pub fn default_adapter(source: SourceId) -> Arc<dyn ChainFormatAdapter> {
    match source.family() {
        ChainFamily::Utxo => Arc::new(UtxoAdapter::new(source)),
        ChainFamily::LedgerAccount => Arc::new(XrpAdapter::new(source)),
        ChainFamily::Account => Arc::new(AccountAdapter::new(source)),
    }
}

/// Adapters keyed by source id.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceId, Arc<dyn ChainFormatAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the default adapter for every known chain.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for source in SourceId::ALL {
            registry.register(default_adapter(source));
        }
        registry
    }

    /// Add or replace the adapter for its source id.
    pub fn register(&mut self, adapter: Arc<dyn ChainFormatAdapter>) {
        self.adapters.insert(adapter.source_id(), adapter);
    }

    pub fn get(&self, source: SourceId) -> Result<Arc<dyn ChainFormatAdapter>, ChainError> {
        self.adapters
            .get(&source)
            .cloned()
            .ok_or(ChainError::UnsupportedSource(source))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sources: Vec<_> = self.adapters.keys().collect();
        sources.sort();
        f.debug_struct("AdapterRegistry")
            .field("sources", &sources)
            .finish()
    }
}
