//! Underlying-chain access for the agent client.
//!
//! - [`ChainFormatAdapter`] normalizes one chain family's raw indexer data into
//!   [`ChainTransaction`]; [`AdapterRegistry`] picks the adapter by [`SourceId`]
//! - [`IndexerClient`] is the lookup surface the lifecycles consume;
//!   [`HttpIndexerClient`] implements it over the indexer REST API
//! - [`wait_for_transaction_finalization`] is the bounded finalization wait
//!
//! [`SourceId`]: synth_types::SourceId

pub mod account;
pub mod adapter;
pub mod client;
pub mod error;
pub mod indexer;
pub mod types;
pub mod utxo;
pub mod wire;
pub mod xrp;

pub use account::AccountAdapter;
pub use adapter::{AdapterRegistry, ChainFormatAdapter, OutPoint, PrevoutMap};
pub use client::HttpIndexerClient;
pub use error::ChainError;
pub use indexer::{wait_for_transaction_finalization, IndexerClient};
pub use types::{BlockId, ChainBlock, ChainTransaction, TxInputOutput, TxStatus};
pub use utxo::UtxoAdapter;
pub use wire::{IndexerBlock, IndexerEnvelope, IndexerTransaction};
pub use xrp::XrpAdapter;
