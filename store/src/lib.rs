//! Storage traits for agent lifecycle records.
//!
//! Lifecycles depend only on the traits; [`JsonFileStore`] is the on-disk
//! backend and the nullables crate has an in-memory one for tests.

pub mod error;
pub mod file;
pub mod meta;
pub mod minting;
pub mod redemption;

use serde::{Deserialize, Serialize};

pub use error::StoreError;
pub use file::JsonFileStore;
pub use meta::MetaStore;
pub use minting::{MintingRecord, MintingStore};
pub use redemption::{RedemptionRecord, RedemptionStore};

/// A submitted attestation request: the round it landed in and its
/// canonical encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    pub round: u64,
    pub data: String,
}

impl ProofRequest {
    pub fn new(round: u64, data: impl Into<String>) -> Self {
        Self {
            round,
            data: data.into(),
        }
    }
}

/// Everything an agent actor persists.
pub trait AgentStore: MintingStore + RedemptionStore + MetaStore {}

impl<T: MintingStore + RedemptionStore + MetaStore> AgentStore for T {}
