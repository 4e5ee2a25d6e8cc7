//! Nullable infrastructure for deterministic testing.
//!
//! Each nullable implements the same trait as its production counterpart
//! and is driven from the test: time only moves when told to, the
//! underlying chain only grows when blocks are mined, the attestation
//! network attests exactly what the in-memory chain contains.

pub mod asset_manager;
pub mod attestation;
pub mod chain;
pub mod clock;
pub mod price;
pub mod store;
pub mod wallet;

pub use asset_manager::{ContractCall, NullAssetManager};
pub use attestation::{NullAttestationNetwork, NullVerifier};
pub use chain::NullIndexer;
pub use clock::NullClock;
pub use price::NullPriceSource;
pub use store::NullStore;
pub use wallet::NullWalletClient;
