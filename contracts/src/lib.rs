//! Smart-contract surface used by the agent and challenger actors.
//!
//! [`AssetManager`] is the seam: lifecycles submit proofs and read agent state
//! through it and never talk to a node directly. [`ContractGateway`] is the
//! production implementation; tests use the nullables crate.

pub mod agent_info;
pub mod asset_manager;
pub mod error;
pub mod events;
pub mod gateway;
pub mod verifier;

pub use agent_info::{AgentCollateralTypes, AgentInfo};
pub use asset_manager::{AssetManager, CallHash};
pub use error::ContractError;
pub use events::{AssetManagerEvent, CollateralReserved, EventRecord, RedemptionRequested};
pub use gateway::ContractGateway;
pub use verifier::{MerkleRootRelay, RelayProofVerifier};
