//! Fundamental types for the synthetic-asset agent client.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! 32-byte hashes, smart-contract-chain addresses, underlying amounts, timestamps
//! and the clock seam, source-chain identifiers, payment references, the closed
//! state enumerations of the lifecycles, and overflow-safe fixed-point math.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod math;
pub mod reference;
pub mod source;
pub mod state;
pub mod time;

pub use address::Address;
pub use amount::UbaAmount;
pub use error::TypesError;
pub use hash::Bytes32;
pub use reference::{PaymentReference, ReferenceKind};
pub use source::{ChainFamily, SourceId};
pub use state::{AgentStatus, MintingState, RedemptionState};
pub use time::{Clock, SystemClock, Timestamp};
