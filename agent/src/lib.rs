//! Off-chain actors of the collateralized-asset protocol.
//!
//! An [`AgentBot`] follows one agent vault: it opens minting and redemption
//! records from asset manager events, pays redemptions from the agent's
//! underlying address, obtains attestation proofs and settles every record
//! on the contract. Its [`HealthKeeper`] tracks collateral ratios and tops
//! up collateral when they fall towards the liquidation threshold.
//!
//! A [`Challenger`] watches tracked agents' underlying addresses and
//! challenges payments the protocol does not allow. A [`SystemKeeper`]
//! starts and ends liquidation of any agent whose ratios call for it.
//!
//! All three are [`Actor`]s driven by [`run_actor`] until shutdown.

pub mod bot;
pub mod challenger;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod health_keeper;
pub mod logging;
pub mod metrics;
pub mod minting;
pub mod redemption;
pub mod runner;
pub mod shutdown;
pub mod system_keeper;
pub mod tracing_spans;

pub use bot::AgentBot;
pub use challenger::{ChallengeKind, Challenger};
pub use config::BotConfig;
pub use context::{AgentContext, AgentIdentity, PendingProof};
pub use error::AgentError;
pub use events::{EventBatch, EventReader};
pub use health_keeper::{HealthKeeper, DEFAULT_TOP_UP_FACTOR_BIPS};
pub use logging::{init_logging, LogFormat};
pub use metrics::BotMetrics;
pub use minting::MintingLifecycle;
pub use redemption::RedemptionLifecycle;
pub use runner::{run_actor, Actor, RunSettings};
pub use shutdown::{ShutdownController, ShutdownReason, ShutdownReceiver};
pub use system_keeper::SystemKeeper;
