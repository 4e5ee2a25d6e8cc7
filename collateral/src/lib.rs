//! Oracle price selection, AMG conversions and agent health tracking.
//!
//! Prices come in two flavours per symbol, primary and trusted;
//! [`select_price`] decides which one a computation uses. Ratios are measured
//! per [`CollateralClass`] and the vault and pool ratios drive the
//! [`AgentStatus`](synth_types::AgentStatus) machine in [`health`].

pub mod amg;
pub mod error;
pub mod health;
pub mod price;
pub mod ratio;
pub mod settings;

pub use amg::{
    amg_to_token_wei_price, convert_amg_to_token_wei, convert_uba_to_amg,
    convert_uba_to_token_wei, AMG_TOKEN_WEI_PRICE_SCALE,
};
pub use error::CollateralError;
pub use health::{
    possible_transition, AgentHealthState, CollateralRatios, GoverningRatios, HealthTracker,
    HealthUpdate, TopUp, TransitionContext,
};
pub use price::{select_price, Price, PriceReader, PriceSnapshot, PriceSource};
pub use ratio::{collateral_ratio_bips, AgentPosition};
pub use settings::{AssetSettings, CollateralClass, CollateralType};
