//! Asset and collateral-type parameters, as read from the asset manager.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CollateralError;

/// Which collateral pot a ratio is measured for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralClass {
    /// Agent-owned vault collateral (stablecoin or similar).
    Vault,
    /// Collateral pool of native tokens.
    Pool,
    /// The agent's own share of the pool, valued at pool token price.
    AgentPoolTokens,
}

impl CollateralClass {
    /// Contract enum value; agent pool tokens have no on-chain class.
    pub fn code(self) -> Option<u8> {
        match self {
            Self::Pool => Some(1),
            Self::Vault => Some(2),
            Self::AgentPoolTokens => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Pool => "pool",
            Self::AgentPoolTokens => "agent_pool_tokens",
        }
    }
}

impl fmt::Display for CollateralClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collateral token accepted by the asset manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollateralType {
    pub class: CollateralClass,
    /// Token contract address on the smart-contract chain.
    pub token: String,
    pub decimals: u32,
    /// When true the asset symbol is quoted directly in this token and
    /// `token_ftso_symbol` is ignored.
    #[serde(default)]
    pub direct_price_pair: bool,
    pub asset_ftso_symbol: String,
    pub token_ftso_symbol: String,
    /// Below this the agent enters the collateral call band.
    pub min_collateral_ratio_bips: u128,
    /// Below this the agent is liquidated immediately.
    pub ccb_min_collateral_ratio_bips: u128,
    /// Required to leave liquidation.
    pub safety_min_collateral_ratio_bips: u128,
}

impl CollateralType {
    pub fn validate(&self) -> Result<(), CollateralError> {
        if self.ccb_min_collateral_ratio_bips > self.min_collateral_ratio_bips {
            return Err(CollateralError::InvalidSettings(format!(
                "{}: ccb minimum {} above minimum {}",
                self.class, self.ccb_min_collateral_ratio_bips, self.min_collateral_ratio_bips
            )));
        }
        if self.safety_min_collateral_ratio_bips < self.min_collateral_ratio_bips {
            return Err(CollateralError::InvalidSettings(format!(
                "{}: safety minimum {} below minimum {}",
                self.class, self.safety_min_collateral_ratio_bips, self.min_collateral_ratio_bips
            )));
        }
        Ok(())
    }
}

/// Per-asset settings of the asset manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSettings {
    pub asset_symbol: String,
    pub asset_decimals: u32,
    pub asset_minting_decimals: u32,
    /// UBA per AMG.
    pub asset_minting_granularity_uba: u128,
    pub lot_size_amg: u128,
    pub ccb_time_seconds: u64,
    pub min_underlying_backing_bips: u128,
    pub max_trusted_price_age_seconds: u64,
}

impl AssetSettings {
    pub fn validate(&self) -> Result<(), CollateralError> {
        if self.asset_minting_granularity_uba == 0 {
            return Err(CollateralError::InvalidSettings(
                "zero minting granularity".into(),
            ));
        }
        Ok(())
    }

    /// Lot size in underlying base units.
    pub fn lot_size_uba(&self) -> Option<u128> {
        self.lot_size_amg
            .checked_mul(self.asset_minting_granularity_uba)
    }
}
