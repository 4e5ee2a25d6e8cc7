//! Collateral ratios per class.

use serde::{Deserialize, Serialize};
use synth_types::math::{mul_div, BIPS, MAX_RATIO_BIPS};

use crate::amg::{convert_amg_to_token_wei, convert_uba_to_amg};
use crate::error::CollateralError;
use crate::settings::{AssetSettings, CollateralClass};

/// The parts of an agent's on-chain info that collateral math needs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPosition {
    pub minted_uba: u128,
    pub reserved_uba: u128,
    pub redeeming_uba: u128,
    pub pool_redeeming_uba: u128,
    pub vault_collateral_wei: u128,
    pub pool_collateral_wei: u128,
    /// Pool tokens held by the agent itself.
    pub agent_pool_tokens_wei: u128,
    pub total_pool_tokens_wei: u128,
    /// Balance of the agent's underlying address as last confirmed on-chain.
    pub underlying_balance_uba: i128,
}

impl AgentPosition {
    /// UBA backed by the given class.
    pub fn backed_uba(&self, class: CollateralClass) -> u128 {
        let redeeming = match class {
            CollateralClass::Pool => self.pool_redeeming_uba,
            CollateralClass::Vault | CollateralClass::AgentPoolTokens => self.redeeming_uba,
        };
        self.minted_uba
            .saturating_add(self.reserved_uba)
            .saturating_add(redeeming)
    }

    pub fn collateral_wei(&self, class: CollateralClass) -> u128 {
        match class {
            CollateralClass::Vault => self.vault_collateral_wei,
            CollateralClass::Pool => self.pool_collateral_wei,
            CollateralClass::AgentPoolTokens => self.agent_pool_tokens_wei,
        }
    }

    /// Underlying balance not needed to back minted and redeeming value.
    ///
    /// Negative means the agent has paid out more than it may.
    pub fn free_underlying_balance_uba(&self, settings: &AssetSettings) -> i128 {
        let backed = self.minted_uba.saturating_add(self.redeeming_uba);
        let required = mul_div(backed, settings.min_underlying_backing_bips, BIPS)
            .unwrap_or(u128::MAX);
        let required = i128::try_from(required).unwrap_or(i128::MAX);
        self.underlying_balance_uba.saturating_sub(required)
    }
}

/// `collateral * 10000 / backing`, both in token wei.
///
/// Nothing backed yields [`MAX_RATIO_BIPS`]; so does a quotient above it.
pub fn collateral_ratio_bips(
    collateral_wei: u128,
    backed_uba: u128,
    granularity_uba: u128,
    amg_to_token_wei_price: u128,
) -> Result<u128, CollateralError> {
    let backed_amg = convert_uba_to_amg(backed_uba, granularity_uba);
    let backing_wei = convert_amg_to_token_wei(backed_amg, amg_to_token_wei_price)
        .ok_or(CollateralError::Overflow("backing value"))?;
    if backing_wei == 0 {
        return Ok(MAX_RATIO_BIPS);
    }
    Ok(mul_div(collateral_wei, BIPS, backing_wei)
        .map_or(MAX_RATIO_BIPS, |ratio| ratio.min(MAX_RATIO_BIPS)))
}

/// AMG to pool-token-wei price: the pool's AMG price scaled by pool tokens
/// per wei of pool collateral. An empty pool has no price.
pub fn pool_token_amg_price(pool_amg_price: u128, position: &AgentPosition) -> Option<u128> {
    mul_div(
        pool_amg_price,
        position.total_pool_tokens_wei,
        position.pool_collateral_wei,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amg::AMG_TOKEN_WEI_PRICE_SCALE;
    use crate::settings::fixtures::asset;

    #[test]
    fn test_ratio_at_unit_price() {
        let ratio = collateral_ratio_bips(13_500, 10_000, 1, AMG_TOKEN_WEI_PRICE_SCALE).unwrap();
        assert_eq!(ratio, 13_500);
    }

    #[test]
    fn test_zero_backing_is_max() {
        assert_eq!(
            collateral_ratio_bips(1, 0, 1, AMG_TOKEN_WEI_PRICE_SCALE).unwrap(),
            MAX_RATIO_BIPS
        );
        // Below one AMG counts as nothing backed.
        assert_eq!(
            collateral_ratio_bips(1, 99, 100, AMG_TOKEN_WEI_PRICE_SCALE).unwrap(),
            MAX_RATIO_BIPS
        );
    }

    #[test]
    fn test_pool_uses_pool_redeeming() {
        let position = AgentPosition {
            minted_uba: 100,
            reserved_uba: 10,
            redeeming_uba: 5,
            pool_redeeming_uba: 1,
            ..Default::default()
        };
        assert_eq!(position.backed_uba(CollateralClass::Vault), 115);
        assert_eq!(position.backed_uba(CollateralClass::Pool), 111);
    }

    #[test]
    fn test_free_underlying_balance_can_go_negative() {
        let position = AgentPosition {
            minted_uba: 1_000,
            redeeming_uba: 500,
            underlying_balance_uba: 1_200,
            ..Default::default()
        };
        assert_eq!(position.free_underlying_balance_uba(&asset()), -300);
    }

    #[test]
    fn test_pool_token_price() {
        let position = AgentPosition {
            pool_collateral_wei: 2_000,
            total_pool_tokens_wei: 1_000,
            ..Default::default()
        };
        assert_eq!(pool_token_amg_price(600, &position), Some(300));
        assert_eq!(pool_token_amg_price(600, &AgentPosition::default()), None);
    }
}
