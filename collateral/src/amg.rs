//! Conversions between underlying units (UBA), asset-minting granularity
//! units (AMG) and collateral token wei.
//!
//! An AMG→token-wei price is fixed point with [`AMG_TOKEN_WEI_PRICE_SCALE_EXP`]
//! decimals.

use synth_types::math::{mul_div, pow10};

use crate::error::CollateralError;
use crate::price::Price;

pub const AMG_TOKEN_WEI_PRICE_SCALE_EXP: u32 = 9;
pub const AMG_TOKEN_WEI_PRICE_SCALE: u128 = 1_000_000_000;

/// Price of one AMG in token wei, scaled by 10^9.
///
/// `asset_price` and `token_price` are USD quotes with their own decimals.
pub fn amg_to_token_wei_price(
    token_decimals: u32,
    token_price: Price,
    asset_minting_decimals: u32,
    asset_price: Price,
) -> Result<u128, CollateralError> {
    if token_price.price == 0 {
        return Err(CollateralError::ZeroPrice("collateral token".into()));
    }
    let plus = i64::from(token_decimals)
        + i64::from(token_price.decimals)
        + i64::from(AMG_TOKEN_WEI_PRICE_SCALE_EXP);
    let minus = i64::from(asset_minting_decimals) + i64::from(asset_price.decimals);
    let overflow = || CollateralError::Overflow("amg_to_token_wei_price");
    if plus >= minus {
        let scale = pow10(u32::try_from(plus - minus).map_err(|_| overflow())?).ok_or_else(overflow)?;
        mul_div(asset_price.price, scale, token_price.price).ok_or_else(overflow)
    } else {
        let scale = pow10(u32::try_from(minus - plus).map_err(|_| overflow())?).ok_or_else(overflow)?;
        let divisor = token_price.price.checked_mul(scale).ok_or_else(overflow)?;
        mul_div(asset_price.price, 1, divisor).ok_or_else(overflow)
    }
}

/// Direct pair: `asset_price` already quotes the asset in the collateral token.
pub fn amg_to_token_wei_price_direct(
    token_decimals: u32,
    asset_minting_decimals: u32,
    asset_price: Price,
) -> Result<u128, CollateralError> {
    let unit = Price::new(1, asset_price.timestamp, 0);
    amg_to_token_wei_price(token_decimals, unit, asset_minting_decimals, asset_price)
}

pub fn convert_uba_to_amg(uba: u128, granularity_uba: u128) -> u128 {
    uba.checked_div(granularity_uba).unwrap_or_default()
}

pub fn convert_amg_to_uba(amg: u128, granularity_uba: u128) -> Option<u128> {
    amg.checked_mul(granularity_uba)
}

pub fn convert_amg_to_token_wei(amg: u128, amg_to_token_wei_price: u128) -> Option<u128> {
    mul_div(amg, amg_to_token_wei_price, AMG_TOKEN_WEI_PRICE_SCALE)
}

pub fn convert_token_wei_to_amg(wei: u128, amg_to_token_wei_price: u128) -> Option<u128> {
    mul_div(wei, AMG_TOKEN_WEI_PRICE_SCALE, amg_to_token_wei_price)
}

pub fn convert_uba_to_token_wei(
    uba: u128,
    granularity_uba: u128,
    amg_to_token_wei_price: u128,
) -> Option<u128> {
    convert_amg_to_token_wei(convert_uba_to_amg(uba, granularity_uba), amg_to_token_wei_price)
}
