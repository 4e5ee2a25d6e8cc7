//! Health tracking against a scripted oracle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proptest::prelude::*;
use synth_collateral::{
    collateral_ratio_bips, AgentHealthState, AgentPosition, AssetSettings, CollateralClass,
    CollateralError, CollateralType, HealthTracker, Price, PriceReader, PriceSource,
    AMG_TOKEN_WEI_PRICE_SCALE,
};
use synth_types::{Address, AgentStatus, Timestamp};

#[derive(Default)]
struct Oracle {
    prices: Mutex<HashMap<(String, bool), Price>>,
}

impl Oracle {
    fn set(&self, symbol: &str, price: u128, ts: u64) {
        let mut prices = self.prices.lock().unwrap();
        for trusted in [false, true] {
            prices.insert((symbol.into(), trusted), Price::new(price, Timestamp::new(ts), 5));
        }
    }
}

#[async_trait]
impl PriceSource for Oracle {
    async fn get_price(&self, symbol: &str, trusted: bool) -> Result<Price, CollateralError> {
        self.prices
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), trusted))
            .copied()
            .ok_or_else(|| CollateralError::PriceUnavailable {
                symbol: symbol.into(),
                trusted,
            })
    }
}

fn collateral(class: CollateralClass, symbol: &str, min: u128, ccb: u128, safety: u128) -> CollateralType {
    CollateralType {
        class,
        token: "0x00000000000000000000000000000000000000c0".into(),
        decimals: 8,
        direct_price_pair: false,
        asset_ftso_symbol: "BTC".into(),
        token_ftso_symbol: symbol.into(),
        min_collateral_ratio_bips: min,
        ccb_min_collateral_ratio_bips: ccb,
        safety_min_collateral_ratio_bips: safety,
    }
}

fn tracker(oracle: Arc<Oracle>) -> HealthTracker {
    let asset = AssetSettings {
        asset_symbol: "BTC".into(),
        asset_decimals: 8,
        asset_minting_decimals: 8,
        asset_minting_granularity_uba: 1,
        lot_size_amg: 10_000,
        ccb_time_seconds: 180,
        min_underlying_backing_bips: 10_000,
        max_trusted_price_age_seconds: 60,
    };
    HealthTracker::new(
        PriceReader::new(oracle, 60),
        asset,
        collateral(CollateralClass::Vault, "USDX", 14_000, 13_000, 15_000),
        collateral(CollateralClass::Pool, "NAT", 20_000, 19_000, 21_000),
        AgentHealthState::new(
            Address::parse("0x00000000000000000000000000000000000000a1").unwrap(),
            AgentStatus::Normal,
            Timestamp::new(0),
        ),
    )
    .unwrap()
}

fn position(vault: u128, pool: u128) -> AgentPosition {
    AgentPosition {
        minted_uba: 10_000,
        vault_collateral_wei: vault,
        pool_collateral_wei: pool,
        agent_pool_tokens_wei: pool / 2,
        total_pool_tokens_wei: pool,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ccb_then_liquidation_after_ccb_time() {
    let oracle = Arc::new(Oracle::default());
    oracle.set("BTC", 100_000, 1_000);
    oracle.set("USDX", 100_000, 1_000);
    oracle.set("NAT", 100_000, 1_000);
    let mut tracker = tracker(oracle.clone());

    // 1.35x with CCB at 1.4x and liquidation at 1.3x.
    let agent = position(13_500, 30_000);
    let update = tracker.recompute(&agent, Timestamp::new(1_000)).await.unwrap();
    assert_eq!(update.status, AgentStatus::Ccb);
    assert_eq!(update.ratios[&CollateralClass::Vault], 13_500);
    assert_eq!(update.ratios[&CollateralClass::AgentPoolTokens], 15_000);
    assert_eq!(tracker.state().ccb_start_timestamp, Some(Timestamp::new(1_000)));

    let update = tracker.recompute(&agent, Timestamp::new(1_179)).await.unwrap();
    assert!(!update.changed());

    let update = tracker.recompute(&agent, Timestamp::new(1_180)).await.unwrap();
    assert_eq!(update.previous, AgentStatus::Ccb);
    assert_eq!(update.status, AgentStatus::Liquidation);
    assert_eq!(tracker.state().ccb_start_timestamp, None);
}

#[tokio::test]
async fn test_price_move_pushes_agent_into_liquidation() {
    let oracle = Arc::new(Oracle::default());
    oracle.set("BTC", 100_000, 1_000);
    oracle.set("USDX", 100_000, 1_000);
    oracle.set("NAT", 100_000, 1_000);
    let mut tracker = tracker(oracle.clone());
    let agent = position(16_000, 30_000);

    let update = tracker.recompute(&agent, Timestamp::new(1_000)).await.unwrap();
    assert_eq!(update.status, AgentStatus::Normal);

    // BTC up 25%: vault ratio falls to 1.28x.
    oracle.set("BTC", 125_000, 1_010);
    let update = tracker.recompute(&agent, Timestamp::new(1_010)).await.unwrap();
    assert_eq!(update.ratios[&CollateralClass::Vault], 12_800);
    assert_eq!(update.status, AgentStatus::Liquidation);

    // Recovery alone is not enough.
    oracle.set("BTC", 100_000, 1_020);
    let update = tracker.recompute(&agent, Timestamp::new(1_020)).await.unwrap();
    assert_eq!(update.status, AgentStatus::Liquidation);
    assert!(tracker.leave_liquidation(&update.ratios, Timestamp::new(1_030)));
    assert_eq!(tracker.status(), AgentStatus::Normal);
}

#[tokio::test]
async fn test_liquidation_is_kept_while_ratios_stay_low() {
    let oracle = Arc::new(Oracle::default());
    oracle.set("BTC", 100_000, 1_000);
    oracle.set("USDX", 100_000, 1_000);
    oracle.set("NAT", 100_000, 1_000);
    let mut tracker = tracker(oracle);

    let update = tracker.recompute(&position(12_000, 30_000), Timestamp::new(1_000)).await.unwrap();
    assert_eq!(update.status, AgentStatus::Liquidation);
    assert!(!tracker.leave_liquidation(&update.ratios, Timestamp::new(1_010)));
    assert_eq!(tracker.status(), AgentStatus::Liquidation);
}

#[tokio::test]
async fn test_top_up_reaches_prevention_ratio() {
    let oracle = Arc::new(Oracle::default());
    oracle.set("BTC", 100_000, 1_000);
    oracle.set("USDX", 100_000, 1_000);
    oracle.set("NAT", 100_000, 1_000);
    let tracker = tracker(oracle);

    // 1.2 times the 1.3x vault liquidation threshold is 1.56x.
    let top_up = tracker.required_top_up(&position(12_000, 30_000), 12_000).await.unwrap();
    assert_eq!(top_up.vault_wei, 3_600);
    assert_eq!(top_up.pool_wei, 0);
    assert!(top_up.is_needed());

    let healthy = tracker.required_top_up(&position(16_000, 30_000), 12_000).await.unwrap();
    assert!(!healthy.is_needed());
}

#[tokio::test]
async fn test_contract_transition_ends_liquidation_at_safety() {
    let oracle = Arc::new(Oracle::default());
    oracle.set("BTC", 100_000, 1_000);
    oracle.set("USDX", 100_000, 1_000);
    oracle.set("NAT", 100_000, 1_000);
    let tracker = tracker(oracle);
    let now = Timestamp::new(1_000);

    let low = tracker.compute_ratios(&position(12_000, 30_000)).await.unwrap();
    assert_eq!(
        tracker.contract_transition(AgentStatus::Normal, None, &low, now),
        AgentStatus::Liquidation
    );
    let safe = tracker.compute_ratios(&position(15_000, 30_000)).await.unwrap();
    assert_eq!(
        tracker.contract_transition(AgentStatus::Liquidation, None, &safe, now),
        AgentStatus::Normal
    );
    let between = tracker.compute_ratios(&position(14_500, 30_000)).await.unwrap();
    assert_eq!(
        tracker.contract_transition(AgentStatus::Liquidation, None, &between, now),
        AgentStatus::Liquidation
    );
}

#[tokio::test]
async fn test_stale_trusted_price_falls_back_to_primary() {
    let oracle = Arc::new(Oracle::default());
    oracle.set("USDX", 100_000, 1_000);
    oracle.set("NAT", 100_000, 1_000);
    {
        let mut prices = oracle.prices.lock().unwrap();
        prices.insert(("BTC".into(), false), Price::new(100_000, Timestamp::new(1_100), 5));
        prices.insert(("BTC".into(), true), Price::new(200_000, Timestamp::new(1_000), 5));
    }
    let tracker = tracker(oracle);
    let ratios = tracker.compute_ratios(&position(15_000, 30_000)).await.unwrap();
    assert_eq!(ratios[&CollateralClass::Vault], 15_000);
}

#[tokio::test]
async fn test_destroying_is_terminal() {
    let oracle = Arc::new(Oracle::default());
    let mut tracker = tracker(oracle);
    assert!(tracker.mark_destroying(Timestamp::new(5)));
    assert!(!tracker.apply_status(AgentStatus::Normal, Timestamp::new(6)));
    assert_eq!(tracker.status(), AgentStatus::Destroying);
}

#[tokio::test]
async fn test_missing_price_is_reported() {
    let tracker = tracker(Arc::new(Oracle::default()));
    let err = tracker.compute_ratios(&position(1, 1)).await.unwrap_err();
    assert!(matches!(err, CollateralError::PriceUnavailable { .. }));
}

proptest! {
    #[test]
    fn prop_ratio_falls_as_asset_price_rises(
        collateral in 1u128..1_000_000_000_000,
        backed in 1u128..1_000_000_000,
        price in 1u128..1_000_000_000_000,
        bump in 0u128..1_000_000_000,
    ) {
        let low = collateral_ratio_bips(collateral, backed, 1, price).unwrap();
        let high = collateral_ratio_bips(collateral, backed, 1, price + bump).unwrap();
        prop_assert!(high <= low);
    }

    #[test]
    fn prop_ratio_falls_as_minted_grows(
        collateral in 1u128..1_000_000_000_000,
        backed in 0u128..1_000_000_000,
        extra in 0u128..1_000_000_000,
    ) {
        let price = AMG_TOKEN_WEI_PRICE_SCALE;
        let before = collateral_ratio_bips(collateral, backed, 1, price).unwrap();
        let after = collateral_ratio_bips(collateral, backed + extra, 1, price).unwrap();
        prop_assert!(after <= before);
    }
}
