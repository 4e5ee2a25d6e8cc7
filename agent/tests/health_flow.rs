//! Health keeping driven by price epochs and liquidation events.

mod support;

use std::sync::Arc;

use synth_agent::Actor;
use synth_collateral::CollateralClass;
use synth_contracts::{AssetManager, AssetManagerEvent};
use synth_nullables::{ContractCall, NullPriceSource};
use synth_types::{AgentStatus, Timestamp};
use support::*;

#[tokio::test]
async fn test_healthy_agent_is_left_alone() {
    let world = World::new();
    let mut bot = world.bot().await;

    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();

    assert_eq!(bot.health().status(), AgentStatus::Normal);
    assert!(world.contract.calls_to("startLiquidation").is_empty());
    assert!(deposits(&world).is_empty());
}

fn deposits(world: &World) -> Vec<u128> {
    world
        .contract
        .calls_to("depositVaultCollateral")
        .into_iter()
        .filter_map(|call| match call {
            ContractCall::DepositVaultCollateral { amount_wei, .. } => Some(amount_wei),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_undercollateralized_agent_tops_up_instead_of_liquidating() {
    let world = World::new();
    let mut bot = world.bot().await;

    // Vault ratio 1.2x, below the 1.3x liquidation threshold.
    world.contract.set_agent_info(&vault(), agent_info(12_000));
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();

    // Enough to reach 1.2 times the threshold, 1.56x.
    assert_eq!(deposits(&world), vec![3_600]);
    assert!(world.contract.calls_to("buyCollateralPoolTokens").is_empty());
    assert!(world.contract.calls_to("startLiquidation").is_empty());
    assert_eq!(world.metrics.top_ups.with_label_values(&["vault"]).get(), 1);
    assert_eq!(bot.health().status(), AgentStatus::Liquidation);

    // The contract never liquidated; the topped-up agent is normal again.
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 2 });
    bot.step().await.unwrap();
    assert_eq!(bot.health().status(), AgentStatus::Normal);
    assert_eq!(deposits(&world).len(), 1);
    assert_eq!(
        world.metrics.agent_status.get(),
        i64::from(AgentStatus::Normal.code())
    );
}

#[tokio::test]
async fn test_price_rise_triggers_top_up() {
    let world = World::new();
    let mut bot = world.bot().await;

    world.contract.set_agent_info(&vault(), agent_info(16_000));
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();
    assert_eq!(bot.health().status(), AgentStatus::Normal);
    assert!(deposits(&world).is_empty());

    // Asset up 25%: 1.28x, and the backing is now worth 12_500 wei.
    world
        .prices
        .set_price("BTC", 125_000, world.ts(START_HEIGHT).as_secs() + 90, 5);
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 2 });
    bot.step().await.unwrap();

    assert_eq!(deposits(&world), vec![3_500]);
    assert!(world.contract.calls_to("startLiquidation").is_empty());
}

#[tokio::test]
async fn test_rejected_top_up_is_tried_next_epoch() {
    let world = World::new();
    let mut bot = world.bot().await;

    world.contract.set_agent_info(&vault(), agent_info(12_000));
    world
        .contract
        .revert_next("depositVaultCollateral", "ERC20: insufficient allowance");
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();
    assert_eq!(world.metrics.top_ups.with_label_values(&["vault"]).get(), 0);

    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 2 });
    bot.step().await.unwrap();
    assert_eq!(deposits(&world), vec![3_600, 3_600]);
    assert_eq!(world.metrics.top_ups.with_label_values(&["vault"]).get(), 1);
}

#[tokio::test]
async fn test_liquidation_ended_after_top_up_returns_to_normal() {
    let world = World::new();
    let mut bot = world.bot().await;

    let mut liquidating = agent_info(12_000);
    liquidating.status = AgentStatus::Liquidation;
    world.contract.set_agent_info(&vault(), liquidating);
    world.contract.emit(AssetManagerEvent::LiquidationStarted {
        agent_vault: vault(),
        timestamp: Timestamp::new(5),
    });
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();
    assert_eq!(bot.health().status(), AgentStatus::Liquidation);
    assert_eq!(deposits(&world), vec![3_600]);

    // Someone ends the liquidation of the topped-up agent; the ratios the bot
    // saw last were still 1.2x.
    world
        .contract
        .end_liquidation(&vault(), &addr(0xf8))
        .await
        .unwrap();
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 2 });
    bot.step().await.unwrap();

    assert_eq!(bot.health().status(), AgentStatus::Normal);
    assert!(world.contract.calls_to("startLiquidation").is_empty());
    assert_eq!(
        bot.health().state().ratio(CollateralClass::Vault),
        Some(15_600)
    );
}

#[tokio::test]
async fn test_liquidation_ends_only_with_contract_event() {
    let world = World::new();
    let mut bot = world.bot().await;

    let mut liquidating = agent_info(30_000);
    liquidating.status = AgentStatus::Liquidation;
    world.contract.set_agent_info(&vault(), liquidating);
    world.contract.emit(AssetManagerEvent::LiquidationStarted {
        agent_vault: vault(),
        timestamp: Timestamp::new(5),
    });
    bot.step().await.unwrap();
    assert_eq!(bot.health().status(), AgentStatus::Liquidation);

    // Healthy again, but still liquidating until the contract says otherwise.
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();
    assert_eq!(bot.health().status(), AgentStatus::Liquidation);

    world.contract.set_agent_info(&vault(), agent_info(30_000));
    world.contract.emit(AssetManagerEvent::LiquidationEnded {
        agent_vault: vault(),
    });
    bot.step().await.unwrap();
    assert_eq!(bot.health().status(), AgentStatus::Normal);
    assert!(world.contract.calls_to("startLiquidation").is_empty());
    assert!(world.contract.calls_to("endLiquidation").is_empty());
}

#[tokio::test]
async fn test_destroyed_agent_stays_destroying() {
    let world = World::new();
    let mut bot = world.bot().await;

    world.contract.emit(AssetManagerEvent::AgentDestroyed {
        agent_vault: vault(),
    });
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();

    assert_eq!(bot.health().status(), AgentStatus::Destroying);
    assert!(world.contract.calls_to("startLiquidation").is_empty());
}

#[tokio::test]
async fn test_missing_prices_do_not_stop_the_bot() {
    let world = World::new();
    let mut bot = world.bot_with_prices(Arc::new(NullPriceSource::new())).await;

    world.request_redemption(20, 10_000, 50, 100, 120);
    world
        .contract
        .emit(AssetManagerEvent::PriceEpochFinalized { epoch: 1 });
    bot.step().await.unwrap();

    assert_eq!(world.wallet_client.payments().len(), 1);
}
