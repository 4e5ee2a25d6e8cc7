//! Challenger against the nullable protocol: illegal, double and
//! free-balance-negative payments from a tracked agent.

mod support;

use synth_agent::{Actor, Challenger};
use synth_contracts::AssetManagerEvent;
use synth_nullables::ContractCall;
use synth_types::{AgentStatus, PaymentReference};
use support::*;

async fn challenger(world: &World) -> Challenger {
    let mut challenger = Challenger::new(world.ctx.clone(), addr(0xf7), world.agent_store());
    assert!(challenger.track(&vault()).await.unwrap());
    // Sets the underlying cursor at the current finalized block.
    challenger.step().await.unwrap();
    challenger
}

fn challenges(world: &World, kind: &str) -> u64 {
    world
        .metrics
        .challenges
        .with_label_values(&[kind])
        .get()
}

#[tokio::test]
async fn test_payment_without_reference_is_illegal() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.pay(&tx_hash(1), AGENT_UNDERLYING, "elsewhere", 5_000, None);
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 1);
    assert_eq!(challenges(&world, "illegal_payment"), 1);
    assert_eq!(
        world.contract.agent_info(&vault()).unwrap().status,
        AgentStatus::FullLiquidation
    );

    // A liquidated agent is not challenged again.
    world.pay(&tx_hash(2), AGENT_UNDERLYING, "elsewhere", 5_000, None);
    world.chain.mine(6);
    challenger.step().await.unwrap();
    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 1);
}

#[tokio::test]
async fn test_payment_for_unknown_redemption_is_illegal() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.pay(
        &tx_hash(3),
        AGENT_UNDERLYING,
        REDEEMER_UNDERLYING,
        5_000,
        Some(PaymentReference::redemption(99)),
    );
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 1);
}

#[tokio::test]
async fn test_redemption_payment_is_legal() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.request_redemption(7, 10_000, 50, 100, 120);
    world.pay(
        &tx_hash(4),
        AGENT_UNDERLYING,
        REDEEMER_UNDERLYING,
        9_950,
        Some(PaymentReference::redemption(7)),
    );
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert!(world.contract.calls().is_empty());
}

#[tokio::test]
async fn test_incoming_payment_is_not_watched() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.pay(&tx_hash(5), MINTER_UNDERLYING, AGENT_UNDERLYING, 20_500, None);
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert!(world.contract.calls().is_empty());
}

#[tokio::test]
async fn test_second_payment_with_same_reference_is_double() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.request_redemption(8, 10_000, 50, 100, 120);
    for n in [6, 7] {
        world.pay(
            &tx_hash(n),
            AGENT_UNDERLYING,
            REDEEMER_UNDERLYING,
            9_950,
            Some(PaymentReference::redemption(8)),
        );
    }
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert_eq!(world.contract.calls_to("doublePaymentChallenge").len(), 1);
    assert!(world.contract.calls_to("illegalPaymentChallenge").is_empty());
    assert_eq!(challenges(&world, "double_payment"), 1);
}

#[tokio::test]
async fn test_withdrawal_beyond_free_balance_is_challenged() {
    let world = World::new();
    let mut info = agent_info(30_000);
    info.announced_underlying_withdrawal_id = 3;
    info.free_underlying_balance_uba = 1_000;
    world.contract.set_agent_info(&vault(), info);
    let mut challenger = challenger(&world).await;

    world.pay(
        &tx_hash(8),
        AGENT_UNDERLYING,
        "agent-cold-wallet",
        5_000,
        Some(PaymentReference::announced_withdrawal(3)),
    );
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert!(world.contract.calls_to("illegalPaymentChallenge").is_empty());
    let calls = world.contract.calls_to("freeBalanceNegativeChallenge");
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        ContractCall::FreeBalanceNegativeChallenge { agent, payments } => {
            assert_eq!(agent, &vault());
            assert_eq!(*payments, 1);
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test]
async fn test_withdrawal_within_free_balance_is_legal() {
    let world = World::new();
    let mut info = agent_info(30_000);
    info.announced_underlying_withdrawal_id = 4;
    world.contract.set_agent_info(&vault(), info);
    let mut challenger = challenger(&world).await;

    world.pay(
        &tx_hash(9),
        AGENT_UNDERLYING,
        "agent-cold-wallet",
        5_000,
        Some(PaymentReference::announced_withdrawal(4)),
    );
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert!(world.contract.calls().is_empty());
}

#[tokio::test]
async fn test_agents_are_learned_from_events() {
    let world = World::new();
    let mut challenger = Challenger::new(world.ctx.clone(), addr(0xf7), world.agent_store());
    challenger.step().await.unwrap();
    assert!(!challenger.is_tracking(&vault()));

    world.request_redemption(10, 10_000, 50, 100, 120);
    challenger.step().await.unwrap();
    assert!(challenger.is_tracking(&vault()));
}

#[tokio::test]
async fn test_reverted_challenge_is_retried_next_step() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.contract.revert_next("illegalPaymentChallenge", "agent vault busy");
    world.pay(&tx_hash(11), AGENT_UNDERLYING, "elsewhere", 5_000, None);
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 1);
    assert_eq!(challenger.pending_retries(), 1);
    assert_eq!(
        world.contract.agent_info(&vault()).unwrap().status,
        AgentStatus::Normal
    );

    challenger.step().await.unwrap();
    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 2);
    assert_eq!(challenger.pending_retries(), 0);
    assert_eq!(
        world.contract.agent_info(&vault()).unwrap().status,
        AgentStatus::FullLiquidation
    );
}

#[tokio::test]
async fn test_failing_challenge_does_not_stall_the_scan() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.pay(&tx_hash(1), AGENT_UNDERLYING, "elsewhere", 5_000, None);
    world.chain.mine(6);
    world.contract.revert_next("illegalPaymentChallenge", "agent vault busy");
    challenger.step().await.unwrap();

    world.request_redemption(7, 10_000, 50, 100, 120);
    for n in [2, 3] {
        world.pay(
            &tx_hash(n),
            AGENT_UNDERLYING,
            REDEEMER_UNDERLYING,
            9_950,
            Some(PaymentReference::redemption(7)),
        );
    }
    world.chain.mine(6);
    for _ in 0..3 {
        world.contract.revert_next("illegalPaymentChallenge", "agent vault busy");
        challenger.step().await.unwrap();
    }

    assert_eq!(world.contract.calls_to("doublePaymentChallenge").len(), 1);
    assert_eq!(challenges(&world, "double_payment"), 1);
    assert_eq!(
        world.contract.agent_info(&vault()).unwrap().status,
        AgentStatus::FullLiquidation
    );
    // The queued illegal-payment challenge is dropped once the agent is liquidated.
    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 2);
    assert_eq!(challenger.pending_retries(), 0);
}

#[tokio::test]
async fn test_finished_redemption_reference_is_forgotten() {
    let world = World::new();
    let mut challenger = challenger(&world).await;

    world.request_redemption(7, 10_000, 50, 100, 120);
    world.pay(
        &tx_hash(4),
        AGENT_UNDERLYING,
        REDEEMER_UNDERLYING,
        9_950,
        Some(PaymentReference::redemption(7)),
    );
    world.chain.mine(6);
    challenger.step().await.unwrap();
    assert_eq!(
        challenger.payment_for_reference(&PaymentReference::redemption(7)),
        Some(tx_hash(4).as_str())
    );

    world.contract.emit(AssetManagerEvent::RedemptionPerformed {
        agent_vault: vault(),
        request_id: 7,
        transaction_hash: tx_hash(4),
    });
    challenger.step().await.unwrap();
    assert_eq!(
        challenger.payment_for_reference(&PaymentReference::redemption(7)),
        None
    );
    assert!(world.contract.calls().is_empty());
}

#[tokio::test]
async fn test_payment_without_reference_is_not_counted_against_free_balance() {
    let world = World::new();
    let mut info = agent_info(30_000);
    info.free_underlying_balance_uba = 1_000;
    world.contract.set_agent_info(&vault(), info);
    let mut challenger = challenger(&world).await;

    // The contract already knows this payment, so the illegal challenge is
    // refused and the agent stays normal.
    world.contract.revert_next("illegalPaymentChallenge", "chlg: transaction confirmed");
    world.pay(&tx_hash(12), AGENT_UNDERLYING, "elsewhere", 5_000, None);
    world.chain.mine(6);
    challenger.step().await.unwrap();

    assert_eq!(world.contract.calls_to("illegalPaymentChallenge").len(), 1);
    assert!(world.contract.calls_to("freeBalanceNegativeChallenge").is_empty());
    assert_eq!(challenger.pending_retries(), 0);
}
