//! A whole protocol in memory: underlying chain, attestation network,
//! asset manager, oracle, wallet and clock, all nullable.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use synth_agent::{AgentBot, AgentContext, AgentIdentity, BotMetrics, HealthKeeper, SystemKeeper};
use synth_attestation::AttestationClient;
use synth_chain::{ChainTransaction, TxInputOutput, TxStatus};
use synth_collateral::{AssetSettings, CollateralClass, CollateralType, PriceReader};
use synth_contracts::{
    AgentCollateralTypes, AgentInfo, AssetManagerEvent, CollateralReserved, RelayProofVerifier,
    RedemptionRequested,
};
use synth_nullables::{
    NullAssetManager, NullAttestationNetwork, NullClock, NullIndexer, NullPriceSource, NullStore,
    NullWalletClient,
};
use synth_store::AgentStore;
use synth_types::{Address, AgentStatus, PaymentReference, SourceId, Timestamp, UbaAmount};
use synth_utils::PollSettings;
use synth_wallet::{BlockchainWallet, KeyStore, MemoryKeyStore, SecretKey};

pub const AGENT_UNDERLYING: &str = "agent-underlying";
pub const MINTER_UNDERLYING: &str = "minter-underlying";
pub const REDEEMER_UNDERLYING: &str = "redeemer-underlying";

pub const START_HEIGHT: u64 = 100;
pub const GENESIS: u64 = 1_000_000;
pub const BLOCK_TIME: u64 = 600;

pub fn addr(n: u8) -> Address {
    Address::parse(&format!("0x{n:040x}")).unwrap()
}

pub fn asset_manager_address() -> Address {
    addr(0xa1)
}

pub fn owner() -> Address {
    addr(0xb2)
}

pub fn vault() -> Address {
    addr(0xc3)
}

pub fn settings() -> AssetSettings {
    AssetSettings {
        asset_symbol: "BTC".into(),
        asset_decimals: 8,
        asset_minting_decimals: 8,
        asset_minting_granularity_uba: 1,
        lot_size_amg: 10_000,
        ccb_time_seconds: 180,
        min_underlying_backing_bips: 10_000,
        max_trusted_price_age_seconds: 120,
    }
}

fn collateral(class: CollateralClass, symbol: &str, min: u128, ccb: u128, safety: u128) -> CollateralType {
    CollateralType {
        class,
        token: "0x00000000000000000000000000000000000000d0".into(),
        decimals: 8,
        direct_price_pair: false,
        asset_ftso_symbol: "BTC".into(),
        token_ftso_symbol: symbol.into(),
        min_collateral_ratio_bips: min,
        ccb_min_collateral_ratio_bips: ccb,
        safety_min_collateral_ratio_bips: safety,
    }
}

/// An agent backing 10_000 UBA; with flat prices the vault ratio in bips
/// equals `vault_collateral`.
pub fn agent_info(vault_collateral: u128) -> AgentInfo {
    AgentInfo {
        status: AgentStatus::Normal,
        owner_address: owner(),
        underlying_address: AGENT_UNDERLYING.into(),
        total_vault_collateral_wei: vault_collateral,
        vault_collateral_ratio_bips: vault_collateral,
        total_pool_collateral_wei: 30_000,
        pool_collateral_ratio_bips: 30_000,
        total_agent_pool_tokens_wei: 15_000,
        total_pool_token_supply_wei: 30_000,
        minted_uba: 10_000,
        reserved_uba: 0,
        redeeming_uba: 0,
        pool_redeeming_uba: 0,
        ccb_start_timestamp: None,
        liquidation_start_timestamp: None,
        underlying_balance_uba: 50_000,
        free_underlying_balance_uba: 40_000,
        announced_underlying_withdrawal_id: 0,
    }
}

pub struct World {
    pub chain: Arc<NullIndexer>,
    pub network: Arc<NullAttestationNetwork>,
    pub contract: Arc<NullAssetManager>,
    pub wallet_client: Arc<NullWalletClient>,
    pub prices: Arc<NullPriceSource>,
    pub clock: Arc<NullClock>,
    pub store: Arc<NullStore>,
    pub metrics: Arc<BotMetrics>,
    pub ctx: AgentContext,
    pub identity: AgentIdentity,
}

impl World {
    pub fn new() -> Self {
        Self::with_poll(PollSettings::new(
            Duration::from_millis(1),
            Duration::from_millis(200),
        ))
    }

    pub fn with_poll(poll: PollSettings) -> Self {
        let chain = Arc::new(NullIndexer::new(SourceId::Btc, START_HEIGHT, GENESIS, BLOCK_TIME));
        let network = Arc::new(NullAttestationNetwork::new(chain.clone()));
        let attestation = AttestationClient::new(
            network.clone(),
            Arc::new(RelayProofVerifier::new(network.clone())),
            chain.clone(),
        )
        .with_poll_settings(poll);

        let contract = Arc::new(NullAssetManager::new(asset_manager_address(), settings()));
        contract.set_collateral_types(AgentCollateralTypes {
            vault: collateral(CollateralClass::Vault, "USDX", 14_000, 13_000, 15_000),
            pool: collateral(CollateralClass::Pool, "NAT", 20_000, 19_000, 21_000),
        });
        contract.set_agent_info(&vault(), agent_info(30_000));

        let clock = Arc::new(NullClock::new(chain.block_timestamp(START_HEIGHT).as_secs()));
        let prices = Arc::new(NullPriceSource::new());
        for symbol in ["BTC", "USDX", "NAT"] {
            prices.set_price(symbol, 100_000, clock_secs(&clock), 5);
        }

        let metrics = Arc::new(BotMetrics::new().unwrap());
        let ctx = AgentContext {
            chain: chain.clone(),
            attestation,
            asset_manager: contract.clone(),
            clock: clock.clone(),
            metrics: metrics.clone(),
            query_window_seconds: 86_400,
            confirmation_grace_seconds: 3_600,
        };
        let wallet_client = Arc::new(NullWalletClient::new(SourceId::Btc).with_chain(chain.clone()));

        Self {
            chain,
            network,
            contract,
            wallet_client,
            prices,
            clock,
            store: Arc::new(NullStore::new()),
            metrics,
            ctx,
            identity: AgentIdentity {
                vault: vault(),
                owner: owner(),
                underlying_address: AGENT_UNDERLYING.into(),
            },
        }
    }

    pub fn agent_store(&self) -> Arc<dyn AgentStore> {
        self.store.clone()
    }

    pub fn wallet(&self) -> BlockchainWallet {
        let keys = Arc::new(MemoryKeyStore::new());
        keys.add_key(AGENT_UNDERLYING, SecretKey::new("agent-secret"))
            .unwrap();
        BlockchainWallet::new(self.wallet_client.clone(), keys)
    }

    pub async fn bot(&self) -> AgentBot {
        self.bot_with_prices(self.prices.clone()).await
    }

    pub async fn bot_with_prices(&self, prices: Arc<NullPriceSource>) -> AgentBot {
        let health = HealthKeeper::load(
            self.ctx.clone(),
            self.identity.clone(),
            PriceReader::new(prices, 120),
        )
        .await
        .unwrap();
        AgentBot::new(
            self.ctx.clone(),
            self.identity.clone(),
            self.agent_store(),
            self.wallet(),
            health,
        )
    }

    pub fn system_keeper(&self) -> SystemKeeper {
        SystemKeeper::new(
            self.ctx.clone(),
            addr(0xf8),
            self.agent_store(),
            PriceReader::new(self.prices.clone(), 120),
        )
    }

    pub fn now(&self) -> u64 {
        clock_secs(&self.clock)
    }

    pub fn ts(&self, block: u64) -> Timestamp {
        self.chain.block_timestamp(block)
    }

    /// Reserve collateral of this agent: `value` plus `fee` to be paid
    /// within `[first, last]`.
    pub fn reserve(&self, id: u64, value: u128, fee: u128, first: u64, last: u64) -> u64 {
        self.contract
            .emit(AssetManagerEvent::CollateralReserved(CollateralReserved {
                agent_vault: vault(),
                minter: addr(0xe5),
                collateral_reservation_id: id,
                value_uba: UbaAmount::new(value),
                fee_uba: UbaAmount::new(fee),
                first_underlying_block: first,
                last_underlying_block: last,
                last_underlying_timestamp: self.ts(last),
                payment_address: AGENT_UNDERLYING.into(),
                payment_reference: PaymentReference::minting(id),
            }))
    }

    pub fn request_redemption(&self, id: u64, value: u128, fee: u128, first: u64, last: u64) -> u64 {
        self.contract
            .emit(AssetManagerEvent::RedemptionRequested(RedemptionRequested {
                agent_vault: vault(),
                redeemer: addr(0xe6),
                request_id: id,
                payment_address: REDEEMER_UNDERLYING.into(),
                value_uba: UbaAmount::new(value),
                fee_uba: UbaAmount::new(fee),
                first_underlying_block: first,
                last_underlying_block: last,
                last_underlying_timestamp: self.ts(last),
                payment_reference: PaymentReference::redemption(id),
            }))
    }

    /// Put a payment from `from` to `to` in the next block.
    pub fn pay(
        &self,
        hash: &str,
        from: &str,
        to: &str,
        amount: u128,
        reference: Option<PaymentReference>,
    ) -> u64 {
        self.chain.add_to_next_block(ChainTransaction {
            hash: hash.into(),
            inputs: vec![TxInputOutput::new(from, amount)],
            outputs: vec![TxInputOutput::new(to, amount)],
            reference,
            status: TxStatus::Success,
        })
    }
}

fn clock_secs(clock: &NullClock) -> u64 {
    use synth_types::Clock;
    clock.now().as_secs()
}

/// Hashes that never collide with the null wallet's counters.
pub fn tx_hash(n: u64) -> String {
    format!("ee{n:062x}")
}
