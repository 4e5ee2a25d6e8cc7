//! Agent bot daemon: runs the agent, challenger and system keeper actors of
//! one asset manager.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use synth_agent::{
    init_logging, run_actor, AgentBot, AgentContext, AgentIdentity, BotConfig, BotMetrics,
    Challenger, HealthKeeper, RunSettings, ShutdownController, SystemKeeper,
};
use synth_attestation::{AttestationClient, HttpAttestationNetwork};
use synth_chain::{AdapterRegistry, HttpIndexerClient, IndexerClient};
use synth_collateral::PriceReader;
use synth_contracts::{ContractGateway, RelayProofVerifier};
use synth_store::{AgentStore, JsonFileStore};
use synth_types::SystemClock;
use synth_wallet::{BlockchainWallet, KeyStore, MemoryKeyStore, RpcWalletClient, SecretKey};

#[derive(Parser)]
#[command(name = "synth-agent-bot", about = "Collateralized-asset agent bot")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "./agent-bot.toml", env = "SYNTH_CONFIG")]
    config: PathBuf,

    /// Overrides the file's log level filter.
    #[arg(long, env = "SYNTH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Overrides the file's log format: "human" or "json".
    #[arg(long, env = "SYNTH_LOG_FORMAT")]
    log_format: Option<String>,

    /// Overrides the file's record store path.
    #[arg(long, env = "SYNTH_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Private key of the agent's underlying address.
    #[arg(long, env = "SYNTH_UNDERLYING_KEY", hide_env_values = true)]
    underlying_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the configured actors until SIGINT or SIGTERM.
    Run,
    /// Validate the configuration and print it with defaults filled in.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = BotConfig::from_toml_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(path) = cli.store_path {
        config.store_path = path;
    }
    config.validate()?;

    match cli.command {
        Command::Check => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        Command::Run => {
            init_logging(config.log_format()?, &config.log_level);
            run(config, cli.underlying_key).await
        }
    }
}

async fn run(config: BotConfig, underlying_key: Option<String>) -> anyhow::Result<()> {
    tracing::info!(
        source = %config.source_id,
        asset_manager = %config.asset_manager,
        agent = config.agent_vault.as_ref().map(|v| v.to_string()).as_deref().unwrap_or("-"),
        challenger = config.challenger,
        system_keeper = config.system_keeper,
        "starting agent bot"
    );

    let indexer = config.indexer()?;
    let adapter = AdapterRegistry::with_defaults().get(config.source_id)?;
    let chain: Arc<dyn IndexerClient> = Arc::new(HttpIndexerClient::with_timeout(
        indexer.url.clone(),
        indexer.api_key.clone(),
        adapter,
        Duration::from_secs(indexer.request_timeout_secs),
    ));
    let request_timeout = Duration::from_secs(config.attestation.request_timeout_secs);
    let gateway = Arc::new(ContractGateway::with_timeout(
        config.contract_gateway_url.clone(),
        config.asset_manager.clone(),
        request_timeout,
    ));
    let network = Arc::new(HttpAttestationNetwork::with_timeout(
        config.attestation.url.clone(),
        request_timeout,
    ));
    let verifier = Arc::new(RelayProofVerifier::new(gateway.clone()));
    let attestation = AttestationClient::new(network, verifier, chain.clone())
        .with_poll_settings(config.attestation_poll());

    let store: Arc<dyn AgentStore> = Arc::new(
        JsonFileStore::open(&config.store_path)
            .with_context(|| format!("opening store {}", config.store_path.display()))?,
    );
    let metrics = Arc::new(BotMetrics::new()?);
    let ctx = AgentContext {
        chain,
        attestation,
        asset_manager: gateway.clone(),
        clock: Arc::new(SystemClock),
        metrics: metrics.clone(),
        query_window_seconds: config.query_window_seconds,
        confirmation_grace_seconds: config.confirmation_grace_seconds,
    };

    let shutdown = ShutdownController::new();
    let settings = RunSettings::new(config.loop_interval(), config.max_backoff());
    let mut tasks = Vec::new();

    if let (Some(vault), Some(underlying), Some(wallet_url)) = (
        config.agent_vault.clone(),
        config.underlying_address.clone(),
        config.wallet_url.clone(),
    ) {
        let keys = Arc::new(MemoryKeyStore::new());
        match underlying_key {
            Some(key) => keys.add_key(&underlying, SecretKey::new(key))?,
            None => tracing::warn!(
                underlying = %underlying,
                "no underlying key given, redemption payments will fail"
            ),
        }
        let wallet = BlockchainWallet::new(
            Arc::new(RpcWalletClient::new(wallet_url, config.source_id)),
            keys,
        );
        let identity = AgentIdentity {
            vault,
            owner: config.owner_address.clone(),
            underlying_address: underlying,
        };
        let prices = PriceReader::new(gateway.clone(), config.max_trusted_price_age_seconds);
        let health = HealthKeeper::load(ctx.clone(), identity.clone(), prices)
            .await
            .context("loading agent health")?
            .with_top_up_factor(u128::from(config.top_up_factor_bips));
        let bot = AgentBot::new(ctx.clone(), identity, store.clone(), wallet, health);
        tasks.push(tokio::spawn(run_actor(
            bot,
            settings,
            metrics.clone(),
            shutdown.subscribe(),
        )));
    }

    if config.challenger {
        let mut challenger =
            Challenger::new(ctx.clone(), config.challenger_address().clone(), store.clone());
        for agent in &config.challenger_agents {
            challenger.track(agent).await?;
        }
        tasks.push(tokio::spawn(run_actor(
            challenger,
            settings,
            metrics.clone(),
            shutdown.subscribe(),
        )));
    }

    if config.system_keeper {
        let prices = PriceReader::new(gateway.clone(), config.max_trusted_price_age_seconds);
        let mut keeper =
            SystemKeeper::new(ctx.clone(), config.owner_address.clone(), store.clone(), prices);
        for agent in &config.system_keeper_agents {
            keeper.track(agent).await?;
        }
        tasks.push(tokio::spawn(run_actor(
            keeper,
            settings,
            metrics.clone(),
            shutdown.subscribe(),
        )));
    }

    if tasks.is_empty() {
        anyhow::bail!(
            "nothing to run: configure an agent vault with a wallet, or enable the challenger or system keeper"
        );
    }

    let reason = shutdown.wait_for_signal().await;
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "actor task panicked");
        }
    }

    if let Some(path) = &config.metrics_path {
        std::fs::write(path, metrics.render()?)
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }
    tracing::info!(%reason, "agent bot exited cleanly");
    Ok(())
}
