//! Bot configuration with TOML file support.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use synth_types::{Address, SourceId};
use synth_utils::PollSettings;

use crate::logging::LogFormat;
use crate::AgentError;

/// Configuration of one agent bot and/or challenger.
///
/// Loaded with [`BotConfig::from_toml_file`]; the contract, attestation and
/// indexer endpoints have no defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotConfig {
    /// Underlying chain the asset manager mints for.
    pub source_id: SourceId,

    pub asset_manager: Address,

    /// JSON-RPC endpoint of the smart-contract chain gateway.
    pub contract_gateway_url: String,

    /// Account that signs contract calls.
    pub owner_address: Address,

    /// Agent vault to operate. Without it only the challenger can run.
    #[serde(default)]
    pub agent_vault: Option<Address>,

    /// The agent's address on the underlying chain.
    #[serde(default)]
    pub underlying_address: Option<String>,

    /// Wallet RPC endpoint for underlying payments.
    #[serde(default)]
    pub wallet_url: Option<String>,

    /// JSON file holding minting and redemption records.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Pause between two steps of the same actor.
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Upper bound of the backoff after transient failures.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// A trusted price older than this (relative to the primary one) is ignored.
    #[serde(default = "default_max_trusted_price_age_seconds")]
    pub max_trusted_price_age_seconds: u64,

    /// How long after the payment block others may confirm a redemption.
    #[serde(default = "default_confirmation_grace_seconds")]
    pub confirmation_grace_seconds: u64,

    /// Query window of ConfirmedBlockHeightExists proofs used to unstick mintings.
    #[serde(default = "default_query_window_seconds")]
    pub query_window_seconds: u64,

    /// Run the challenger actor.
    #[serde(default)]
    pub challenger: bool,

    /// Account the challenger sends challenges from; the owner when unset.
    #[serde(default)]
    pub challenger_address: Option<Address>,

    /// Agents the challenger watches from the start.
    #[serde(default)]
    pub challenger_agents: Vec<Address>,

    /// Run the system keeper, which starts and ends liquidation of any agent.
    #[serde(default)]
    pub system_keeper: bool,

    /// Agents the system keeper checks from the start.
    #[serde(default)]
    pub system_keeper_agents: Vec<Address>,

    /// The agent tops up collateral below this multiple, in bips, of the
    /// liquidation threshold.
    #[serde(default = "default_top_up_factor_bips")]
    pub top_up_factor_bips: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter, e.g. "info" or "debug,synth_agent=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where the metrics text is written on shutdown.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,

    pub attestation: AttestationConfig,

    /// Indexer per source chain, keyed by chain name ("BTC", "XRP", ...).
    #[serde(default)]
    pub indexers: BTreeMap<String, IndexerConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestationConfig {
    pub url: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Bound on one round finalization wait.
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ── Serde default helpers ───────────────────────────────────────────────

fn default_store_path() -> PathBuf {
    PathBuf::from("./agent-state.json")
}

fn default_loop_interval_ms() -> u64 {
    5_000
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_max_trusted_price_age_seconds() -> u64 {
    120
}

fn default_confirmation_grace_seconds() -> u64 {
    3_600
}

fn default_query_window_seconds() -> u64 {
    86_400
}

fn default_top_up_factor_bips() -> u64 {
    12_000
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_round_timeout_secs() -> u64 {
    600
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl BotConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, AgentError> {
        let config: Self = toml::from_str(s).map_err(|e| AgentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, AgentError> {
        toml::to_string_pretty(self).map_err(|e| AgentError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.agent_vault.is_none() && !self.challenger && !self.system_keeper {
            return Err(AgentError::Config(
                "nothing to run: set agent_vault or enable the challenger or system keeper".into(),
            ));
        }
        if self.top_up_factor_bips < 10_000 {
            return Err(AgentError::Config(
                "top_up_factor_bips must be at least 10000".into(),
            ));
        }
        if self.agent_vault.is_some() {
            if self.underlying_address.as_deref().map_or(true, str::is_empty) {
                return Err(AgentError::Config(
                    "agent_vault requires underlying_address".into(),
                ));
            }
            if self.wallet_url.is_none() {
                return Err(AgentError::Config("agent_vault requires wallet_url".into()));
            }
        }
        if self.loop_interval_ms == 0 || self.attestation.poll_interval_ms == 0 {
            return Err(AgentError::Config("intervals must be positive".into()));
        }
        self.indexer()?;
        self.log_format()?;
        Ok(())
    }

    /// Indexer settings of the configured source chain.
    pub fn indexer(&self) -> Result<&IndexerConfig, AgentError> {
        self.indexers
            .iter()
            .find(|(name, _)| name.parse::<SourceId>().is_ok_and(|id| id == self.source_id))
            .map(|(_, indexer)| indexer)
            .ok_or_else(|| {
                AgentError::Config(format!("no indexer configured for {}", self.source_id))
            })
    }

    pub fn log_format(&self) -> Result<LogFormat, AgentError> {
        self.log_format.parse()
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.loop_interval_ms))
    }

    pub fn attestation_poll(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.attestation.poll_interval_ms),
            Duration::from_secs(self.attestation.round_timeout_secs),
        )
    }

    pub fn challenger_address(&self) -> &Address {
        self.challenger_address.as_ref().unwrap_or(&self.owner_address)
    }
}
