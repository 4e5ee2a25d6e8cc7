use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("chain error: {0}")]
    Chain(#[from] synth_chain::ChainError),

    #[error("attestation error: {0}")]
    Attestation(#[from] synth_attestation::AttestationHelperError),

    #[error("collateral error: {0}")]
    Collateral(#[from] synth_collateral::CollateralError),

    #[error("store error: {0}")]
    Store(#[from] synth_store::StoreError),

    #[error("wallet error: {0}")]
    Wallet(#[from] synth_wallet::WalletError),

    #[error("contract error: {0}")]
    Contract(#[from] synth_contracts::ContractError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redemption {request_id} cannot be confirmed by others before {allowed_at}")]
    ConfirmationTooEarly { request_id: u64, allowed_at: u64 },

    #[error("proof does not match {0}")]
    UnexpectedProof(String),
}

impl AgentError {
    /// Failures the actor loop backs off on and retries.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Chain(e) => e.is_transient(),
            Self::Attestation(e) => e.is_transient(),
            Self::Wallet(e) => e.is_transient(),
            Self::Contract(e) => e.is_transient(),
            _ => false,
        }
    }
}
