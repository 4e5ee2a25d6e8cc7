use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no private key for {0}")]
    KeyMissing(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("insufficient funds on {address}: need {needed}, have {available}")]
    InsufficientFunds {
        address: String,
        needed: u128,
        available: u128,
    },

    #[error("key error: {0}")]
    Key(String),

    /// Network trouble talking to the chain gateway; worth retrying.
    #[error("chain client unreachable: {0}")]
    Transient(String),

    #[error("chain client error: {0}")]
    Client(String),
}

impl WalletError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
