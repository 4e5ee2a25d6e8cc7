use synth_chain::ChainError;
use synth_utils::WaitTimedOut;
use thiserror::Error;

use crate::request::AttestationType;

/// Failures of the attestation client.
///
/// Everything except [`Decode`](Self::Decode) is retryable on the caller's
/// next loop tick; requests are idempotent.
#[derive(Debug, Error)]
pub enum AttestationHelperError {
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("address {0} not used in transaction")]
    AddressNotFound(String),

    #[error("overflow block not found (block {block}, deadline timestamp {deadline_timestamp}, height {height})")]
    OverflowBlockNotFound {
        block: u64,
        deadline_timestamp: u64,
        height: u64,
    },

    #[error("finalization block {0} not found")]
    FinalizationBlockNotFound(u64),

    #[error("{0}: not proved")]
    NotProved(AttestationType),

    #[error("indexer {operation}({params}) failed: {source}")]
    Indexer {
        operation: &'static str,
        params: String,
        #[source]
        source: ChainError,
    },

    #[error("attestation network: {0}")]
    Network(String),

    #[error("proof verifier: {0}")]
    Verifier(String),

    #[error("malformed attestation data: {0}")]
    Decode(String),

    #[error(transparent)]
    TimedOut(#[from] WaitTimedOut),
}

impl AttestationHelperError {
    pub fn indexer(operation: &'static str, params: impl Into<String>, source: ChainError) -> Self {
        Self::Indexer {
            operation,
            params: params.into(),
            source,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }

    /// Network and timeout failures the actor loop should back off on.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::TimedOut(_) => true,
            Self::Indexer { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
