use synth_types::SourceId;
use synth_utils::WaitTimedOut;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Network failure or timeout talking to the indexer. Retry later.
    #[error("indexer unreachable: {0}")]
    Transient(String),

    #[error("indexer request failed: {0}")]
    RequestFailed(String),

    /// The indexer answered with a non-OK envelope.
    #[error("indexer returned {status} for {operation}: {message}")]
    Indexer {
        operation: String,
        status: String,
        message: String,
    },

    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("no format adapter registered for {0}")]
    UnsupportedSource(SourceId),

    #[error(transparent)]
    TimedOut(#[from] WaitTimedOut),
}

impl ChainError {
    pub fn decode(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Whether the actor loop should back off and retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::TimedOut(_))
    }
}
