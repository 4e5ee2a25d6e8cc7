use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollateralError {
    #[error("no price for {symbol} (trusted: {trusted})")]
    PriceUnavailable { symbol: String, trusted: bool },

    #[error("price source failed: {0}")]
    Source(String),

    #[error("zero price for {0}")]
    ZeroPrice(String),

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("invalid asset settings: {0}")]
    InvalidSettings(String),
}
