use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    /// The call reached the contract and was rejected.
    #[error("reverted: {0}")]
    Reverted(String),

    /// Node unreachable, timed out or overloaded; worth retrying.
    #[error("transient contract gateway failure: {0}")]
    Transient(String),

    #[error("contract call failed: {0}")]
    Call(String),

    #[error("cannot decode contract data: {0}")]
    Decode(String),

    #[error("agent vault not found: {0}")]
    UnknownAgent(String),
}

impl ContractError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Reverted(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether this is a revert whose reason contains one of `expected`.
    pub fn is_expected_revert(&self, expected: &[&str]) -> bool {
        self.revert_reason()
            .is_some_and(|reason| expected.iter().any(|e| reason.contains(e)))
    }
}

/// Reasons meaning a redemption was already settled by someone else.
pub const REDEMPTION_ALREADY_SETTLED: &[&str] = &[
    "invalid redemption status",
    "invalid request id",
    "redemption already confirmed",
    "redemption already defaulted",
];

/// Reasons meaning a minting was already executed, defaulted or unstuck.
pub const MINTING_ALREADY_SETTLED: &[&str] = &[
    "invalid crt id",
    "collateral reservation not found",
    "minting already executed",
];

pub const ILLEGAL_PAYMENT_EXPECTED: &[&str] = &[
    "chlg: already liquidating",
    "chlg: transaction confirmed",
    "matching redemption active",
    "matching ongoing announced pmt",
];

pub const DOUBLE_PAYMENT_EXPECTED: &[&str] = &["chlg dbl: already liquidating"];

pub const FREE_BALANCE_EXPECTED: &[&str] = &[
    "mult chlg: already liquidating",
    "mult chlg: enough free balance",
    "mult chlg: payment confirmed",
];
