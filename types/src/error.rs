//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown source chain: {0}")]
    UnknownSource(String),

    #[error("invalid payment reference: {0}")]
    InvalidReference(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
