//! Underlying-chain wallet.
//!
//! [`BlockchainWallet`] is the only payment path lifecycles use. Chain
//! specifics live behind [`WalletClient`]; key custody behind [`KeyStore`].

pub mod client;
pub mod error;
pub mod keystore;
pub mod wallet;

pub use client::{NewAccount, PaymentOrder, RpcWalletClient, WalletClient};
pub use error::WalletError;
pub use keystore::{KeyStore, MemoryKeyStore, SecretKey};
pub use wallet::BlockchainWallet;
