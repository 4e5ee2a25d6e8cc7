//! The one wallet type lifecycles pay through.

use std::sync::Arc;

use synth_types::{PaymentReference, SourceId, UbaAmount};
use tracing::{info, warn};

use crate::client::{PaymentOrder, WalletClient};
use crate::error::WalletError;
use crate::keystore::KeyStore;

/// A [`WalletClient`] paired with the keys for the addresses it may spend from.
#[derive(Clone)]
pub struct BlockchainWallet {
    client: Arc<dyn WalletClient>,
    keys: Arc<dyn KeyStore>,
}

impl BlockchainWallet {
    pub fn new(client: Arc<dyn WalletClient>, keys: Arc<dyn KeyStore>) -> Self {
        Self { client, keys }
    }

    pub fn source_id(&self) -> SourceId {
        self.client.source_id()
    }

    /// Pay `amount` from `source` to `target`, tagged with `reference`.
    ///
    /// Returns the transaction hash, normalized for the chain.
    pub async fn add_transaction(
        &self,
        source: &str,
        target: &str,
        amount: UbaAmount,
        reference: Option<PaymentReference>,
    ) -> Result<String, WalletError> {
        if target.is_empty() {
            return Err(WalletError::InvalidAddress(target.to_string()));
        }
        let key = self
            .keys
            .get_key(source)?
            .ok_or_else(|| WalletError::KeyMissing(source.to_string()))?;
        let order = PaymentOrder {
            source: source.to_string(),
            target: target.to_string(),
            amount,
            reference,
        };
        let tx_hash = match self.client.submit_payment(&order, &key).await {
            Ok(hash) => self.source_id().normalize_tx_hash(&hash),
            Err(e) => {
                warn!(source, target, %amount, error = %e, "payment failed");
                return Err(e);
            }
        };
        info!(source, target, %amount, tx_hash = %tx_hash, "payment submitted");
        Ok(tx_hash)
    }

    /// Generate a new address and keep its key.
    pub async fn create_account(&self) -> Result<String, WalletError> {
        let account = self.client.create_account().await?;
        self.keys.add_key(&account.address, account.secret.clone())?;
        info!(address = %account.address, chain = %self.source_id(), "account created");
        Ok(account.address)
    }

    pub async fn get_balance(&self, address: &str) -> Result<UbaAmount, WalletError> {
        self.client.get_balance(address).await
    }

    /// Whether this wallet can sign for `address`.
    pub fn controls(&self, address: &str) -> Result<bool, WalletError> {
        Ok(self.keys.get_key(address)?.is_some())
    }
}

impl std::fmt::Debug for BlockchainWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainWallet")
            .field("source_id", &self.source_id())
            .finish()
    }
}
