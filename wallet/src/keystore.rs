//! Private key storage.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::WalletError;

/// A chain-specific private key (WIF, seed, hex, ...). Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

/// Where the wallet keeps keys for the addresses it controls.
pub trait KeyStore: Send + Sync {
    fn add_key(&self, address: &str, key: SecretKey) -> Result<(), WalletError>;

    fn get_key(&self, address: &str) -> Result<Option<SecretKey>, WalletError>;

    fn remove_key(&self, address: &str) -> Result<bool, WalletError>;

    fn addresses(&self) -> Result<Vec<String>, WalletError>;
}

/// Keys held in process memory only.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, SecretKey>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn keys(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SecretKey>>, WalletError> {
        self.keys
            .lock()
            .map_err(|_| WalletError::Key("key store lock poisoned".into()))
    }
}

impl KeyStore for MemoryKeyStore {
    fn add_key(&self, address: &str, key: SecretKey) -> Result<(), WalletError> {
        self.keys()?.insert(address.to_string(), key);
        Ok(())
    }

    fn get_key(&self, address: &str) -> Result<Option<SecretKey>, WalletError> {
        Ok(self.keys()?.get(address).cloned())
    }

    fn remove_key(&self, address: &str) -> Result<bool, WalletError> {
        Ok(self.keys()?.remove(address).is_some())
    }

    fn addresses(&self) -> Result<Vec<String>, WalletError> {
        let mut addresses: Vec<String> = self.keys()?.keys().cloned().collect();
        addresses.sort();
        Ok(addresses)
    }
}

impl fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.keys.lock().map(|k| k.len()).unwrap_or_default();
        f.debug_struct("MemoryKeyStore").field("keys", &count).finish()
    }
}
