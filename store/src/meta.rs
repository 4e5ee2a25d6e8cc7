//! Metadata storage trait.

use crate::StoreError;

const LAST_EVENT_BLOCK_PREFIX: &str = "last_event_block:";

/// Generic key-value bookkeeping that doesn't belong to a record store.
pub trait MetaStore: Send + Sync {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a metadata value; [`StoreError::NotFound`] when absent.
    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    /// Last smart-contract-chain block whose events `owner` has processed.
    fn last_event_block(&self, owner: &str) -> Result<Option<u64>, StoreError> {
        let key = format!("{LAST_EVENT_BLOCK_PREFIX}{owner}");
        match self.get_meta(&key) {
            Ok(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Corruption(format!("{key}: {} bytes", bytes.len())))?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_last_event_block(&self, owner: &str, block: u64) -> Result<(), StoreError> {
        self.put_meta(
            &format!("{LAST_EVENT_BLOCK_PREFIX}{owner}"),
            &block.to_be_bytes(),
        )
    }
}
