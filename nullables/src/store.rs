//! In-memory record storage.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use synth_store::{
    MetaStore, MintingRecord, MintingStore, RedemptionRecord, RedemptionStore, StoreError,
};
use synth_types::Address;

/// In-memory store backed by `BTreeMap`s behind `Mutex`es.
pub struct NullStore {
    mintings: Mutex<BTreeMap<u64, MintingRecord>>,
    redemptions: Mutex<BTreeMap<u64, RedemptionRecord>>,
    meta: Mutex<HashMap<String, Vec<u8>>>,
    fail_redemption_write: AtomicBool,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            mintings: Mutex::new(BTreeMap::new()),
            redemptions: Mutex::new(BTreeMap::new()),
            meta: Mutex::new(HashMap::new()),
            fail_redemption_write: AtomicBool::new(false),
        }
    }

    pub fn minting_count(&self) -> usize {
        self.mintings.lock().unwrap().len()
    }

    pub fn redemption_count(&self) -> usize {
        self.redemptions.lock().unwrap().len()
    }

    /// Fail the next redemption write, as a full disk would.
    pub fn fail_next_redemption_write(&self) {
        self.fail_redemption_write.store(true, Ordering::SeqCst);
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.lock().unwrap().contains_key(key)
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MintingStore for NullStore {
    fn insert_minting(&self, record: &MintingRecord) -> Result<(), StoreError> {
        let mut mintings = self.mintings.lock().unwrap();
        if mintings.contains_key(&record.request_id) {
            return Err(StoreError::Duplicate(format!("minting {}", record.request_id)));
        }
        mintings.insert(record.request_id, record.clone());
        Ok(())
    }

    fn put_minting(&self, record: &MintingRecord) -> Result<(), StoreError> {
        self.mintings
            .lock()
            .unwrap()
            .insert(record.request_id, record.clone());
        Ok(())
    }

    fn get_minting(&self, request_id: u64) -> Result<MintingRecord, StoreError> {
        self.mintings
            .lock()
            .unwrap()
            .get(&request_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("minting {request_id}")))
    }

    fn minting_exists(&self, request_id: u64) -> Result<bool, StoreError> {
        Ok(self.mintings.lock().unwrap().contains_key(&request_id))
    }

    fn open_mintings(&self, agent: &Address) -> Result<Vec<MintingRecord>, StoreError> {
        Ok(self
            .mintings
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.agent_address == agent && !r.is_done())
            .cloned()
            .collect())
    }
}

impl RedemptionStore for NullStore {
    fn insert_redemption(&self, record: &RedemptionRecord) -> Result<(), StoreError> {
        let mut redemptions = self.redemptions.lock().unwrap();
        if redemptions.contains_key(&record.request_id) {
            return Err(StoreError::Duplicate(format!("redemption {}", record.request_id)));
        }
        redemptions.insert(record.request_id, record.clone());
        Ok(())
    }

    fn put_redemption(&self, record: &RedemptionRecord) -> Result<(), StoreError> {
        if self.fail_redemption_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("null store write failed".into()));
        }
        self.redemptions
            .lock()
            .unwrap()
            .insert(record.request_id, record.clone());
        Ok(())
    }

    fn get_redemption(&self, request_id: u64) -> Result<RedemptionRecord, StoreError> {
        self.redemptions
            .lock()
            .unwrap()
            .get(&request_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("redemption {request_id}")))
    }

    fn redemption_exists(&self, request_id: u64) -> Result<bool, StoreError> {
        Ok(self.redemptions.lock().unwrap().contains_key(&request_id))
    }

    fn open_redemptions(&self, agent: &Address) -> Result<Vec<RedemptionRecord>, StoreError> {
        Ok(self
            .redemptions
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.agent_address == agent && !r.is_done())
            .cloned()
            .collect())
    }
}

impl MetaStore for NullStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.meta
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.meta
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        self.meta.lock().unwrap().remove(key);
        Ok(())
    }
}
