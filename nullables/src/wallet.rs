//! Nullable wallet client.
//!
//! Payments can be mirrored onto a [`NullIndexer`] so that they show up as
//! chain transactions in the next block.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use synth_chain::{ChainTransaction, TxInputOutput, TxStatus};
use synth_types::{SourceId, UbaAmount};
use synth_wallet::{NewAccount, PaymentOrder, SecretKey, WalletClient, WalletError};

use crate::chain::NullIndexer;

pub struct NullWalletClient {
    source_id: SourceId,
    chain: Option<Arc<NullIndexer>>,
    balances: Mutex<HashMap<String, u128>>,
    payments: Mutex<Vec<PaymentOrder>>,
    counter: AtomicU64,
    unreachable: AtomicBool,
}

impl NullWalletClient {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            chain: None,
            balances: Mutex::new(HashMap::new()),
            payments: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Put every submitted payment on `chain`.
    pub fn with_chain(mut self, chain: Arc<NullIndexer>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Addresses without a balance are treated as having unlimited funds.
    pub fn set_balance(&self, address: &str, amount: u128) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), amount);
    }

    /// Fail every call with a transient error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn payments(&self) -> Vec<PaymentOrder> {
        self.payments.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<(), WalletError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(WalletError::Transient("null wallet offline".into()));
        }
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl WalletClient for NullWalletClient {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    async fn create_account(&self) -> Result<NewAccount, WalletError> {
        self.check_reachable()?;
        let n = self.next_id();
        Ok(NewAccount {
            address: format!("null-account-{n}"),
            secret: SecretKey::new(format!("null-secret-{n}")),
        })
    }

    async fn get_balance(&self, address: &str) -> Result<UbaAmount, WalletError> {
        self.check_reachable()?;
        Ok(UbaAmount::new(
            self.balances
                .lock()
                .unwrap()
                .get(address)
                .copied()
                .unwrap_or_default(),
        ))
    }

    async fn submit_payment(
        &self,
        order: &PaymentOrder,
        _key: &SecretKey,
    ) -> Result<String, WalletError> {
        self.check_reachable()?;
        {
            let mut balances = self.balances.lock().unwrap();
            if let Some(available) = balances.get_mut(&order.source) {
                let needed = order.amount.raw();
                if *available < needed {
                    return Err(WalletError::InsufficientFunds {
                        address: order.source.clone(),
                        needed,
                        available: *available,
                    });
                }
                *available -= needed;
            }
        }
        let hash = format!("{:064x}", self.next_id());
        if let Some(chain) = &self.chain {
            chain.add_to_next_block(ChainTransaction {
                hash: hash.clone(),
                inputs: vec![TxInputOutput::new(order.source.clone(), order.amount)],
                outputs: vec![TxInputOutput::new(order.target.clone(), order.amount)],
                reference: order.reference,
                status: TxStatus::Success,
            });
        }
        self.payments.lock().unwrap().push(order.clone());
        Ok(hash)
    }
}
