//! Nullable price oracle.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use synth_collateral::{CollateralError, Price, PriceSource};
use synth_types::Timestamp;

/// Scripted `(symbol, trusted)` readings.
#[derive(Default)]
pub struct NullPriceSource {
    prices: Mutex<HashMap<(String, bool), Price>>,
}

impl NullPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the same reading on both the primary and the trusted feed.
    pub fn set_price(&self, symbol: &str, price: u128, timestamp: u64, decimals: u32) {
        let reading = Price::new(price, Timestamp::new(timestamp), decimals);
        let mut prices = self.prices.lock().unwrap();
        prices.insert((symbol.to_string(), false), reading);
        prices.insert((symbol.to_string(), true), reading);
    }

    pub fn set_feed(&self, symbol: &str, trusted: bool, reading: Price) {
        self.prices
            .lock()
            .unwrap()
            .insert((symbol.to_string(), trusted), reading);
    }
}

#[async_trait]
impl PriceSource for NullPriceSource {
    async fn get_price(&self, symbol: &str, trusted: bool) -> Result<Price, CollateralError> {
        self.prices
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), trusted))
            .copied()
            .ok_or_else(|| CollateralError::PriceUnavailable {
                symbol: symbol.to_string(),
                trusted,
            })
    }
}
