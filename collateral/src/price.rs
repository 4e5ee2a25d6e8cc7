//! Oracle prices and the trusted-vs-primary freshness rule.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synth_types::Timestamp;
use tracing::trace;

use crate::error::CollateralError;

/// One oracle reading: `price / 10^decimals` units of USD per token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub price: u128,
    pub timestamp: Timestamp,
    pub decimals: u32,
}

impl Price {
    pub fn new(price: u128, timestamp: Timestamp, decimals: u32) -> Self {
        Self {
            price,
            timestamp,
            decimals,
        }
    }
}

/// Where readings come from (the price oracle contracts).
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_price(&self, symbol: &str, trusted: bool) -> Result<Price, CollateralError>;
}

/// The trusted reading wins iff it is at most `max_trusted_age_secs` older
/// than the primary one. The boundary counts as fresh.
pub fn select_price(primary: Price, trusted: Price, max_trusted_age_secs: u64) -> Price {
    if trusted.timestamp.saturating_add(max_trusted_age_secs) >= primary.timestamp {
        trusted
    } else {
        primary
    }
}

/// Reads prices from a [`PriceSource`] and applies [`select_price`].
///
/// The reader itself holds no cache; each logical computation opens a
/// [`PriceSnapshot`] and drops it when done, so a later computation always
/// re-queries the oracle.
#[derive(Clone)]
pub struct PriceReader {
    source: Arc<dyn PriceSource>,
    max_trusted_age_secs: u64,
}

impl PriceReader {
    pub fn new(source: Arc<dyn PriceSource>, max_trusted_age_secs: u64) -> Self {
        Self {
            source,
            max_trusted_age_secs,
        }
    }

    pub fn max_trusted_age_secs(&self) -> u64 {
        self.max_trusted_age_secs
    }

    pub fn snapshot(&self) -> PriceSnapshot<'_> {
        PriceSnapshot {
            reader: self,
            cache: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for PriceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceReader")
            .field("max_trusted_age_secs", &self.max_trusted_age_secs)
            .finish()
    }
}

/// Prices as observed during one computation.
pub struct PriceSnapshot<'a> {
    reader: &'a PriceReader,
    cache: HashMap<(String, bool), Price>,
}

impl PriceSnapshot<'_> {
    pub async fn get_price(&mut self, symbol: &str, trusted: bool) -> Result<Price, CollateralError> {
        let key = (symbol.to_string(), trusted);
        if let Some(price) = self.cache.get(&key) {
            return Ok(*price);
        }
        let price = self.reader.source.get_price(symbol, trusted).await?;
        trace!(symbol, trusted, price = %price.price, ts = price.timestamp.as_secs(), "price read");
        self.cache.insert(key, price);
        Ok(price)
    }

    /// Primary or trusted reading for `symbol`, whichever the freshness rule picks.
    pub async fn selected_price(&mut self, symbol: &str) -> Result<Price, CollateralError> {
        let primary = self.get_price(symbol, false).await?;
        let trusted = self.get_price(symbol, true).await?;
        Ok(select_price(primary, trusted, self.reader.max_trusted_age_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn p(price: u128, ts: u64) -> Price {
        Price::new(price, Timestamp::new(ts), 5)
    }

    #[test]
    fn test_freshness_boundary() {
        let trusted = p(200, 100);
        assert_eq!(select_price(p(100, 150), trusted, 50), trusted);
        assert_eq!(select_price(p(100, 151), trusted, 50), p(100, 151));
    }

    #[test]
    fn test_trusted_newer_than_primary_wins() {
        let trusted = p(7, 300);
        assert_eq!(select_price(p(1, 200), trusted, 0), trusted);
    }

    struct CountingSource(AtomicU32);

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn get_price(&self, _symbol: &str, trusted: bool) -> Result<Price, CollateralError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(p(if trusted { 2 } else { 1 }, 10))
        }
    }

    #[tokio::test]
    async fn test_snapshot_caches_only_within_itself() {
        let source = Arc::new(CountingSource(AtomicU32::new(0)));
        let reader = PriceReader::new(source.clone(), 60);

        let mut snapshot = reader.snapshot();
        snapshot.selected_price("BTC").await.unwrap();
        snapshot.selected_price("BTC").await.unwrap();
        assert_eq!(source.0.load(Ordering::SeqCst), 2);
        drop(snapshot);

        reader.snapshot().selected_price("BTC").await.unwrap();
        assert_eq!(source.0.load(Ordering::SeqCst), 4);
    }
}
