//! HTTP client for the underlying-chain indexer REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use synth_types::{PaymentReference, SourceId};
use tracing::{debug, trace};

use crate::adapter::{ChainFormatAdapter, OutPoint, PrevoutMap};
use crate::error::ChainError;
use crate::indexer::IndexerClient;
use crate::types::{BlockId, ChainBlock, ChainTransaction};
use crate::wire::{IndexerBlock, IndexerEnvelope, IndexerTransaction};

/// Default timeout for indexer requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const API_KEY_HEADER: &str = "X-API-KEY";

/// Indexer client for one source chain.
///
/// Sends `GET {base_url}/...` and unwraps the `{status, data, errorMessage}`
/// envelope. Raw transactions are normalized through the chain's
/// [`ChainFormatAdapter`]; UTXO inputs are resolved by fetching the previous
/// transactions first.
pub struct HttpIndexerClient {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    adapter: Arc<dyn ChainFormatAdapter>,
}

impl HttpIndexerClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        adapter: Arc<dyn ChainFormatAdapter>,
    ) -> Self {
        Self::with_timeout(base_url, api_key, adapter, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        adapter: Arc<dyn ChainFormatAdapter>,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            adapter,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET {base_url}/{path}` and unwrap the envelope.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &str,
    ) -> Result<Option<T>, ChainError> {
        let url = self.url(path);
        trace!(%url, operation, "indexer request");
        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request.send().await.map_err(map_send_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_send_error)?;
        // Error responses (including 500) still carry an envelope.
        match serde_json::from_slice::<IndexerEnvelope<T>>(&body) {
            Ok(envelope) => envelope.into_result(operation),
            Err(e) if status.is_server_error() => Err(ChainError::Transient(format!(
                "{operation}: HTTP status {status}: {e}"
            ))),
            Err(e) if !status.is_success() => Err(ChainError::RequestFailed(format!(
                "{operation}: HTTP status {status}: {e}"
            ))),
            Err(e) => Err(ChainError::decode(operation, e.to_string())),
        }
    }

    async fn fetch_raw_transaction(
        &self,
        hash: &str,
    ) -> Result<Option<IndexerTransaction>, ChainError> {
        let hash = self.adapter.source_id().normalize_tx_hash(hash);
        self.fetch(&format!("transaction/{hash}"), "transaction")
            .await
    }

    async fn fetch_raw_list(
        &self,
        path: &str,
        operation: &str,
    ) -> Result<Vec<IndexerTransaction>, ChainError> {
        let rows: Vec<IndexerTransaction> = self
            .fetch(path, operation)
            .await?
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| !row.is_empty_block_indicator())
            .collect())
    }

    /// Resolve the outpoints the adapter needs for `raw`.
    async fn resolve_prevouts(&self, raw: &IndexerTransaction) -> Result<PrevoutMap, ChainError> {
        let mut prevouts = PrevoutMap::new();
        for outpoint in self.adapter.required_prevouts(raw)? {
            if prevouts.contains_key(&outpoint) {
                continue;
            }
            let Some(previous) = self.fetch_raw_transaction(&outpoint.txid).await? else {
                debug!(txid = %outpoint.txid, "previous transaction not indexed");
                continue;
            };
            if let Some(output) = self.adapter.output_at(&previous, outpoint.vout)? {
                prevouts.insert(
                    OutPoint {
                        txid: outpoint.txid.clone(),
                        vout: outpoint.vout,
                    },
                    output,
                );
            }
        }
        Ok(prevouts)
    }

    async fn normalize(&self, raw: &IndexerTransaction) -> Result<ChainTransaction, ChainError> {
        let prevouts = self.resolve_prevouts(raw).await?;
        self.adapter.decode(raw, &prevouts)
    }

    async fn normalize_all(
        &self,
        rows: Vec<IndexerTransaction>,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        let mut out = Vec::with_capacity(rows.len());
        for raw in &rows {
            out.push(self.normalize(raw).await?);
        }
        Ok(out)
    }

    async fn block_with_transactions(
        &self,
        header: IndexerBlock,
    ) -> Result<ChainBlock, ChainError> {
        let rows = self
            .fetch_raw_list(
                &format!("transactions-in-block/{}", header.block_number),
                "transactions-in-block",
            )
            .await?;
        let source = self.adapter.source_id();
        let ids = rows
            .iter()
            .map(|row| source.normalize_tx_hash(&row.transaction_id))
            .collect();
        Ok(header.into_block(ids))
    }
}

/// Map reqwest transport errors; timeouts and refused connections are transient.
fn map_send_error(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Transient(format!("request timed out: {e}"))
    } else if e.is_connect() {
        ChainError::Transient(format!("connection failed: {e}"))
    } else {
        ChainError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl IndexerClient for HttpIndexerClient {
    fn source_id(&self) -> SourceId {
        self.adapter.source_id()
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<ChainTransaction>, ChainError> {
        match self.fetch_raw_transaction(hash).await? {
            Some(raw) => Ok(Some(self.normalize(&raw).await?)),
            None => Ok(None),
        }
    }

    async fn get_transaction_block(&self, hash: &str) -> Result<Option<BlockId>, ChainError> {
        let hash = self.source_id().normalize_tx_hash(hash);
        let block: Option<IndexerBlock> = self
            .fetch(&format!("transaction-block/{hash}"), "transaction-block")
            .await?;
        Ok(block.map(|b| b.id()))
    }

    async fn get_block(&self, hash: &str) -> Result<Option<ChainBlock>, ChainError> {
        let header: Option<IndexerBlock> =
            self.fetch(&format!("block/{hash}"), "block").await?;
        match header {
            Some(header) => Ok(Some(self.block_with_transactions(header).await?)),
            None => Ok(None),
        }
    }

    async fn get_block_at(&self, number: u64) -> Result<Option<ChainBlock>, ChainError> {
        let header: Option<IndexerBlock> =
            self.fetch(&format!("block-at/{number}"), "block-at").await?;
        match header {
            Some(header) => Ok(Some(self.block_with_transactions(header).await?)),
            None => Ok(None),
        }
    }

    async fn get_block_height(&self) -> Result<u64, ChainError> {
        self.fetch::<u64>("block-height", "block-height")
            .await?
            .ok_or_else(|| ChainError::decode("block-height", "empty response"))
    }

    async fn get_transactions_by_reference(
        &self,
        reference: &PaymentReference,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        let hex = reference.as_bytes32().to_hex();
        let hex = hex.trim_start_matches("0x");
        let rows = self
            .fetch_raw_list(
                &format!("transactions/payment-reference/{hex}"),
                "transactions/payment-reference",
            )
            .await?;
        self.normalize_all(rows).await
    }

    async fn get_transactions_within_block_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        if from > to {
            return Ok(Vec::new());
        }
        let rows = self
            .fetch_raw_list(&format!("transactions/from/{from}/to/{to}"), "transactions")
            .await?;
        self.normalize_all(rows).await
    }

    async fn get_transactions_in_block(
        &self,
        number: u64,
    ) -> Result<Vec<ChainTransaction>, ChainError> {
        let rows = self
            .fetch_raw_list(
                &format!("transactions-in-block/{number}"),
                "transactions-in-block",
            )
            .await?;
        self.normalize_all(rows).await
    }
}

impl std::fmt::Debug for HttpIndexerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIndexerClient")
            .field("source", &self.adapter.source_id())
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
