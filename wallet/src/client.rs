//! Chain-specific wallet capability and its JSON-RPC gateway implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synth_types::{PaymentReference, SourceId, UbaAmount};
use tracing::debug;

use crate::error::WalletError;
use crate::keystore::SecretKey;

/// Default timeout for gateway requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A payment to be signed and broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub source: String,
    pub target: String,
    pub amount: UbaAmount,
    pub reference: Option<PaymentReference>,
}

/// A freshly generated account.
#[derive(Debug)]
pub struct NewAccount {
    pub address: String,
    pub secret: SecretKey,
}

/// What a chain has to offer a wallet.
#[async_trait]
pub trait WalletClient: Send + Sync {
    fn source_id(&self) -> SourceId;

    async fn create_account(&self) -> Result<NewAccount, WalletError>;

    async fn get_balance(&self, address: &str) -> Result<UbaAmount, WalletError>;

    /// Sign and broadcast; returns the transaction hash.
    async fn submit_payment(
        &self,
        order: &PaymentOrder,
        key: &SecretKey,
    ) -> Result<String, WalletError>;
}

/// [`WalletClient`] backed by a signing gateway speaking JSON-RPC
/// (`{"action": ..., ...}` in, `{"result": ...}` or `{"error": ...}` out).
#[derive(Clone)]
pub struct RpcWalletClient {
    http: reqwest::Client,
    url: String,
    source_id: SourceId,
}

#[derive(Deserialize)]
struct CreateAccountResult {
    address: String,
    secret: String,
}

#[derive(Deserialize)]
struct BalanceResult {
    balance: UbaAmount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResult {
    tx_hash: String,
}

impl RpcWalletClient {
    pub fn new(url: impl Into<String>, source_id: SourceId) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            url: url.into(),
            source_id,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<T, WalletError> {
        let mut body = params;
        let object = body
            .as_object_mut()
            .ok_or_else(|| WalletError::Client("params must be a JSON object".into()))?;
        object.insert("action".into(), serde_json::json!(action));
        object.insert("chain".into(), serde_json::json!(self.source_id.name()));

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    WalletError::Transient(e.to_string())
                } else {
                    WalletError::Client(format!("request failed: {e}"))
                }
            })?;

        if response.status().is_server_error() {
            return Err(WalletError::Transient(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(WalletError::Client(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WalletError::Client(format!("invalid JSON response: {e}")))?;
        if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
            return Err(WalletError::Client(format!("{action}: {err}")));
        }
        let result = json.get("result").cloned().unwrap_or(json);
        serde_json::from_value(result)
            .map_err(|e| WalletError::Client(format!("invalid {action} response: {e}")))
    }
}

impl std::fmt::Debug for RpcWalletClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWalletClient")
            .field("url", &self.url)
            .field("source_id", &self.source_id)
            .finish()
    }
}

#[async_trait]
impl WalletClient for RpcWalletClient {
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    async fn create_account(&self) -> Result<NewAccount, WalletError> {
        let result: CreateAccountResult =
            self.rpc_call("create_account", serde_json::json!({})).await?;
        Ok(NewAccount {
            address: result.address,
            secret: SecretKey::new(result.secret),
        })
    }

    async fn get_balance(&self, address: &str) -> Result<UbaAmount, WalletError> {
        let result: BalanceResult = self
            .rpc_call("balance", serde_json::json!({ "address": address }))
            .await?;
        Ok(result.balance)
    }

    async fn submit_payment(
        &self,
        order: &PaymentOrder,
        key: &SecretKey,
    ) -> Result<String, WalletError> {
        let mut params = serde_json::to_value(order)
            .map_err(|e| WalletError::Client(format!("cannot encode payment: {e}")))?;
        if let Some(object) = params.as_object_mut() {
            object.insert("secret".into(), serde_json::json!(key.expose()));
        }
        let result: SubmitResult = self.rpc_call("send_payment", params).await?;
        debug!(tx_hash = %result.tx_hash, target = %order.target, "payment broadcast");
        Ok(result.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_gateway_is_transient() {
        let client = RpcWalletClient::new("http://127.0.0.1:1", SourceId::Btc);
        let err = client.get_balance("addr").await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    #[test]
    fn test_order_json_shape() {
        let order = PaymentOrder {
            source: "a".into(),
            target: "b".into(),
            amount: UbaAmount::new(9_950),
            reference: None,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["amount"], "9950");
        assert!(json["reference"].is_null());
    }
}
