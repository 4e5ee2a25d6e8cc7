//! JSON-RPC client for a contract gateway: a service that holds the node
//! connection and the agent's signing key and exposes the asset manager,
//! the Merkle root relay and the price oracle as named actions.
//!
//! Request: `{"action": "<name>", ...params}`. Response: `{"result": ...}`,
//! `{"error": "<message>"}` or `{"error": {"revert": "<reason>"}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use synth_attestation::AttestationProof;
use synth_collateral::{AssetSettings, CollateralError, Price, PriceSource};
use synth_types::{Address, Bytes32};
use tracing::{debug, info};

use crate::agent_info::{AgentCollateralTypes, AgentInfo};
use crate::asset_manager::{AssetManager, CallHash};
use crate::error::ContractError;
use crate::events::EventRecord;
use crate::verifier::MerkleRootRelay;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ContractGateway {
    /// HTTP client (reusable connection pool).
    http: reqwest::Client,
    url: String,
    asset_manager: Address,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallResult {
    transaction_hash: CallHash,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GatewayError {
    Revert { revert: String },
    Message(String),
}

impl ContractGateway {
    pub fn new(url: impl Into<String>, asset_manager: Address) -> Self {
        Self::with_timeout(url, asset_manager, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, asset_manager: Address, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            url: url.into(),
            asset_manager,
        }
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Value,
    ) -> Result<T, ContractError> {
        let mut body = params;
        let object = body
            .as_object_mut()
            .ok_or_else(|| ContractError::Call("params must be a JSON object".into()))?;
        object.insert("action".into(), json!(action));
        object.insert("assetManager".into(), json!(self.asset_manager.as_str()));

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ContractError::Transient(format!("{action}: {e}"))
                } else {
                    ContractError::Call(format!("{action}: {e}"))
                }
            })?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ContractError::Transient(format!(
                "{action}: gateway returned HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(ContractError::Call(format!(
                "{action}: gateway returned HTTP {status}"
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ContractError::Decode(format!("{action}: {e}")))?;
        if let Some(error) = json.get("error") {
            return Err(match serde_json::from_value::<GatewayError>(error.clone()) {
                Ok(GatewayError::Revert { revert }) => ContractError::Reverted(revert),
                Ok(GatewayError::Message(message)) => ContractError::Call(format!("{action}: {message}")),
                Err(_) => ContractError::Call(format!("{action}: {error}")),
            });
        }
        let result = json.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| ContractError::Decode(format!("{action}: {e}")))
    }

    async fn send(&self, action: &str, params: Value) -> Result<CallHash, ContractError> {
        let result: CallResult = self.rpc_call(action, params).await?;
        info!(action, tx = %result.transaction_hash, "contract call sent");
        Ok(result.transaction_hash)
    }
}

impl std::fmt::Debug for ContractGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractGateway")
            .field("url", &self.url)
            .field("asset_manager", &self.asset_manager)
            .finish()
    }
}

#[async_trait]
impl AssetManager for ContractGateway {
    fn address(&self) -> &Address {
        &self.asset_manager
    }

    async fn finalized_block(&self) -> Result<u64, ContractError> {
        self.rpc_call("finalizedBlock", json!({})).await
    }

    async fn events(
        &self,
        from_block: u64,
        to_block: u64,
        agent: Option<&Address>,
    ) -> Result<Vec<EventRecord>, ContractError> {
        let events: Vec<EventRecord> = self
            .rpc_call(
                "events",
                json!({ "fromBlock": from_block, "toBlock": to_block, "agentVault": agent }),
            )
            .await?;
        debug!(from_block, to_block, count = events.len(), "events read");
        Ok(events)
    }

    async fn get_agent_info(&self, agent: &Address) -> Result<AgentInfo, ContractError> {
        let info: Option<AgentInfo> = self
            .rpc_call("getAgentInfo", json!({ "agentVault": agent }))
            .await?;
        info.ok_or_else(|| ContractError::UnknownAgent(agent.to_string()))
    }

    async fn asset_settings(&self) -> Result<AssetSettings, ContractError> {
        self.rpc_call("getSettings", json!({})).await
    }

    async fn agent_collateral_types(
        &self,
        agent: &Address,
    ) -> Result<AgentCollateralTypes, ContractError> {
        self.rpc_call("getAgentCollateralTypes", json!({ "agentVault": agent }))
            .await
    }

    async fn execute_minting(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "executeMinting",
            json!({ "proof": proof, "collateralReservationId": collateral_reservation_id, "from": from }),
        )
        .await
    }

    async fn minting_payment_default(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "mintingPaymentDefault",
            json!({ "proof": proof, "collateralReservationId": collateral_reservation_id, "from": from }),
        )
        .await
    }

    async fn unstick_minting(
        &self,
        proof: &AttestationProof,
        collateral_reservation_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "unstickMinting",
            json!({ "proof": proof, "collateralReservationId": collateral_reservation_id, "from": from }),
        )
        .await
    }

    async fn confirm_redemption_payment(
        &self,
        proof: &AttestationProof,
        request_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "confirmRedemptionPayment",
            json!({ "proof": proof, "redemptionRequestId": request_id, "from": from }),
        )
        .await
    }

    async fn redemption_payment_default(
        &self,
        proof: &AttestationProof,
        request_id: u64,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "redemptionPaymentDefault",
            json!({ "proof": proof, "redemptionRequestId": request_id, "from": from }),
        )
        .await
    }

    async fn illegal_payment_challenge(
        &self,
        proof: &AttestationProof,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "illegalPaymentChallenge",
            json!({ "proof": proof, "agentVault": agent, "from": from }),
        )
        .await
    }

    async fn double_payment_challenge(
        &self,
        first: &AttestationProof,
        second: &AttestationProof,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "doublePaymentChallenge",
            json!({ "payment1": first, "payment2": second, "agentVault": agent, "from": from }),
        )
        .await
    }

    async fn free_balance_negative_challenge(
        &self,
        proofs: &[AttestationProof],
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "freeBalanceNegativeChallenge",
            json!({ "payments": proofs, "agentVault": agent, "from": from }),
        )
        .await
    }

    async fn start_liquidation(
        &self,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send("startLiquidation", json!({ "agentVault": agent, "from": from }))
            .await
    }

    async fn end_liquidation(
        &self,
        agent: &Address,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send("endLiquidation", json!({ "agentVault": agent, "from": from }))
            .await
    }

    async fn deposit_vault_collateral(
        &self,
        agent: &Address,
        amount_wei: u128,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "depositVaultCollateral",
            json!({ "agentVault": agent, "amountWei": amount_wei.to_string(), "from": from }),
        )
        .await
    }

    async fn buy_collateral_pool_tokens(
        &self,
        agent: &Address,
        amount_wei: u128,
        from: &Address,
    ) -> Result<CallHash, ContractError> {
        self.send(
            "buyCollateralPoolTokens",
            json!({ "agentVault": agent, "amountWei": amount_wei.to_string(), "from": from }),
        )
        .await
    }
}

#[async_trait]
impl MerkleRootRelay for ContractGateway {
    async fn merkle_root(&self, round: u64) -> Result<Option<Bytes32>, ContractError> {
        self.rpc_call("merkleRoot", json!({ "round": round })).await
    }
}

#[async_trait]
impl PriceSource for ContractGateway {
    async fn get_price(&self, symbol: &str, trusted: bool) -> Result<Price, CollateralError> {
        let price: Option<Price> = self
            .rpc_call("getPrice", json!({ "symbol": symbol, "trusted": trusted }))
            .await
            .map_err(|e| CollateralError::Source(e.to_string()))?;
        price.ok_or_else(|| CollateralError::PriceUnavailable {
            symbol: symbol.to_string(),
            trusted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Address {
        Address::parse("0x00000000000000000000000000000000000000ee").unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transient() {
        let gateway = ContractGateway::new("http://127.0.0.1:1", manager());
        let err = gateway.finalized_block().await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }

    #[test]
    fn test_gateway_error_shapes() {
        let revert: GatewayError = serde_json::from_value(json!({ "revert": "chlg: already liquidating" })).unwrap();
        assert!(matches!(revert, GatewayError::Revert { revert } if revert.contains("chlg")));
        let message: GatewayError = serde_json::from_value(json!("nonce too low")).unwrap();
        assert!(matches!(message, GatewayError::Message(_)));
    }
}
