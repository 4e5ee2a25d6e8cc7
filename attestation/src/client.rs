//! HTTP client for the attestation network's `/api/proof` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::AttestationHelperError;
use crate::network::AttestationNetwork;
use crate::response::AttestedResponse;

/// Default timeout for attestation network requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `{status, data}` wrapper of every proof API response.
#[derive(Debug, Deserialize)]
struct ProofApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    latest_available_round_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitData {
    round_id: u64,
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    request: &'a str,
}

pub struct HttpAttestationNetwork {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAttestationNetwork {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/proof/{}", self.base_url, path)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<ProofApiEnvelope<T>, AttestationHelperError> {
        let status = response.status();
        // The proof API answers errors with HTTP 500 and an envelope body.
        if !status.is_success() && status != reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            return Err(AttestationHelperError::Network(format!(
                "{operation}: HTTP status {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AttestationHelperError::Decode(format!("{operation}: {e}")))
    }
}

fn map_send_error(e: reqwest::Error) -> AttestationHelperError {
    if e.is_timeout() {
        AttestationHelperError::Network(format!("request timed out: {e}"))
    } else if e.is_connect() {
        AttestationHelperError::Network(format!("connection failed: {e}"))
    } else {
        AttestationHelperError::Network(e.to_string())
    }
}

#[async_trait]
impl AttestationNetwork for HttpAttestationNetwork {
    async fn latest_finalized_round(&self) -> Result<Option<u64>, AttestationHelperError> {
        let response = self
            .http_client
            .get(self.url("status"))
            .send()
            .await
            .map_err(map_send_error)?;
        let envelope: ProofApiEnvelope<StatusData> = Self::read_envelope(response, "status").await?;
        if envelope.status != "OK" {
            trace!(status = %envelope.status, "proof status not OK");
            return Ok(None);
        }
        Ok(envelope.data.map(|d| d.latest_available_round_id))
    }

    async fn submit_request(&self, data: &str) -> Result<Option<u64>, AttestationHelperError> {
        let response = self
            .http_client
            .post(self.url("submit"))
            .json(&SubmitBody { request: data })
            .send()
            .await
            .map_err(map_send_error)?;
        let envelope: ProofApiEnvelope<SubmitData> = Self::read_envelope(response, "submit").await?;
        if envelope.status != "OK" {
            trace!(
                status = %envelope.status,
                error = envelope.error_message.as_deref().unwrap_or(""),
                "request declined"
            );
            return Ok(None);
        }
        Ok(envelope.data.map(|d| d.round_id))
    }

    async fn responses_for_round(
        &self,
        round: u64,
    ) -> Result<Vec<AttestedResponse>, AttestationHelperError> {
        let response = self
            .http_client
            .get(self.url(&format!("votes-for-round/{round}")))
            .send()
            .await
            .map_err(map_send_error)?;
        let envelope: ProofApiEnvelope<Vec<AttestedResponse>> =
            Self::read_envelope(response, "votes-for-round").await?;
        if envelope.status != "OK" {
            return Ok(Vec::new());
        }
        Ok(envelope.data.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let net = HttpAttestationNetwork::new("https://attest.example/");
        assert_eq!(net.url("status"), "https://attest.example/api/proof/status");
        assert_eq!(
            net.url("votes-for-round/12"),
            "https://attest.example/api/proof/votes-for-round/12"
        );
    }

    #[test]
    fn test_status_envelope_shape() {
        let env: ProofApiEnvelope<StatusData> = serde_json::from_str(
            r#"{"status":"OK","data":{"latestAvailableRoundId":812}}"#,
        )
        .unwrap();
        assert_eq!(env.data.unwrap().latest_available_round_id, 812);
    }

    #[tokio::test]
    async fn test_unreachable_network_is_transient() {
        let net = HttpAttestationNetwork::with_timeout("http://127.0.0.1:1", Duration::from_millis(500));
        let err = net.round_finalized(1).await.unwrap_err();
        assert!(err.is_transient(), "unexpected {err:?}");
    }
}
