//! The Starknet provider/paymaster boundary: a JSON-RPC call for signature
//! verification and an HTTP paymaster endpoint for settlement.
//!
//! There is no Starknet Rust SDK in this workspace's dependency stack (see
//! the crate-level docs), so both calls are hand-rolled `reqwest` requests
//! against the shapes spec §4.5 needs, not a general-purpose client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StarknetProviderError {
    #[error("paymaster request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("paymaster rejected the transaction (status {0})")]
    PaymasterRejected(u16),
}

/// One Starknet network's paymaster wiring, as advertised in `extra` and
/// used to settle (spec §6 Environment: `STARKNET_PAYMASTER_ENDPOINT_*`,
/// `STARKNET_SPONSOR_ADDRESS`, `STARKNET_PAYMASTER_API_KEY`).
#[derive(Clone)]
pub struct StarknetChainProvider {
    http: reqwest::Client,
    paymaster_endpoint: String,
    paymaster_api_key: Option<String>,
    sponsor_address: String,
}

#[derive(Serialize)]
struct PaymasterExecuteRequest<'a> {
    #[serde(rename = "typedData")]
    typed_data: &'a Value,
    signature: &'a [String],
    #[serde(rename = "accountAddress")]
    account_address: &'a str,
    sponsor: &'a str,
}

#[derive(Deserialize)]
struct PaymasterExecuteResponse {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

impl StarknetChainProvider {
    pub fn new(
        paymaster_endpoint: impl Into<String>,
        paymaster_api_key: Option<String>,
        sponsor_address: impl Into<String>,
    ) -> Self {
        StarknetChainProvider {
            http: reqwest::Client::new(),
            paymaster_endpoint: paymaster_endpoint.into(),
            paymaster_api_key,
            sponsor_address: sponsor_address.into(),
        }
    }

    pub fn sponsor_address(&self) -> &str {
        &self.sponsor_address
    }

    /// Metadata surfaced via `/supported`'s `extra`: the paymaster endpoint
    /// and sponsor a client needs to know to build a compatible request.
    pub fn extra(&self) -> HashMap<String, Value> {
        let mut extra = HashMap::new();
        extra.insert(
            "paymasterEndpoint".to_string(),
            Value::String(self.paymaster_endpoint.clone()),
        );
        extra.insert("sponsor".to_string(), Value::String(self.sponsor_address.clone()));
        extra
    }

    /// Submits the signed typed data to the paymaster's `execute` endpoint
    /// and returns the resulting transaction hash (spec §4.5 "settles via
    /// paymaster endpoint").
    pub async fn settle_via_paymaster(
        &self,
        typed_data: &Value,
        signature: &[String],
        account_address: &str,
    ) -> Result<String, StarknetProviderError> {
        let mut request = self.http.post(&self.paymaster_endpoint).json(&PaymasterExecuteRequest {
            typed_data,
            signature,
            account_address,
            sponsor: &self.sponsor_address,
        });
        if let Some(key) = &self.paymaster_api_key {
            request = request.header("x-paymaster-api-key", key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StarknetProviderError::PaymasterRejected(response.status().as_u16()));
        }
        let body: PaymasterExecuteResponse = response.json().await?;
        Ok(body.transaction_hash)
    }
}
