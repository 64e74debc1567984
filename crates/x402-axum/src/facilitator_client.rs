//! A [`Facilitator`] implementation that talks to a _remote_ x402 facilitator
//! over HTTP (spec §6 Environment: `FACILITATOR_URL`).
//!
//! A resource server need not embed chain signers or RPC providers at all —
//! it can instead point a [`FacilitatorClient`] at an already-running
//! facilitator service's `/verify`, `/settle`, `/supported` endpoints and use
//! it wherever a local [`FacilitatorCore`](x402_core::FacilitatorCore) would
//! otherwise go, e.g. behind [`crate::PaymentGate`].
//!
//! Cheap to clone: it shares a `reqwest::Client` connection pool internally.

use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;
use url::Url;
use x402_core::{Facilitator, SupportedKind};
use x402_types::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl FacilitatorClient {
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let verify_url = base_url.join("./verify").map_err(|e| FacilitatorClientError::UrlParse {
            context: "constructing ./verify URL",
            source: e,
        })?;
        let settle_url = base_url.join("./settle").map_err(|e| FacilitatorClientError::UrlParse {
            context: "constructing ./settle URL",
            source: e,
        })?;
        let supported_url = base_url.join("./supported").map_err(|e| FacilitatorClientError::UrlParse {
            context: "constructing ./supported URL",
            source: e,
        })?;
        Ok(FacilitatorClient {
            base_url,
            verify_url,
            settle_url,
            supported_url,
            client: reqwest::Client::new(),
            timeout: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut this = self.clone();
        this.timeout = Some(timeout);
        this
    }

    async fn post_json<T, R>(&self, url: &Url, context: &'static str, payload: &T) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.post(url.clone()).json(payload);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req.send().await.map_err(|e| FacilitatorClientError::Http { context, source: e })?;
        let status = response.status();
        if status.is_success() {
            response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FacilitatorClientError::HttpStatus { context, status, body })
        }
    }

    async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.get(url.clone());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req.send().await.map_err(|e| FacilitatorClientError::Http { context, source: e })?;
        let status = response.status();
        if status.is_success() {
            response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FacilitatorClientError::HttpStatus { context, status, body })
        }
    }
}

impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "parsing base url",
            source: e,
        })?;
        FacilitatorClient::try_new(url)
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequestBody<'a> {
    payment_payload: &'a PaymentPayload,
    payment_requirements: &'a PaymentRequirements,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SupportedResponseBody {
    kinds: Vec<SupportedKind>,
}

/// `Facilitator::verify`/`settle` don't return a `Result` (spec §7: protocol
/// failures are structured 200 responses, never propagated as errors), so a
/// transport failure talking to the remote facilitator has to collapse into
/// one of those structured shapes. It is logged at `error` level and mapped
/// to `invalid_payload`/`transaction_failed` rather than panicking the
/// caller — see DESIGN.md's resolution for this client's error mapping.
#[async_trait]
impl Facilitator for FacilitatorClient {
    #[instrument(skip_all, fields(url = %self.verify_url))]
    async fn verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse {
        let body = FacilitatorRequestBody {
            payment_payload: payload,
            payment_requirements: requirements,
        };
        match self.post_json::<_, VerifyResponse>(&self.verify_url, "POST /verify", &body).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "remote facilitator verify failed");
                VerifyResponse::invalid(x402_types::ErrorReason::InvalidPayload)
            }
        }
    }

    #[instrument(skip_all, fields(url = %self.settle_url))]
    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        let body = FacilitatorRequestBody {
            payment_payload: payload,
            payment_requirements: requirements,
        };
        match self.post_json::<_, SettleResponse>(&self.settle_url, "POST /settle", &body).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "remote facilitator settle failed");
                SettleResponse::failure(requirements.network.to_string(), x402_types::ErrorReason::TransactionFailed)
            }
        }
    }

    #[instrument(skip_all, fields(url = %self.supported_url))]
    async fn supported(&self) -> Vec<SupportedKind> {
        match self.get_json::<SupportedResponseBody>(&self.supported_url, "GET /supported").await {
            Ok(body) => body.kinds,
            Err(err) => {
                tracing::error!(error = %err, "remote facilitator supported query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_join_relative_to_base() {
        let client = FacilitatorClient::try_from("https://facilitator.example.com").unwrap();
        assert_eq!(client.verify_url.as_str(), "https://facilitator.example.com/verify");
        assert_eq!(client.settle_url.as_str(), "https://facilitator.example.com/settle");
        assert_eq!(client.supported_url.as_str(), "https://facilitator.example.com/supported");
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let a = FacilitatorClient::try_from("https://facilitator.example.com").unwrap();
        let b = FacilitatorClient::try_from("https://facilitator.example.com/").unwrap();
        assert_eq!(a.verify_url, b.verify_url);
    }
}
