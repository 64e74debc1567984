//! `VerifyResponse` / `SettleResponse`: the dispatch engine's outward contract.

use crate::error::ErrorReason;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<ErrorReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    pub fn valid(payer: impl Into<String>) -> Self {
        VerifyResponse {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    pub fn invalid(reason: ErrorReason) -> Self {
        VerifyResponse {
            is_valid: false,
            invalid_reason: Some(reason),
            payer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,
    pub transaction: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl SettleResponse {
    pub fn success(network: impl Into<String>, transaction: impl Into<String>, payer: impl Into<String>) -> Self {
        SettleResponse {
            success: true,
            error_reason: None,
            transaction: transaction.into(),
            network: network.into(),
            payer: Some(payer.into()),
        }
    }

    pub fn failure(network: impl Into<String>, reason: ErrorReason) -> Self {
        SettleResponse {
            success: false,
            error_reason: Some(reason),
            transaction: String::new(),
            network: network.into(),
            payer: None,
        }
    }
}
