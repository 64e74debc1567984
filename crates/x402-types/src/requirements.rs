//! `PaymentRequirements`: server-to-client advertisement of an accepted payment option.

use crate::amount::Amount;
use crate::chain_id::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The payment family a [`PaymentRequirements`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Exact,
    Upto,
}

/// One accepted payment option, as advertised by a resource server in a
/// `402 Payment Required` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: Scheme,
    pub network: ChainId,
    pub asset: String,
    pub amount: Amount,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl PaymentRequirements {
    /// `extra.name`/`extra.version` for EIP-712 domain construction.
    pub fn eip712_domain_fields(&self) -> Option<(String, String)> {
        let name = self.extra.get("name")?.as_str()?.to_string();
        let version = self.extra.get("version")?.as_str()?.to_string();
        Some((name, version))
    }

    /// `extra.maxAmountRequired`, falling back to the legacy `extra.maxAmount` key.
    pub fn max_amount_required(&self) -> Option<Amount> {
        self.extra
            .get("maxAmountRequired")
            .or_else(|| self.extra.get("maxAmount"))
            .and_then(|v| v.as_str())
            .map(Amount::parse_lenient)
    }
}
