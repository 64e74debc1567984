//! `PaymentRequired`: the server's 402 response body/header (spec §4.4 step 3,
//! §6 "Wire: Payment headers").

use crate::requirements::PaymentRequirements;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequired {
    pub fn new(accepts: Vec<PaymentRequirements>, resource: Option<String>) -> Self {
        PaymentRequired {
            x402_version: 1,
            accepts,
            resource,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
