//! `PaymentPayload`: client-to-server signed payment authorization.

use crate::amount::Amount;
use crate::requirements::PaymentRequirements;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// EIP-3009 `transferWithAuthorization` authorization, used by the Exact-EVM scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: Amount,
    pub valid_after: u64,
    pub valid_before: u64,
    pub nonce: String,
    pub signature: String,
}

/// EIP-2612 `Permit` authorization, reused as the Upto-EVM batched-cap payload.
///
/// `to` plays the role of EIP-2612's `spender` and MUST equal one of the
/// facilitator's signer addresses (checked in verify precondition 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitAuthorization {
    pub from: String,
    pub to: String,
    pub value: Amount,
    pub valid_before: u64,
    pub nonce: String,
    pub signature: String,
}

/// Exact-SVM payload: a fully signed Solana transaction, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaTransferPayload {
    pub transaction: String,
}

/// Exact-Starknet payload: typed data plus signature and account address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarknetPayload {
    pub typed_data: Value,
    pub signature: Vec<String>,
    pub account_address: String,
}

/// Scheme-specific authorization carried by a [`PaymentPayload`].
///
/// Untagged: the four shapes are structurally distinct enough (field names
/// and the `typedData`/`transaction` discriminants) that serde can pick the
/// right variant without an explicit tag, matching the wire format produced
/// by non-Rust x402 clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadAuthorization {
    Starknet(StarknetPayload),
    Solana(SolanaTransferPayload),
    Eip3009(Eip3009Authorization),
    Permit(PermitAuthorization),
}

impl PayloadAuthorization {
    /// The Starknet `typedData` field, if this is a Starknet payload with a
    /// non-null object value (per the client retry loop's assertion).
    pub fn starknet_typed_data(&self) -> Option<&Value> {
        match self {
            PayloadAuthorization::Starknet(p) if p.typed_data.is_object() => Some(&p.typed_data),
            _ => None,
        }
    }
}

/// The full client-to-server payment envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub resource: String,
    pub accepted: PaymentRequirements,
    pub payload: PayloadAuthorization,
}
