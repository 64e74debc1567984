//! The `SchemeFacilitator` contract every `(scheme, network)` handler implements.

use async_trait::async_trait;
use std::collections::HashMap;
use x402_types::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

/// A verifier/settler for one `(scheme, CAIP-2 family)` pair.
///
/// Implementors are the per-chain scheme crates (`x402-chain-eip155`,
/// `x402-chain-solana`, `x402-chain-starknet`). `settle` is REQUIRED to
/// re-run `verify` internally and short-circuit to a failed
/// [`SettleResponse`] rather than touching chain state when invoked on an
/// unverified payload (spec §4.1).
#[async_trait]
pub trait SchemeFacilitator: Send + Sync {
    /// Scheme/network-specific metadata surfaced via `/supported` (e.g.
    /// EIP-712 domain hints, Upto cap hints, Starknet paymaster endpoint).
    fn get_extra(&self) -> Option<HashMap<String, serde_json::Value>> {
        None
    }

    /// Facilitator signer addresses usable as `spender`/fee-payer on this network.
    fn get_signers(&self) -> Vec<String>;

    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> VerifyResponse;

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> SettleResponse;
}
