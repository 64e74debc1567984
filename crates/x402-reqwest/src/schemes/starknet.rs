//! Exact-Starknet client signer.
//!
//! No Starknet Rust SDK exists in this workspace's dependency stack (see
//! `x402-chain-starknet`'s crate docs), so typed-data signing is delegated
//! to an injected [`StarknetSigner`] rather than hand-rolled here — the
//! caller supplies whatever wallet/account integration it already has.

use async_trait::async_trait;
use serde_json::Value;
use x402_types::payload::{PayloadAuthorization, StarknetPayload};
use x402_types::requirements::Scheme;
use x402_types::{PaymentPayload, PaymentRequirements};

use crate::error::X402Error;
use crate::scheme::ClientScheme;

/// Produces a Starknet account signature over SNIP-12 typed data.
///
/// Implementors own however they reach the signing key (a local keystore,
/// a browser wallet bridge, a remote signer) and the typed-data construction
/// itself; this trait only carries the boundary the retry loop needs.
#[async_trait]
pub trait StarknetSigner: Send + Sync {
    fn account_address(&self) -> String;

    /// Builds the SNIP-12 typed data and signs it for `requirements`,
    /// returning `(typed_data, signature)`.
    async fn sign_typed_data(&self, requirements: &PaymentRequirements) -> Result<(Value, Vec<String>), X402Error>;
}

pub struct StarknetClient<S> {
    signer: S,
}

impl<S: StarknetSigner> StarknetClient<S> {
    pub fn new(signer: S) -> Self {
        StarknetClient { signer }
    }
}

#[async_trait]
impl<S: StarknetSigner> ClientScheme for StarknetClient<S> {
    fn accept(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == Scheme::Exact && requirements.network.is_starknet()
    }

    async fn sign(&self, requirements: &PaymentRequirements) -> Result<PaymentPayload, X402Error> {
        let (typed_data, signature) = self.signer.sign_typed_data(requirements).await?;
        if !typed_data.is_object() {
            return Err(X402Error::StarknetTypedDataMissing);
        }

        Ok(PaymentPayload {
            x402_version: 1,
            resource: String::new(),
            accepted: requirements.clone(),
            payload: PayloadAuthorization::Starknet(StarknetPayload {
                typed_data,
                signature,
                account_address: self.signer.account_address(),
            }),
        })
    }
}
