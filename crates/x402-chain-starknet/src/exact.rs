//! Exact-Starknet: typed-data payload, paymaster settlement.
//!
//! Structural verification only (`typedData` present, non-empty signature,
//! a non-empty account address) — actual STARK-curve signature validity is
//! delegated to the paymaster's own simulation at settlement time, since no
//! Starknet signing/hashing primitive ships in this workspace's dependency
//! stack (spec §1 names "Starknet paymaster" as an external collaborator).
//! See DESIGN.md for this open-question resolution.

use crate::provider::StarknetChainProvider;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::instrument;
use x402_core::SchemeFacilitator;
use x402_types::payload::{PayloadAuthorization, StarknetPayload};
use x402_types::requirements::Scheme;
use x402_types::{ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

pub struct ExactStarknetFacilitator {
    provider: StarknetChainProvider,
}

impl ExactStarknetFacilitator {
    pub fn new(provider: StarknetChainProvider) -> Self {
        ExactStarknetFacilitator { provider }
    }

    fn starknet_payload(payload: &PaymentPayload) -> Option<&StarknetPayload> {
        match &payload.payload {
            PayloadAuthorization::Starknet(p) => Some(p),
            _ => None,
        }
    }

    #[instrument(skip_all)]
    fn check(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<StarknetPayload, ErrorReason> {
        if requirements.scheme != Scheme::Exact || payload.accepted.scheme != Scheme::Exact {
            return Err(ErrorReason::UnsupportedScheme);
        }
        if !requirements.network.is_starknet() {
            return Err(ErrorReason::NetworkMismatch);
        }
        let starknet_payload = Self::starknet_payload(payload).ok_or(ErrorReason::InvalidPayload)?.clone();
        if starknet_payload.typed_data.is_null() || !starknet_payload.typed_data.is_object() {
            return Err(ErrorReason::InvalidPayload);
        }
        if starknet_payload.signature.is_empty() || starknet_payload.account_address.is_empty() {
            return Err(ErrorReason::InvalidPayload);
        }
        Ok(starknet_payload)
    }
}

#[async_trait]
impl SchemeFacilitator for ExactStarknetFacilitator {
    fn get_extra(&self) -> Option<HashMap<String, serde_json::Value>> {
        Some(self.provider.extra())
    }

    fn get_signers(&self) -> Vec<String> {
        vec![self.provider.sponsor_address().to_string()]
    }

    async fn verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse {
        match self.check(payload, requirements) {
            Ok(p) => VerifyResponse::valid(p.account_address),
            Err(reason) => VerifyResponse::invalid(reason),
        }
    }

    #[instrument(skip_all)]
    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        let p = match self.check(payload, requirements) {
            Ok(ok) => ok,
            Err(reason) => return SettleResponse::failure(requirements.network.to_string(), reason),
        };

        // Canonical CAIP form is rewritten into the response regardless of
        // which form (legacy or canonical) the requirements carried (spec
        // §4.5: "the settle response's network is rewritten back to the
        // canonical CAIP form before returning").
        let canonical_network = requirements.network.canonicalize().to_string();

        match self
            .provider
            .settle_via_paymaster(&p.typed_data, &p.signature, &p.account_address)
            .await
        {
            Ok(tx_hash) => SettleResponse::success(canonical_network, tx_hash, p.account_address),
            Err(_) => SettleResponse::failure(canonical_network, ErrorReason::TransactionFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_types::{Amount, ChainId};

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: ChainId::new("starknet", "SN_SEPOLIA"),
            asset: "0xasset".into(),
            amount: Amount::new(1000),
            pay_to: "0xpayto".into(),
            max_timeout_seconds: 60,
            extra: Default::default(),
        }
    }

    fn payload(requirements: PaymentRequirements, typed_data: serde_json::Value) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            resource: "https://example.com".into(),
            accepted: requirements,
            payload: PayloadAuthorization::Starknet(StarknetPayload {
                typed_data,
                signature: vec!["0x1".into(), "0x2".into()],
                account_address: "0xaccount".into(),
            }),
        }
    }

    #[test]
    fn missing_typed_data_is_invalid_payload() {
        let provider = StarknetChainProvider::new("https://paymaster.example", None, "0xsponsor");
        let facilitator = ExactStarknetFacilitator::new(provider);
        let reqs = requirements();
        let p = payload(reqs.clone(), serde_json::Value::Null);
        let err = facilitator.check(&p, &reqs).unwrap_err();
        assert_eq!(err, ErrorReason::InvalidPayload);
    }

    #[test]
    fn legacy_network_canonicalizes_on_success_path() {
        let legacy = ChainId::new("starknet", "SN_SEPOLIA");
        let canonical = ChainId::new("starknet", "393402133025997798000961");
        assert_eq!(legacy.canonicalize(), canonical.canonicalize());
    }
}
