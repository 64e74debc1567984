//! `(scheme, network) -> SchemeFacilitator` registry and the engine-level
//! `Facilitator` contract it presents to the HTTP glue.

use crate::hooks::{Hooks, SettleContext, VerifyContext};
use crate::scheme::SchemeFacilitator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use x402_types::requirements::Scheme;
use x402_types::{ChainId, ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("missing paymentPayload or paymentRequirements")]
    MissingParameters,
}

/// One entry in the aggregated `/supported` view.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    pub scheme: Scheme,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<HashMap<String, serde_json::Value>>,
    pub signers: Vec<String>,
}

/// The uniform verify/settle/supported contract exposed to HTTP handlers.
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse;
    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse;
    async fn supported(&self) -> Vec<SupportedKind>;
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct RegistryKey {
    scheme: &'static str,
    network: ChainId,
}

fn scheme_key(scheme: Scheme) -> &'static str {
    match scheme {
        Scheme::Exact => "exact",
        Scheme::Upto => "upto",
    }
}

/// The dispatch engine: holds one [`SchemeFacilitator`] per `(scheme,
/// canonicalized network)` and the host's registered [`Hooks`].
pub struct FacilitatorCore {
    handlers: HashMap<RegistryKey, Arc<dyn SchemeFacilitator>>,
    hooks: Hooks,
}

impl FacilitatorCore {
    pub fn new(hooks: Hooks) -> Self {
        FacilitatorCore {
            handlers: HashMap::new(),
            hooks,
        }
    }

    /// Registers a handler for `(scheme, network)`. Both the canonical and
    /// legacy forms of a Starknet network canonicalize to the same key, so
    /// registering once covers both wire forms.
    pub fn register(&mut self, scheme: Scheme, network: ChainId, handler: Arc<dyn SchemeFacilitator>) {
        let key = RegistryKey {
            scheme: scheme_key(scheme),
            network: network.canonicalize(),
        };
        self.handlers.insert(key, handler);
    }

    fn lookup(&self, scheme: Scheme, network: &ChainId) -> Option<&Arc<dyn SchemeFacilitator>> {
        let key = RegistryKey {
            scheme: scheme_key(scheme),
            network: network.canonicalize(),
        };
        self.handlers.get(&key)
    }
}

#[async_trait]
impl Facilitator for FacilitatorCore {
    async fn verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse {
        let ctx = VerifyContext { payload, requirements };

        if let crate::hooks::HookOutcome::Abort { reason } = self.hooks.run_before_verify(&ctx) {
            let response = VerifyResponse::invalid(reason);
            self.hooks.run_after_verify(&ctx, &response);
            return response;
        }

        let response = self.dispatch_verify(payload, requirements).await;
        self.hooks.run_after_verify(&ctx, &response);
        response
    }

    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        let ctx = SettleContext { payload, requirements };

        if let crate::hooks::HookOutcome::Abort { reason } = self.hooks.run_before_settle(&ctx) {
            let response = SettleResponse::failure(requirements.network.to_string(), reason);
            self.hooks.run_after_settle(&ctx, &response);
            return response;
        }

        let response = self.dispatch_settle(payload, requirements).await;
        self.hooks.run_after_settle(&ctx, &response);
        response
    }

    async fn supported(&self) -> Vec<SupportedKind> {
        self.handlers
            .iter()
            .map(|(key, handler)| SupportedKind {
                scheme: match key.scheme {
                    "exact" => Scheme::Exact,
                    _ => Scheme::Upto,
                },
                network: key.network.to_string(),
                extra: handler.get_extra(),
                signers: handler.get_signers(),
            })
            .collect()
    }
}

impl FacilitatorCore {
    /// Cross-layer checks every verifier MUST perform (spec §4.1), applied
    /// before delegating to the scheme handler.
    fn cross_layer_check(payload: &PaymentPayload, requirements: &PaymentRequirements) -> Option<ErrorReason> {
        if payload.accepted.scheme != requirements.scheme {
            return Some(ErrorReason::UnsupportedScheme);
        }
        if payload.accepted.network != requirements.network {
            return Some(ErrorReason::NetworkMismatch);
        }
        None
    }

    async fn dispatch_verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse {
        if let Some(reason) = Self::cross_layer_check(payload, requirements) {
            return VerifyResponse::invalid(reason);
        }
        match self.lookup(requirements.scheme, &requirements.network) {
            Some(handler) => handler.verify(payload, requirements).await,
            None => VerifyResponse::invalid(ErrorReason::UnsupportedScheme),
        }
    }

    async fn dispatch_settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        if let Some(reason) = Self::cross_layer_check(payload, requirements) {
            return SettleResponse::failure(requirements.network.to_string(), reason);
        }
        match self.lookup(requirements.scheme, &requirements.network) {
            Some(handler) => handler.settle(payload, requirements).await,
            None => SettleResponse::failure(requirements.network.to_string(), ErrorReason::UnsupportedScheme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct AlwaysValid;

    #[async_trait]
    impl SchemeFacilitator for AlwaysValid {
        fn get_signers(&self) -> Vec<String> {
            vec!["0xfacilitator".to_string()]
        }

        async fn verify(&self, _payload: &PaymentPayload, _requirements: &PaymentRequirements) -> VerifyResponse {
            VerifyResponse::valid("0xpayer")
        }

        async fn settle(&self, _payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
            SettleResponse::success(requirements.network.to_string(), "0xtxhash", "0xpayer")
        }
    }

    fn sample_requirements(network: ChainId) -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network,
            asset: "0xasset".into(),
            amount: x402_types::Amount::new(1000),
            pay_to: "0xpayTo".into(),
            max_timeout_seconds: 60,
            extra: Default::default(),
        }
    }

    fn sample_payload(requirements: PaymentRequirements) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            resource: "https://example.com/resource".into(),
            accepted: requirements,
            payload: x402_types::payload::PayloadAuthorization::Eip3009(x402_types::Eip3009Authorization {
                from: "0xfrom".into(),
                to: "0xto".into(),
                value: x402_types::Amount::new(1000),
                valid_after: 0,
                valid_before: u64::MAX,
                nonce: "0xnonce".into(),
                signature: "0xsig".into(),
            }),
        }
    }

    #[tokio::test]
    async fn unsupported_scheme_when_no_handler_registered() {
        let core = FacilitatorCore::new(Hooks::new());
        let network = ChainId::new("eip155", "8453");
        let requirements = sample_requirements(network);
        let payload = sample_payload(requirements.clone());
        let response = core.verify(&payload, &requirements).await;
        assert!(!response.is_valid);
        assert_eq!(response.invalid_reason, Some(ErrorReason::UnsupportedScheme));
    }

    #[tokio::test]
    async fn registered_handler_is_dispatched_to() {
        let mut core = FacilitatorCore::new(Hooks::new());
        let network = ChainId::new("eip155", "8453");
        core.register(Scheme::Exact, network.clone(), Arc::new(AlwaysValid));
        let requirements = sample_requirements(network);
        let payload = sample_payload(requirements.clone());
        let response = core.verify(&payload, &requirements).await;
        assert!(response.is_valid);
    }

    #[tokio::test]
    async fn network_mismatch_between_payload_and_requirements() {
        let mut core = FacilitatorCore::new(Hooks::new());
        let network = ChainId::new("eip155", "8453");
        core.register(Scheme::Exact, network.clone(), Arc::new(AlwaysValid));
        let requirements = sample_requirements(network);
        let mut mismatched_payload = sample_payload(requirements.clone());
        mismatched_payload.accepted.network = ChainId::new("eip155", "1");
        let response = core.verify(&mismatched_payload, &requirements).await;
        assert!(!response.is_valid);
        assert_eq!(response.invalid_reason, Some(ErrorReason::NetworkMismatch));
    }
}
