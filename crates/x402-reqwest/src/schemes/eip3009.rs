//! Exact-EVM client signer: EIP-3009 `transferWithAuthorization`.

use alloy_primitives::{Address, FixedBytes, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, SolStruct};
use async_trait::async_trait;
use rand::{rng, Rng};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use x402_chain_eip155::abi::TransferWithAuthorization;
use x402_types::payload::{Eip3009Authorization, PayloadAuthorization};
use x402_types::requirements::Scheme;
use x402_types::{PaymentPayload, PaymentRequirements};

use crate::error::X402Error;
use crate::scheme::ClientScheme;

/// Signs Exact-EVM payloads with a facilitator-agnostic EVM signer.
pub struct Eip3009Client {
    signer: Arc<PrivateKeySigner>,
}

impl Eip3009Client {
    pub fn new(signer: Arc<PrivateKeySigner>) -> Self {
        Eip3009Client { signer }
    }
}

#[async_trait]
impl ClientScheme for Eip3009Client {
    fn accept(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == Scheme::Exact && requirements.network.is_eip155()
    }

    async fn sign(&self, requirements: &PaymentRequirements) -> Result<PaymentPayload, X402Error> {
        let (name, version) = requirements
            .eip712_domain_fields()
            .unwrap_or_else(|| (String::new(), String::new()));
        let asset = Address::from_str(&requirements.asset).map_err(|e| X402Error::Signing(e.to_string()))?;
        let to = Address::from_str(&requirements.pay_to).map_err(|e| X402Error::Signing(e.to_string()))?;
        let chain_id = requirements.network.eip155_chain_id();
        let domain = eip712_domain! {
            name: name,
            version: version,
            chain_id: chain_id,
            verifying_contract: asset,
        };

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let valid_after = now.saturating_sub(600);
        let valid_before = now + requirements.max_timeout_seconds;
        let nonce: [u8; 32] = rng().random();

        let typed = TransferWithAuthorization {
            from: self.signer.address(),
            to,
            value: U256::from(requirements.amount.0),
            validAfter: U256::from(valid_after),
            validBefore: U256::from(valid_before),
            nonce: FixedBytes(nonce),
        };
        let signing_hash = typed.eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&signing_hash)
            .await
            .map_err(|e| X402Error::Signing(e.to_string()))?;

        let authorization = Eip3009Authorization {
            from: self.signer.address().to_string(),
            to: to.to_string(),
            value: requirements.amount,
            valid_after,
            valid_before,
            nonce: format!("0x{}", hex::encode(nonce)),
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
        };

        Ok(PaymentPayload {
            x402_version: 1,
            resource: String::new(),
            accepted: requirements.clone(),
            payload: PayloadAuthorization::Eip3009(authorization),
        })
    }
}
