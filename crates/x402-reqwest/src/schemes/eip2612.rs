//! Upto-EVM client signer: EIP-2612 `Permit`, spender fixed to the facilitator.

use alloy_primitives::{Address, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, SolStruct};
use async_trait::async_trait;
use rand::{rng, Rng};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use x402_chain_eip155::abi::Permit;
use x402_types::payload::{PayloadAuthorization, PermitAuthorization};
use x402_types::requirements::Scheme;
use x402_types::{PaymentPayload, PaymentRequirements};

use crate::error::X402Error;
use crate::scheme::ClientScheme;

/// Signs Upto-EVM permits. `requirements.pay_to` is the facilitator signer
/// address, which doubles as the permit's `spender` (spec §4.2 precondition 5).
pub struct Eip2612Client {
    signer: Arc<PrivateKeySigner>,
}

impl Eip2612Client {
    pub fn new(signer: Arc<PrivateKeySigner>) -> Self {
        Eip2612Client { signer }
    }
}

#[async_trait]
impl ClientScheme for Eip2612Client {
    fn accept(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == Scheme::Upto && requirements.network.is_eip155()
    }

    async fn sign(&self, requirements: &PaymentRequirements) -> Result<PaymentPayload, X402Error> {
        let (name, version) = requirements
            .eip712_domain_fields()
            .unwrap_or_else(|| (String::new(), String::new()));
        let asset = Address::from_str(&requirements.asset).map_err(|e| X402Error::Signing(e.to_string()))?;
        let spender = Address::from_str(&requirements.pay_to).map_err(|e| X402Error::Signing(e.to_string()))?;
        let chain_id = requirements.network.eip155_chain_id();
        let domain = eip712_domain! {
            name: name,
            version: version,
            chain_id: chain_id,
            verifying_contract: asset,
        };

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let valid_before = now + requirements.max_timeout_seconds;
        let cap = requirements.max_amount_required().unwrap_or(requirements.amount);
        let nonce: u64 = rng().random();

        let typed = Permit {
            owner: self.signer.address(),
            spender,
            value: U256::from(cap.0),
            nonce: U256::from(nonce),
            deadline: U256::from(valid_before),
        };
        let signing_hash = typed.eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&signing_hash)
            .await
            .map_err(|e| X402Error::Signing(e.to_string()))?;

        let permit = PermitAuthorization {
            from: self.signer.address().to_string(),
            to: spender.to_string(),
            value: cap,
            valid_before,
            nonce: nonce.to_string(),
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
        };

        Ok(PaymentPayload {
            x402_version: 1,
            resource: String::new(),
            accepted: requirements.clone(),
            payload: PayloadAuthorization::Permit(permit),
        })
    }
}
