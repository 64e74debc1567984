//! Exact-EVM: EIP-3009 `transferWithAuthorization`, single-shot.

use crate::abi::{Erc20Extended, TransferWithAuthorization};
use crate::signer::EvmChainProvider;
use alloy_primitives::{Address, Bytes, FixedBytes, Signature, U256};
use alloy_sol_types::{eip712_domain, SolStruct};
use async_trait::async_trait;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;
use x402_core::SchemeFacilitator;
use x402_types::payload::{Eip3009Authorization, PayloadAuthorization};
use x402_types::{ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

pub struct ExactEip155Facilitator {
    chain: EvmChainProvider,
}

impl ExactEip155Facilitator {
    pub fn new(chain: EvmChainProvider) -> Self {
        ExactEip155Facilitator { chain }
    }

    fn authorization<'a>(payload: &'a PaymentPayload) -> Option<&'a Eip3009Authorization> {
        match &payload.payload {
            PayloadAuthorization::Eip3009(auth) => Some(auth),
            _ => None,
        }
    }

    fn domain(&self, requirements: &PaymentRequirements, asset: Address) -> Option<alloy_sol_types::Eip712Domain> {
        let (name, version) = requirements.eip712_domain_fields()?;
        Some(eip712_domain! {
            name: name,
            version: version,
            chain_id: self.chain.chain_id,
            verifying_contract: asset,
        })
    }

    #[instrument(skip_all)]
    fn check(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> Result<(Eip3009Authorization, Address), ErrorReason> {
        let auth = Self::authorization(payload).ok_or(ErrorReason::InvalidPayload)?.clone();
        if auth.from.is_empty() || auth.to.is_empty() || auth.nonce.is_empty() {
            return Err(ErrorReason::InvalidPayload);
        }
        let pay_to = Address::from_str(&requirements.pay_to).map_err(|_| ErrorReason::InvalidPaymentRequirements)?;
        let to = Address::from_str(&auth.to).map_err(|_| ErrorReason::InvalidPayload)?;
        if to != pay_to {
            return Err(ErrorReason::InvalidPaymentRequirements);
        }
        if auth.value < requirements.amount {
            return Err(ErrorReason::InvalidPaymentRequirements);
        }

        // Deadline == now + 6 is the boundary and is itself expired; valid
        // only from now + 7 on (spec §8 boundary case).
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        if auth.valid_before <= now + 6 {
            return Err(ErrorReason::AuthorizationExpired);
        }
        if auth.valid_after > now {
            return Err(ErrorReason::AuthorizationExpired);
        }

        let asset = Address::from_str(&requirements.asset).map_err(|_| ErrorReason::InvalidPaymentRequirements)?;
        let domain = self.domain(requirements, asset).ok_or(ErrorReason::MissingEip712Domain)?;

        let from = Address::from_str(&auth.from).map_err(|_| ErrorReason::InvalidPayload)?;
        let signature_bytes = hex::decode(auth.signature.trim_start_matches("0x")).map_err(|_| ErrorReason::InvalidPayload)?;
        let signature = Signature::from_raw_array(
            signature_bytes.as_slice().try_into().map_err(|_| ErrorReason::UnsupportedSignatureType)?,
        )
        .map_err(|_| ErrorReason::UnsupportedSignatureType)?;

        let nonce_bytes = hex::decode(auth.nonce.trim_start_matches("0x")).map_err(|_| ErrorReason::InvalidPayload)?;
        let typed = TransferWithAuthorization {
            from,
            to,
            value: U256::from(auth.value.0),
            validAfter: U256::from(auth.valid_after),
            validBefore: U256::from(auth.valid_before),
            nonce: FixedBytes::try_from(nonce_bytes.as_slice()).map_err(|_| ErrorReason::InvalidPayload)?,
        };
        let signing_hash = typed.eip712_signing_hash(&domain);
        let recovered = signature
            .recover_address_from_prehash(&signing_hash)
            .map_err(|_| ErrorReason::InvalidPermitSignature)?;
        if recovered != from {
            return Err(ErrorReason::InvalidPermitSignature);
        }

        Ok((auth, asset))
    }
}

#[async_trait]
impl SchemeFacilitator for ExactEip155Facilitator {
    fn get_signers(&self) -> Vec<String> {
        vec![self.chain.signer_address().to_string()]
    }

    async fn verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse {
        match self.check(payload, requirements) {
            Ok((auth, _asset)) => VerifyResponse::valid(auth.from),
            Err(reason) => VerifyResponse::invalid(reason),
        }
    }

    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        let (auth, asset) = match self.check(payload, requirements) {
            Ok(ok) => ok,
            Err(reason) => return SettleResponse::failure(requirements.network.to_string(), reason),
        };

        let contract = Erc20Extended::new(asset, self.chain.provider.clone());
        let from = Address::from_str(&auth.from).expect("validated in check");
        let to = Address::from_str(&auth.to).expect("validated in check");
        let nonce_bytes = hex::decode(auth.nonce.trim_start_matches("0x")).expect("validated in check");
        let signature_bytes = hex::decode(auth.signature.trim_start_matches("0x")).expect("validated in check");

        let call = contract.transferWithAuthorization(
            from,
            to,
            U256::from(auth.value.0),
            U256::from(auth.valid_after),
            U256::from(auth.valid_before),
            FixedBytes::try_from(nonce_bytes.as_slice()).expect("validated in check"),
            Bytes::from(signature_bytes),
        );

        match call.send().await {
            Ok(pending) => match pending.get_receipt().await {
                Ok(receipt) if receipt.status() => {
                    SettleResponse::success(requirements.network.to_string(), receipt.transaction_hash.to_string(), auth.from)
                }
                Ok(_) => SettleResponse::failure(requirements.network.to_string(), ErrorReason::InvalidTransactionState),
                Err(_) => SettleResponse::failure(requirements.network.to_string(), ErrorReason::TransactionFailed),
            },
            Err(_) => SettleResponse::failure(requirements.network.to_string(), ErrorReason::TransactionFailed),
        }
    }
}
