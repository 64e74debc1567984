//! Exact-SVM: parses a signed Solana transaction, checks the transfer
//! instruction targets `payTo` for `amount` of `asset`, and submits it.

use crate::signer::SolanaChainProvider;
use async_trait::async_trait;
use base64::Engine;
use solana_transaction::Transaction;
use spl_token::instruction::TokenInstruction;
use tracing::instrument;
use x402_core::SchemeFacilitator;
use x402_types::payload::PayloadAuthorization;
use x402_types::{ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

pub struct ExactSolanaFacilitator {
    chain: SolanaChainProvider,
}

impl ExactSolanaFacilitator {
    pub fn new(chain: SolanaChainProvider) -> Self {
        ExactSolanaFacilitator { chain }
    }

    #[instrument(skip_all)]
    fn decode_and_check(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<(Transaction, String), ErrorReason> {
        let solana_payload = match &payload.payload {
            PayloadAuthorization::Solana(p) => p,
            _ => return Err(ErrorReason::InvalidPayload),
        };

        let raw = base64::engine::general_purpose::STANDARD
            .decode(&solana_payload.transaction)
            .map_err(|_| ErrorReason::InvalidPayload)?;
        let tx: Transaction = bincode::deserialize(&raw).map_err(|_| ErrorReason::InvalidPayload)?;

        if !tx.is_signed() {
            return Err(ErrorReason::InvalidPermitSignature);
        }

        let message = &tx.message;
        let mut matched_payer = None;
        for instruction in &message.instructions {
            let program_id = message
                .account_keys
                .get(instruction.program_id_index as usize)
                .ok_or(ErrorReason::InvalidPayload)?;
            if *program_id != spl_token::id() {
                continue;
            }
            let unpacked = TokenInstruction::unpack(&instruction.data).map_err(|_| ErrorReason::InvalidPayload)?;
            if let TokenInstruction::TransferChecked { amount, .. } | TokenInstruction::Transfer { amount } = unpacked
            {
                if amount < requirements.amount.0 as u64 {
                    return Err(ErrorReason::InvalidPaymentRequirements);
                }
                let destination_index = instruction
                    .accounts
                    .get(if matches!(unpacked, TokenInstruction::TransferChecked { .. }) { 2 } else { 1 })
                    .ok_or(ErrorReason::InvalidPayload)?;
                let destination = message
                    .account_keys
                    .get(*destination_index as usize)
                    .ok_or(ErrorReason::InvalidPayload)?;
                if destination.to_string() != requirements.pay_to {
                    return Err(ErrorReason::InvalidPaymentRequirements);
                }
                let source_index = instruction.accounts.first().ok_or(ErrorReason::InvalidPayload)?;
                let payer = message
                    .account_keys
                    .get(*source_index as usize)
                    .ok_or(ErrorReason::InvalidPayload)?;
                matched_payer = Some(payer.to_string());
                break;
            }
        }

        let payer = matched_payer.ok_or(ErrorReason::InvalidPayload)?;
        Ok((tx, payer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_client::rpc_client::RpcClient;
    use solana_keypair::Keypair;
    use x402_types::requirements::Scheme;
    use x402_types::{Amount, ChainId, PaymentRequirements};

    fn facilitator() -> ExactSolanaFacilitator {
        let fee_payer = std::sync::Arc::new(Keypair::new());
        let rpc = std::sync::Arc::new(RpcClient::new("http://localhost:8899".to_string()));
        ExactSolanaFacilitator::new(SolanaChainProvider::new(fee_payer, rpc))
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: ChainId::new("solana", "mainnet"),
            asset: "USDC".into(),
            amount: Amount::new(1_000),
            pay_to: "11111111111111111111111111111112".into(),
            max_timeout_seconds: 60,
            extra: Default::default(),
        }
    }

    fn payload_with(transaction: &str) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            resource: "https://example.com/resource".into(),
            accepted: requirements(),
            payload: PayloadAuthorization::Solana(x402_types::payload::SolanaTransferPayload {
                transaction: transaction.into(),
            }),
        }
    }

    #[tokio::test]
    async fn malformed_base64_is_invalid_payload() {
        let facilitator = facilitator();
        let payload = payload_with("not-valid-base64!!");
        let response = facilitator.verify(&payload, &requirements()).await;
        assert!(!response.is_valid);
        assert_eq!(response.invalid_reason, Some(ErrorReason::InvalidPayload));
    }

    #[tokio::test]
    async fn wrong_payload_variant_is_invalid_payload() {
        let facilitator = facilitator();
        let requirements = requirements();
        let payload = PaymentPayload {
            x402_version: 2,
            resource: "https://example.com/resource".into(),
            accepted: requirements.clone(),
            payload: PayloadAuthorization::Eip3009(x402_types::Eip3009Authorization {
                from: "0xfrom".into(),
                to: "0xto".into(),
                value: Amount::new(1_000),
                valid_after: 0,
                valid_before: u64::MAX,
                nonce: "0xnonce".into(),
                signature: "0xsig".into(),
            }),
        };
        let response = facilitator.verify(&payload, &requirements).await;
        assert!(!response.is_valid);
        assert_eq!(response.invalid_reason, Some(ErrorReason::InvalidPayload));
    }

    #[test]
    fn fee_payer_address_matches_signer_pubkey() {
        let facilitator = facilitator();
        let signers = facilitator.get_signers();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0], facilitator.chain.fee_payer_address());
    }
}

#[async_trait]
impl SchemeFacilitator for ExactSolanaFacilitator {
    fn get_signers(&self) -> Vec<String> {
        vec![self.chain.fee_payer_address()]
    }

    async fn verify(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> VerifyResponse {
        match self.decode_and_check(payload, requirements) {
            Ok((_, payer)) => VerifyResponse::valid(payer),
            Err(reason) => VerifyResponse::invalid(reason),
        }
    }

    async fn settle(&self, payload: &PaymentPayload, requirements: &PaymentRequirements) -> SettleResponse {
        let (tx, payer) = match self.decode_and_check(payload, requirements) {
            Ok(ok) => ok,
            Err(reason) => return SettleResponse::failure(requirements.network.to_string(), reason),
        };

        let rpc = self.chain.rpc.clone();
        match tokio::task::spawn_blocking(move || rpc.send_and_confirm_transaction(&tx)).await {
            Ok(Ok(signature)) => SettleResponse::success(requirements.network.to_string(), signature.to_string(), payer),
            Ok(Err(_)) => SettleResponse::failure(requirements.network.to_string(), ErrorReason::TransactionFailed),
            Err(_) => SettleResponse::failure(requirements.network.to_string(), ErrorReason::TransactionFailed),
        }
    }
}
