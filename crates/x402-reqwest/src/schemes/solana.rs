//! Exact-SVM client signer: builds a signed legacy SPL-token transfer
//! transaction and base64-encodes it (spec §4.2's Exact-SVM payload shape).

use async_trait::async_trait;
use base64::Engine;
use solana_client::rpc_client::RpcClient;
use solana_keypair::Keypair;
use solana_message::Message;
use solana_pubkey::Pubkey;
use solana_signer::Signer as SolanaSignerTrait;
use solana_transaction::Transaction;
use std::str::FromStr;
use std::sync::Arc;
use x402_types::payload::{PayloadAuthorization, SolanaTransferPayload};
use x402_types::requirements::Scheme;
use x402_types::{PaymentPayload, PaymentRequirements};

use crate::error::X402Error;
use crate::scheme::ClientScheme;

/// Signs Exact-SVM payloads with a client-held keypair, fetching a fresh
/// blockhash from `rpc` for each transaction.
pub struct SolanaExactClient {
    payer: Arc<Keypair>,
    rpc: Arc<RpcClient>,
}

impl SolanaExactClient {
    pub fn new(payer: Arc<Keypair>, rpc: Arc<RpcClient>) -> Self {
        SolanaExactClient { payer, rpc }
    }
}

#[async_trait]
impl ClientScheme for SolanaExactClient {
    fn accept(&self, requirements: &PaymentRequirements) -> bool {
        requirements.scheme == Scheme::Exact && requirements.network.is_solana()
    }

    async fn sign(&self, requirements: &PaymentRequirements) -> Result<PaymentPayload, X402Error> {
        let source = self.payer.pubkey();
        let destination =
            Pubkey::from_str(&requirements.pay_to).map_err(|e| X402Error::Signing(e.to_string()))?;
        let amount = requirements.amount.0 as u64;

        let instruction = spl_token::instruction::transfer(
            &spl_token::id(),
            &source,
            &destination,
            &source,
            &[],
            amount,
        )
        .map_err(|e| X402Error::Signing(e.to_string()))?;

        let payer = self.payer.clone();
        let rpc = self.rpc.clone();
        let tx = tokio::task::spawn_blocking(move || {
            let blockhash = rpc.get_latest_blockhash()?;
            let message = Message::new_with_blockhash(&[instruction], Some(&source), &blockhash);
            Ok::<Transaction, solana_client::client_error::ClientError>(Transaction::new(&[payer.as_ref()], message, blockhash))
        })
        .await
        .map_err(|e| X402Error::Signing(e.to_string()))?
        .map_err(|e| X402Error::Signing(e.to_string()))?;

        let raw = bincode::serialize(&tx).map_err(|e| X402Error::Signing(e.to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);

        Ok(PaymentPayload {
            x402_version: 1,
            resource: String::new(),
            accepted: requirements.clone(),
            payload: PayloadAuthorization::Solana(SolanaTransferPayload { transaction: encoded }),
        })
    }
}
