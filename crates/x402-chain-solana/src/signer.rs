//! The Solana signer abstraction: a facilitator-held fee-payer keypair and
//! the RPC client used to submit transactions.

use solana_client::rpc_client::RpcClient;
use solana_keypair::Keypair;
use solana_signer::Signer;
use std::sync::Arc;

#[derive(Clone)]
pub struct SolanaChainProvider {
    pub fee_payer: Arc<Keypair>,
    pub rpc: Arc<RpcClient>,
}

impl SolanaChainProvider {
    pub fn new(fee_payer: Arc<Keypair>, rpc: Arc<RpcClient>) -> Self {
        SolanaChainProvider { fee_payer, rpc }
    }

    pub fn fee_payer_address(&self) -> String {
        self.fee_payer.pubkey().to_string()
    }
}
