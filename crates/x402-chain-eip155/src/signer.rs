//! The EVM signer abstraction: reads addresses and submits/waits for transactions.

use alloy_primitives::Address;
use alloy_provider::Provider;
use alloy_signer_local::PrivateKeySigner;
use std::sync::Arc;

/// A facilitator-controlled EVM signer plus the provider used to dial the
/// network it settles on. One instance is constructed per registered
/// `eip155:*` network, matching the corpus's per-network provider cache.
#[derive(Clone)]
pub struct EvmChainProvider {
    pub signer: Arc<PrivateKeySigner>,
    pub provider: Arc<dyn Provider + Send + Sync>,
    pub chain_id: u64,
}

impl EvmChainProvider {
    pub fn new(signer: Arc<PrivateKeySigner>, provider: Arc<dyn Provider + Send + Sync>, chain_id: u64) -> Self {
        EvmChainProvider {
            signer,
            provider,
            chain_id,
        }
    }

    pub fn signer_address(&self) -> Address {
        alloy_signer::Signer::address(self.signer.as_ref())
    }
}
