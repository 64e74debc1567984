//! Builds per-network chain providers from [`Config`] (spec §6 Environment).

use crate::config::Config;
use alloy_network::EthereumWallet;
use alloy_primitives::B256;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use solana_client::rpc_client::RpcClient;
use solana_keypair::Keypair;
use solana_signer::Signer as _;
use std::str::FromStr;
use std::sync::Arc;
use x402_chain_eip155::EvmChainProvider;
use x402_chain_solana::SolanaChainProvider;
use x402_chain_starknet::StarknetChainProvider;
use x402_types::ChainId;

#[derive(Debug, thiserror::Error)]
pub enum ChainConfigError {
    #[error("USE_CDP is set but no hosted-signer backend is configured in this build")]
    UseCdpUnavailable,
    #[error("EVM_PRIVATE_KEY is required when USE_CDP is unset")]
    MissingEvmPrivateKey,
    #[error("SVM_PRIVATE_KEY is required to serve any solana:* network")]
    MissingSvmPrivateKey,
    #[error("invalid EVM private key: {0}")]
    InvalidEvmPrivateKey(String),
    #[error("invalid Solana private key: {0}")]
    InvalidSvmPrivateKey(String),
    #[error("invalid EVM_RPC_URL_{0}: chain id suffix is not a valid eip155 reference")]
    InvalidEvmRpcEntry(String),
    #[error("invalid RPC URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// All chain providers resolved from environment, keyed by CAIP-2 network.
pub struct ChainProviders {
    pub evm: Vec<(ChainId, EvmChainProvider)>,
    pub solana: Vec<(ChainId, SolanaChainProvider)>,
    pub starknet: Vec<(ChainId, StarknetChainProvider)>,
}

/// Runs once at startup (spec §9: "side effects happen exactly once inside Build").
pub async fn build_chain_providers(config: &Config) -> Result<ChainProviders, ChainConfigError> {
    if config.use_cdp {
        return Err(ChainConfigError::UseCdpUnavailable);
    }

    let evm = build_evm_providers(config)?;
    let solana = build_solana_providers(config)?;
    let starknet = build_starknet_providers(config);

    Ok(ChainProviders { evm, solana, starknet })
}

fn build_evm_providers(config: &Config) -> Result<Vec<(ChainId, EvmChainProvider)>, ChainConfigError> {
    let entries = Config::evm_rpc_urls();
    if entries.is_empty() {
        return Ok(Vec::new());
    }
    let private_key = config
        .evm_private_key
        .as_ref()
        .ok_or(ChainConfigError::MissingEvmPrivateKey)?;
    let key_bytes = B256::from_str(private_key.trim_start_matches("0x"))
        .map_err(|e| ChainConfigError::InvalidEvmPrivateKey(e.to_string()))?;
    let signer = PrivateKeySigner::from_bytes(&key_bytes).map_err(|e| ChainConfigError::InvalidEvmPrivateKey(e.to_string()))?;

    let mut out = Vec::with_capacity(entries.len());
    for (chain_id_ref, rpc_url) in entries {
        let chain_id: u64 = chain_id_ref.parse().map_err(|_| ChainConfigError::InvalidEvmRpcEntry(chain_id_ref.clone()))?;
        let network = ChainId::new("eip155", chain_id_ref);
        let wallet = EthereumWallet::from(signer.clone());
        let url = rpc_url.parse()?;
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);
        let chain_provider = EvmChainProvider::new(Arc::new(signer.clone()), Arc::new(provider) as Arc<dyn Provider + Send + Sync>, chain_id);
        out.push((network, chain_provider));
    }
    Ok(out)
}

fn build_solana_providers(config: &Config) -> Result<Vec<(ChainId, SolanaChainProvider)>, ChainConfigError> {
    let Some(rpc_url) = &config.svm_rpc_url else {
        return Ok(Vec::new());
    };
    let private_key = config
        .svm_private_key
        .as_ref()
        .ok_or(ChainConfigError::MissingSvmPrivateKey)?;
    let keypair = Keypair::from_base58_string(private_key);
    tracing::info!(fee_payer = %keypair.pubkey(), "Initialized Solana fee payer");
    let rpc = RpcClient::new(rpc_url.clone());
    let chain_provider = SolanaChainProvider::new(Arc::new(keypair), Arc::new(rpc));
    Ok(vec![(ChainId::new("solana", "mainnet"), chain_provider)])
}

fn build_starknet_providers(config: &Config) -> Vec<(ChainId, StarknetChainProvider)> {
    let Some(sponsor) = &config.starknet_sponsor_address else {
        return Vec::new();
    };
    let endpoints = Config::parse_pairs(&config.starknet_paymaster_endpoint);
    config
        .starknet_networks
        .iter()
        .filter_map(|reference| {
            let endpoint = endpoints
                .iter()
                .find(|(network, _)| network == reference)
                .map(|(_, url)| url.clone())?;
            let provider = StarknetChainProvider::new(endpoint, config.starknet_paymaster_api_key.clone(), sponsor.clone());
            Some((ChainId::new("starknet", reference.clone()), provider))
        })
        .collect()
}
