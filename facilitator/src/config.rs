//! Environment-driven configuration (spec §6 "Environment").

use clap::Parser;
use std::net::IpAddr;

/// CLI/env arguments for the x402 facilitator server.
///
/// `clap`'s `env` feature resolves every field from the named environment
/// variable when the matching flag is absent, after `.env` is loaded by
/// `dotenvy` in `main`.
#[derive(Parser, Debug, Clone)]
#[command(name = "x402-facilitator")]
#[command(about = "x402 Facilitator HTTP server")]
pub struct Config {
    /// Selects a hosted signer backend instead of the private-key fallback.
    ///
    /// No hosted-signing integration ships in this workspace's dependency
    /// stack; setting this without one configured is a startup error
    /// (see [`ConfigError::UseCdpUnavailable`]).
    #[arg(long, env = "USE_CDP", default_value_t = false)]
    pub use_cdp: bool,

    /// Fallback EVM signer private key (hex, with or without `0x` prefix).
    #[arg(long, env = "EVM_PRIVATE_KEY")]
    pub evm_private_key: Option<String>,

    /// Fallback Solana signer private key (base58).
    #[arg(long, env = "SVM_PRIVATE_KEY")]
    pub svm_private_key: Option<String>,

    /// Solana RPC endpoint (single cluster, applies to all `solana:*` networks).
    #[arg(long, env = "SVM_RPC_URL")]
    pub svm_rpc_url: Option<String>,

    /// Comma-separated Starknet CAIP-2 references this facilitator serves.
    #[arg(long, env = "STARKNET_NETWORKS", value_delimiter = ',')]
    pub starknet_networks: Vec<String>,

    /// Starknet paymaster sponsor account address.
    #[arg(long, env = "STARKNET_SPONSOR_ADDRESS")]
    pub starknet_sponsor_address: Option<String>,

    /// Comma-separated `starknet:<ref>=<url>` paymaster endpoint entries.
    #[arg(long, env = "STARKNET_PAYMASTER_ENDPOINT", value_delimiter = ',')]
    pub starknet_paymaster_endpoint: Vec<String>,

    /// API key sent to the Starknet paymaster.
    #[arg(long, env = "STARKNET_PAYMASTER_API_KEY")]
    pub starknet_paymaster_api_key: Option<String>,

    #[arg(long, env = "PORT", default_value_t = 8090)]
    pub port: u16,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// This facilitator's own externally-reachable URL, advertised to clients.
    #[arg(long, env = "FACILITATOR_URL")]
    pub facilitator_url: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }

    /// Splits a `key=value` list (e.g. `STARKNET_PAYMASTER_ENDPOINT`) into
    /// pairs, skipping malformed entries rather than failing startup over
    /// one typo.
    pub fn parse_pairs(entries: &[String]) -> Vec<(String, String)> {
        entries
            .iter()
            .filter_map(|entry| entry.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect()
    }

    /// Reads `EVM_RPC_URL_<chainId>` entries straight from the process
    /// environment, one per served `eip155:*` network.
    ///
    /// `clap`'s `env` attribute names a single fixed variable, which can't
    /// express a family keyed by a runtime-configured chain id — so unlike
    /// the rest of `Config`, this isn't a `#[arg]` field.
    pub fn evm_rpc_urls() -> Vec<(String, String)> {
        std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix("EVM_RPC_URL_").map(|chain_id| (chain_id.to_string(), value))
            })
            .collect()
    }
}
