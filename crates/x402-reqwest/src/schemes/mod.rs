//! Per-chain/scheme client signers registered with an [`X402Client`](crate::client::X402Client).

pub mod eip2612;
pub mod eip3009;
pub mod solana;
pub mod starknet;

pub use eip2612::Eip2612Client;
pub use eip3009::Eip3009Client;
pub use solana::SolanaExactClient;
pub use starknet::StarknetClient;
