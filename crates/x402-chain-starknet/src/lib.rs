//! Starknet signer/paymaster boundary and the Exact-Starknet scheme facilitator.
//!
//! No mature Starknet Rust SDK exists in this workspace's dependency stack
//! (none of the corpus it is grounded in depends on one), so this crate
//! treats the Starknet provider and paymaster as narrow JSON-RPC/HTTP
//! boundaries over `reqwest`, exactly the calls spec §4.5 needs — not a
//! general-purpose Starknet client.

pub mod exact;
pub mod provider;

pub use exact::ExactStarknetFacilitator;
pub use provider::StarknetChainProvider;
