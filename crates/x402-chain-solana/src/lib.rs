//! Solana (`solana:*`) signer abstraction and the Exact-SVM scheme facilitator.

pub mod exact;
pub mod signer;

pub use exact::ExactSolanaFacilitator;
pub use signer::SolanaChainProvider;
