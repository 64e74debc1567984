//! EVM (`eip155:*`) signer abstraction and scheme facilitators.

pub mod abi;
pub mod exact;
pub mod signer;
pub mod upto;

pub use exact::ExactEip155Facilitator;
pub use signer::EvmChainProvider;
pub use upto::UptoEip155Facilitator;
