//! Protocol types for the x402 payment facilitator.
//!
//! This crate has no chain-specific logic and no I/O: it defines the wire
//! types shared by the dispatch engine, the Upto session store, the HTTP
//! glue, and the client retry loop.

pub mod amount;
pub mod chain_id;
pub mod error;
pub mod payload;
pub mod payment_required;
pub mod requirements;
pub mod response;
pub mod session;

pub use amount::Amount;
pub use chain_id::ChainId;
pub use error::ErrorReason;
pub use payload::{
    Eip3009Authorization, PaymentPayload, PermitAuthorization, SolanaTransferPayload,
    StarknetPayload,
};
pub use payment_required::PaymentRequired;
pub use requirements::PaymentRequirements;
pub use response::{SettleResponse, VerifyResponse};
pub use session::{SessionId, SessionStatus, UptoSession};
