//! `UptoSession`: in-memory accounting record for one batched-cap permit.

use crate::amount::Amount;
use crate::error::ErrorReason;
use crate::payload::PaymentPayload;
use crate::requirements::PaymentRequirements;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

/// `SHA-256(JSON({network, asset, owner, spender, cap, nonce, deadline, signature}))`.
///
/// Deterministic in the permit fields (spec §3 invariant, §9 design note):
/// the same permit always collapses to the same session id, and the
/// preimage includes `spender` (the facilitator's own address) so that two
/// independent facilitators settling the same permit never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; 32]);

impl SessionId {
    pub fn generate(preimage: &SessionIdPreimage) -> Self {
        let json = serde_json::to_vec(preimage).expect("SessionIdPreimage always serializes");
        let digest = Sha256::digest(&json);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        SessionId(bytes)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The exact fields the session id is derived from. Field order is
/// significant: it fixes the JSON serialization that feeds the hash.
#[derive(Debug, Clone, Serialize)]
pub struct SessionIdPreimage {
    pub network: String,
    pub asset: String,
    pub owner: String,
    pub spender: String,
    pub cap: Amount,
    pub nonce: String,
    pub deadline: u64,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Settling,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub at_ms: u64,
    pub reason: ErrorReason,
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptoSession {
    pub cap: Amount,
    pub deadline: u64,
    pub pending_spent: Amount,
    pub settled_total: Amount,
    pub last_activity_ms: u64,
    pub status: SessionStatus,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
    pub last_settlement: Option<Settlement>,
}

impl UptoSession {
    pub fn new(
        cap: Amount,
        deadline: u64,
        now_ms: u64,
        payment_payload: PaymentPayload,
        payment_requirements: PaymentRequirements,
    ) -> Self {
        UptoSession {
            cap,
            deadline,
            pending_spent: Amount::ZERO,
            settled_total: Amount::ZERO,
            last_activity_ms: now_ms,
            status: SessionStatus::Open,
            payment_payload,
            payment_requirements,
            last_settlement: None,
        }
    }

    /// `cap - settledTotal - pendingSpent`, saturating at zero.
    pub fn remaining_capacity(&self) -> Amount {
        self.cap
            .checked_sub(self.settled_total)
            .and_then(|r| r.checked_sub(self.pending_spent))
            .unwrap_or(Amount::ZERO)
    }

    pub fn outstanding(&self) -> Amount {
        self.settled_total + self.pending_spent
    }

    pub fn invariant_holds(&self) -> bool {
        self.outstanding() <= self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preimage() -> SessionIdPreimage {
        SessionIdPreimage {
            network: "eip155:8453".into(),
            asset: "0xasset".into(),
            owner: "0xowner".into(),
            spender: "0xspender".into(),
            cap: Amount::new(2000),
            nonce: "0xnonce".into(),
            deadline: 1_000_000,
            signature: "0xsig".into(),
        }
    }

    #[test]
    fn same_permit_collapses_to_same_id() {
        assert_eq!(SessionId::generate(&preimage()), SessionId::generate(&preimage()));
    }

    #[test]
    fn different_spender_changes_id() {
        let mut other = preimage();
        other.spender = "0xother-spender".into();
        assert_ne!(SessionId::generate(&preimage()), SessionId::generate(&other));
    }
}
