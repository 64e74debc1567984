//! Wires the session store, the sweeper, and the facilitator core together,
//! and tracks per-request pending spend on the request path.

use crate::config::SweeperConfig;
use crate::store::{SessionStore, TrackError};
use crate::sweeper::Sweeper;
use std::sync::Arc;
use x402_core::Facilitator;
use x402_types::payload::PayloadAuthorization;
use x402_types::session::SessionIdPreimage;
use x402_types::{Amount, PaymentPayload, PaymentRequirements, SessionId, UptoSession};

#[derive(Debug, thiserror::Error)]
pub enum UptoModuleError {
    #[error("payload is not an Upto (EIP-2612 permit) authorization")]
    NotAnUptoPayload,
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// The module a resource-server-side facilitator embeds to get Upto
/// tracking: session creation on first verified request, per-request
/// pending-spend accounting, and a running sweeper.
pub struct UptoModule {
    store: SessionStore,
}

impl UptoModule {
    pub fn new() -> Self {
        UptoModule {
            store: SessionStore::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Starts the sweeper against this module's store, settling through
    /// `facilitator`. Returns the join handle and a token the caller should
    /// cancel at shutdown.
    pub fn spawn_sweeper(
        &self,
        facilitator: Arc<dyn Facilitator>,
        config: SweeperConfig,
    ) -> (tokio::task::JoinHandle<()>, tokio_util::sync::CancellationToken) {
        let sweeper = Sweeper::new(self.store.clone(), facilitator, config);
        let token = sweeper.cancellation_token();
        (sweeper.spawn(), token)
    }

    /// Derives the deterministic session id from an Upto payload's permit fields.
    pub fn session_id_for(payload: &PaymentPayload) -> Result<SessionId, UptoModuleError> {
        let permit = match &payload.payload {
            PayloadAuthorization::Permit(p) => p,
            _ => return Err(UptoModuleError::NotAnUptoPayload),
        };
        let preimage = SessionIdPreimage {
            network: payload.accepted.network.to_string(),
            asset: payload.accepted.asset.clone(),
            owner: permit.from.clone(),
            spender: permit.to.clone(),
            cap: permit.value,
            nonce: permit.nonce.clone(),
            deadline: permit.valid_before,
            signature: permit.signature.clone(),
        };
        Ok(SessionId::generate(&preimage))
    }

    /// Called after a successful `verify` of an Upto payload: creates the
    /// session on first sight, otherwise is a no-op (spec §3: "Sessions are
    /// created on first verified Upto request").
    pub fn ensure_session(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
        now_ms: u64,
    ) -> Result<SessionId, UptoModuleError> {
        let id = Self::session_id_for(payload)?;
        let permit = match &payload.payload {
            PayloadAuthorization::Permit(p) => p,
            _ => return Err(UptoModuleError::NotAnUptoPayload),
        };
        self.store.get_or_insert_with(id, || {
            UptoSession::new(
                permit.value,
                permit.valid_before,
                now_ms,
                payload.clone(),
                requirements.clone(),
            )
        });
        Ok(id)
    }

    /// Tracks `amount` as pending spend against the session, atomically
    /// checking the cap invariant first (spec §4.3).
    pub fn track_pending(&self, id: &SessionId, amount: Amount, now_ms: u64) -> Result<(), UptoModuleError> {
        self.store.try_track_pending(id, amount, now_ms).map_err(Into::into)
    }
}

impl Default for UptoModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_types::payload::PermitAuthorization;
    use x402_types::requirements::Scheme;
    use x402_types::ChainId;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Upto,
            network: ChainId::new("eip155", "8453"),
            asset: "0xasset".into(),
            amount: Amount::new(400),
            pay_to: "0xfacilitator".into(),
            max_timeout_seconds: 600,
            extra: Default::default(),
        }
    }

    fn payload(requirements: PaymentRequirements, cap: u128) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            resource: "https://example.com".into(),
            accepted: requirements,
            payload: PayloadAuthorization::Permit(PermitAuthorization {
                from: "0xowner".into(),
                to: "0xfacilitator".into(),
                value: Amount::new(cap),
                valid_before: 9_999_999_999,
                nonce: "0xnonce".into(),
                signature: "0xsig".into(),
            }),
        }
    }

    #[test]
    fn same_permit_reuses_session() {
        let module = UptoModule::new();
        let reqs = requirements();
        let p = payload(reqs.clone(), 2000);
        let id1 = module.ensure_session(&p, &reqs, 0).unwrap();
        let id2 = module.ensure_session(&p, &reqs, 1000).unwrap();
        assert_eq!(id1, id2);
        // Second call must not reset pendingSpent accounting for an
        // in-progress session.
        module.track_pending(&id1, Amount::new(400), 0).unwrap();
        let session = module.store().get(&id1).unwrap();
        assert_eq!(session.pending_spent, Amount::new(400));
    }

    #[test]
    fn tracking_beyond_cap_is_rejected() {
        let module = UptoModule::new();
        let reqs = requirements();
        let p = payload(reqs.clone(), 500);
        let id = module.ensure_session(&p, &reqs, 0).unwrap();
        module.track_pending(&id, Amount::new(400), 0).unwrap();
        let err = module.track_pending(&id, Amount::new(200), 0).unwrap_err();
        assert!(matches!(err, UptoModuleError::Track(TrackError::CapExhausted)));
    }
}
