//! The concurrent session store.
//!
//! Backed by [`dashmap::DashMap`], sharded so that a mutation on one
//! session never blocks iteration or mutation of another. Every method that
//! changes more than one field of a session goes through `DashMap::entry`,
//! which holds the shard lock for the closure's duration — that is the
//! single critical section spec §5 requires for
//! `read-status, set-settling, act, set-open/closed`.

use dashmap::DashMap;
use std::sync::Arc;
use x402_types::session::{Settlement, SessionStatus};
use x402_types::{Amount, ErrorReason, SessionId, UptoSession};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("cap_exhausted")]
    CapExhausted,
    #[error("session_closed")]
    SessionClosed,
}

impl From<TrackError> for ErrorReason {
    fn from(value: TrackError) -> Self {
        match value {
            TrackError::CapExhausted => ErrorReason::CapExhausted,
            TrackError::SessionClosed => ErrorReason::SessionClosed,
        }
    }
}

/// Mapping session-id -> session record, with CAS-style status transitions.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<DashMap<SessionId, UptoSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SessionId) -> Option<UptoSession> {
        self.inner.get(id).map(|entry| entry.clone())
    }

    pub fn set(&self, id: SessionId, session: UptoSession) {
        self.inner.insert(id, session);
    }

    pub fn delete(&self, id: &SessionId) -> Option<UptoSession> {
        self.inner.remove(id).map(|(_, session)| session)
    }

    /// A point-in-time snapshot, safe to iterate while other tasks mutate
    /// the store concurrently (spec §4.3: "iteration over a snapshot or
    /// with copy-on-read is acceptable").
    pub fn entries(&self) -> Vec<(SessionId, UptoSession)> {
        self.inner
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Inserts a brand-new session if absent, returning the existing one
    /// when the deterministic session id already has an entry (spec §3:
    /// "the same permit collapses to a single session").
    pub fn get_or_insert_with(&self, id: SessionId, make: impl FnOnce() -> UptoSession) -> UptoSession {
        self.inner.entry(id).or_insert_with(make).clone()
    }

    /// Atomically checks `cap - settledTotal - pendingSpent >= amount` and,
    /// if so, increments `pendingSpent` before the caller's handler runs.
    pub fn try_track_pending(&self, id: &SessionId, amount: Amount, now_ms: u64) -> Result<(), TrackError> {
        let mut entry = self.inner.get_mut(id).ok_or(TrackError::SessionClosed)?;
        if entry.status == SessionStatus::Closed {
            return Err(TrackError::SessionClosed);
        }
        if entry.remaining_capacity() < amount {
            return Err(TrackError::CapExhausted);
        }
        entry.pending_spent = entry.pending_spent + amount;
        entry.last_activity_ms = now_ms;
        debug_assert!(entry.invariant_holds());
        Ok(())
    }

    /// Sets `status = settling` iff currently `open`. Returns `false`
    /// (without mutating) if another task is already settling this
    /// session, which is exactly the gate that makes sweep and
    /// request-path settlement of the same session mutually exclusive.
    pub fn try_begin_settling(&self, id: &SessionId) -> bool {
        match self.inner.get_mut(id) {
            Some(mut entry) if entry.status == SessionStatus::Open => {
                entry.status = SessionStatus::Settling;
                true
            }
            _ => false,
        }
    }

    /// Records the outcome of a settlement attempt and restores `open` or
    /// advances to `closed`, exactly once per `try_begin_settling` call.
    pub fn finish_settling(
        &self,
        id: &SessionId,
        settled_amount: Amount,
        succeeded: bool,
        reason: ErrorReason,
        receipt: Option<String>,
        terminal: bool,
        now_ms: u64,
    ) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            if succeeded {
                entry.settled_total = entry.settled_total + settled_amount;
                entry.pending_spent = entry.pending_spent - settled_amount;
                entry.last_settlement = Some(Settlement {
                    at_ms: now_ms,
                    reason,
                    receipt,
                });
            } else {
                // pendingSpent is retained so the batch is retried on the
                // next non-terminal trigger (spec §4.3 "Failure:" clause).
                entry.last_settlement = Some(Settlement {
                    at_ms: now_ms,
                    reason,
                    receipt: None,
                });
            }
            entry.status = if terminal || (succeeded && entry.settled_total >= entry.cap) {
                SessionStatus::Closed
            } else {
                SessionStatus::Open
            };
        }
    }

    /// Marks a session closed without an associated settlement (e.g. the
    /// sweeper's bare `auto_close`/deadline-expiry path with no pending spend).
    pub fn mark_closed(&self, id: &SessionId) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.status = SessionStatus::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_types::payload::{PayloadAuthorization, PermitAuthorization};
    use x402_types::requirements::Scheme;
    use x402_types::{ChainId, PaymentPayload, PaymentRequirements};

    fn sample_session(cap: u128) -> UptoSession {
        let requirements = PaymentRequirements {
            scheme: Scheme::Upto,
            network: ChainId::new("eip155", "8453"),
            asset: "0xasset".into(),
            amount: Amount::new(cap),
            pay_to: "0xfacilitator".into(),
            max_timeout_seconds: 600,
            extra: Default::default(),
        };
        let payload = PaymentPayload {
            x402_version: 2,
            resource: "https://example.com".into(),
            accepted: requirements.clone(),
            payload: PayloadAuthorization::Permit(PermitAuthorization {
                from: "0xowner".into(),
                to: "0xfacilitator".into(),
                value: Amount::new(cap),
                valid_before: 9_999_999_999,
                nonce: "0xnonce".into(),
                signature: "0xsig".into(),
            }),
        };
        UptoSession::new(Amount::new(cap), 9_999_999_999, 0, payload, requirements)
    }

    #[test]
    fn tracking_rejects_over_cap() {
        let store = SessionStore::new();
        let id = SessionId::generate(&x402_types::session::SessionIdPreimage {
            network: "eip155:8453".into(),
            asset: "0xasset".into(),
            owner: "0xowner".into(),
            spender: "0xfacilitator".into(),
            cap: Amount::new(500),
            nonce: "0xnonce".into(),
            deadline: 9_999_999_999,
            signature: "0xsig".into(),
        });
        store.set(id, sample_session(500));

        assert!(store.try_track_pending(&id, Amount::new(400), 0).is_ok());
        assert_eq!(
            store.try_track_pending(&id, Amount::new(200), 0),
            Err(TrackError::CapExhausted)
        );
        // Exactly the remaining capacity still fits.
        assert!(store.try_track_pending(&id, Amount::new(100), 0).is_ok());
    }

    #[test]
    fn settling_gate_is_exclusive() {
        let store = SessionStore::new();
        let id = SessionId::generate(&x402_types::session::SessionIdPreimage {
            network: "eip155:8453".into(),
            asset: "0xasset".into(),
            owner: "0xowner".into(),
            spender: "0xfacilitator".into(),
            cap: Amount::new(500),
            nonce: "0xnonce".into(),
            deadline: 9_999_999_999,
            signature: "0xsig".into(),
        });
        store.set(id, sample_session(500));

        assert!(store.try_begin_settling(&id));
        assert!(!store.try_begin_settling(&id));

        store.finish_settling(&id, Amount::new(0), true, ErrorReason::IdleTimeout, None, false, 0);
        assert!(store.try_begin_settling(&id));
    }
}
