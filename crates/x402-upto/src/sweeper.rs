//! The background loop that decides when to coalesce pending Upto spend
//! into one on-chain settlement (spec §4.3).

use crate::config::SweeperConfig;
use crate::store::SessionStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use x402_core::Facilitator;
use x402_types::requirements::Scheme;
use x402_types::{Amount, ErrorReason, PaymentRequirements, SessionId, UptoSession};

/// Which trigger fired for a session on a given tick, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    IdleTimeout,
    DeadlineBuffer,
    CapThreshold,
    AutoClose,
}

impl Trigger {
    pub fn reason(self) -> ErrorReason {
        match self {
            Trigger::IdleTimeout => ErrorReason::IdleTimeout,
            Trigger::DeadlineBuffer => ErrorReason::DeadlineBuffer,
            Trigger::CapThreshold => ErrorReason::CapThreshold,
            Trigger::AutoClose => ErrorReason::AutoClose,
        }
    }

    /// `deadline_buffer` and `auto_close` are terminal: the session closes
    /// after this settlement regardless of outcome-retry semantics.
    pub fn is_terminal(self) -> bool {
        matches!(self, Trigger::DeadlineBuffer | Trigger::AutoClose)
    }
}

/// Decides what a sweeper tick should do for one session, given the current
/// wall clock. Pure function, independent of the store and any I/O, so the
/// trigger table can be exercised directly in unit tests.
pub fn evaluate(session: &UptoSession, now_ms: u64, now_sec: u64, config: &SweeperConfig) -> Option<Trigger> {
    use x402_types::session::SessionStatus;
    if session.status == SessionStatus::Settling {
        return None;
    }

    let idle_ms = now_ms.saturating_sub(session.last_activity_ms);
    let ttd_sec = (session.deadline as i64) - (now_sec as i64);
    let outstanding = session.outstanding();

    if session.status == SessionStatus::Open && session.pending_spent > Amount::ZERO {
        if idle_ms >= config.idle_settle_ms {
            return Some(Trigger::IdleTimeout);
        }
        if ttd_sec <= config.deadline_buffer_sec as i64 {
            return Some(Trigger::DeadlineBuffer);
        }
        if outstanding.0.saturating_mul(config.cap_threshold_den)
            >= session.cap.0.saturating_mul(config.cap_threshold_num)
        {
            return Some(Trigger::CapThreshold);
        }
    }

    let should_close = idle_ms >= config.long_idle_close_ms
        || ttd_sec <= 0
        || session.settled_total >= session.cap;
    if should_close && session.pending_spent > Amount::ZERO {
        return Some(Trigger::AutoClose);
    }

    None
}

/// Whether a long-idle session with nothing pending should merely be
/// closed-and-evicted this tick (no settlement call needed).
pub fn should_evict_idle(session: &UptoSession, now_ms: u64, config: &SweeperConfig) -> bool {
    use x402_types::session::SessionStatus;
    if session.status == SessionStatus::Settling {
        return false;
    }
    let long_idle = now_ms.saturating_sub(session.last_activity_ms) >= config.long_idle_close_ms;
    long_idle && (session.status == SessionStatus::Closed || !(session.pending_spent > Amount::ZERO))
}

/// `evaluate`'s sibling for sessions with nothing pending: there is no batch
/// to settle, so the close-condition (deadline passed, already fully
/// settled, or long idle) can mark the session closed directly instead of
/// going through a settlement call (spec §4.3: "Then, regardless of
/// pending ... else mark closed"). Without this, an empty session past its
/// deadline stays `open` until `should_evict_idle`'s much longer
/// `long_idle_close_ms` threshold.
pub fn should_close_empty(session: &UptoSession, now_ms: u64, now_sec: u64, config: &SweeperConfig) -> bool {
    use x402_types::session::SessionStatus;
    if session.status != SessionStatus::Open || session.pending_spent > Amount::ZERO {
        return false;
    }
    let idle_ms = now_ms.saturating_sub(session.last_activity_ms);
    let ttd_sec = (session.deadline as i64) - (now_sec as i64);
    idle_ms >= config.long_idle_close_ms || ttd_sec <= 0 || session.settled_total >= session.cap
}

/// The sweeper: owns a handle to the store and the facilitator core it
/// settles through, and ticks on a fixed cadence until cancelled.
pub struct Sweeper {
    store: SessionStore,
    facilitator: Arc<dyn Facilitator>,
    config: SweeperConfig,
    cancellation: CancellationToken,
}

impl Sweeper {
    pub fn new(store: SessionStore, facilitator: Arc<dyn Facilitator>, config: SweeperConfig) -> Self {
        Sweeper {
            store,
            facilitator,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Spawns the tick loop. The returned handle stops cleanly when the
    /// token returned by [`Sweeper::cancellation_token`] is cancelled
    /// (spec §5: "the sweeper stops on process shutdown, its interval
    /// handle cancelled; in-flight settlements are allowed to complete").
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.config.tick_ms));
            loop {
                tokio::select! {
                    _ = self.cancellation.cancelled() => {
                        info!("sweeper stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        self.tick().await;
                    }
                }
            }
        })
    }

    #[instrument(skip_all)]
    pub async fn tick(&self) {
        let now_ms = now_ms();
        let now_sec = now_ms / 1000;

        for (id, session) in self.store.entries() {
            if should_evict_idle(&session, now_ms, &self.config) {
                self.store.delete(&id);
                continue;
            }

            if should_close_empty(&session, now_ms, now_sec, &self.config) {
                self.store.mark_closed(&id);
                continue;
            }

            match evaluate(&session, now_ms, now_sec, &self.config) {
                Some(trigger) => self.settle_one(&id, &session, trigger, now_ms).await,
                None => {}
            }
        }
    }

    async fn settle_one(&self, id: &SessionId, session: &UptoSession, trigger: Trigger, now_ms: u64) {
        if !self.store.try_begin_settling(id) {
            // Another task (request-path settlement, or a concurrent tick)
            // is already settling this session; the gate made this a no-op.
            return;
        }

        let batch_amount = session.pending_spent;
        let one_shot_requirements = PaymentRequirements {
            scheme: Scheme::Upto,
            amount: batch_amount,
            ..session.payment_requirements.clone()
        };

        let response = self
            .facilitator
            .settle(&session.payment_payload, &one_shot_requirements)
            .await;

        if !response.success {
            warn!(session = %id, reason = ?response.error_reason, "sweeper settlement failed");
        }

        self.store.finish_settling(
            id,
            batch_amount,
            response.success,
            trigger.reason(),
            Some(response.transaction).filter(|t| !t.is_empty()),
            trigger.is_terminal(),
            now_ms,
        );
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
