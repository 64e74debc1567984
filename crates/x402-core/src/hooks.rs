//! The four hook points around verify/settle, with an explicit abort outcome.
//!
//! Spec §9 flags the source's hook-abort model (an exception whose message
//! carries a magic prefix) as ambiguous and asks for an explicit
//! `Result{Abort{reason}, Continue}` instead. `before` hooks return
//! [`HookOutcome`] and can abort the operation before any chain call;
//! `after` hooks observe the (possibly failed) response and cannot abort —
//! that asymmetry is the whole point of separating the traits.

use x402_types::{ErrorReason, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

/// What a `before` hook decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    Abort { reason: ErrorReason },
}

pub struct VerifyContext<'a> {
    pub payload: &'a PaymentPayload,
    pub requirements: &'a PaymentRequirements,
}

pub struct SettleContext<'a> {
    pub payload: &'a PaymentPayload,
    pub requirements: &'a PaymentRequirements,
}

pub trait BeforeVerifyHook: Send + Sync {
    fn call(&self, ctx: &VerifyContext<'_>) -> HookOutcome;
}

pub trait AfterVerifyHook: Send + Sync {
    fn call(&self, ctx: &VerifyContext<'_>, response: &VerifyResponse);
}

pub trait BeforeSettleHook: Send + Sync {
    fn call(&self, ctx: &SettleContext<'_>) -> HookOutcome;
}

pub trait AfterSettleHook: Send + Sync {
    fn call(&self, ctx: &SettleContext<'_>, response: &SettleResponse);
}

/// The ordered set of hooks the dispatch engine invokes synchronously
/// around each `verify`/`settle` call. Hosts register hooks to implement
/// e.g. "verified-before-settle" gating and Upto tracking cleanup.
#[derive(Default)]
pub struct Hooks {
    before_verify: Vec<Box<dyn BeforeVerifyHook>>,
    after_verify: Vec<Box<dyn AfterVerifyHook>>,
    before_settle: Vec<Box<dyn BeforeSettleHook>>,
    after_settle: Vec<Box<dyn AfterSettleHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_verify(mut self, hook: impl BeforeVerifyHook + 'static) -> Self {
        self.before_verify.push(Box::new(hook));
        self
    }

    pub fn on_after_verify(mut self, hook: impl AfterVerifyHook + 'static) -> Self {
        self.after_verify.push(Box::new(hook));
        self
    }

    pub fn on_before_settle(mut self, hook: impl BeforeSettleHook + 'static) -> Self {
        self.before_settle.push(Box::new(hook));
        self
    }

    pub fn on_after_settle(mut self, hook: impl AfterSettleHook + 'static) -> Self {
        self.after_settle.push(Box::new(hook));
        self
    }

    pub(crate) fn run_before_verify(&self, ctx: &VerifyContext<'_>) -> HookOutcome {
        for hook in &self.before_verify {
            if let HookOutcome::Abort { reason } = hook.call(ctx) {
                return HookOutcome::Abort { reason };
            }
        }
        HookOutcome::Continue
    }

    pub(crate) fn run_after_verify(&self, ctx: &VerifyContext<'_>, response: &VerifyResponse) {
        // Invoked even when `response.is_valid` is false (spec §4.1: "hooks
        // MUST be deterministic about side effects").
        for hook in &self.after_verify {
            hook.call(ctx, response);
        }
    }

    pub(crate) fn run_before_settle(&self, ctx: &SettleContext<'_>) -> HookOutcome {
        for hook in &self.before_settle {
            if let HookOutcome::Abort { reason } = hook.call(ctx) {
                return HookOutcome::Abort { reason };
            }
        }
        HookOutcome::Continue
    }

    pub(crate) fn run_after_settle(&self, ctx: &SettleContext<'_>, response: &SettleResponse) {
        for hook in &self.after_settle {
            hook.call(ctx, response);
        }
    }
}
