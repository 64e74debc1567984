//! The client's registry of per-chain/scheme signing backends.

use async_trait::async_trait;
use std::sync::Arc;
use x402_types::{PaymentPayload, PaymentRequirements};

use crate::error::X402Error;

/// A client-side signer for one `(scheme, network)` family.
///
/// Registered instances are tried, in registration order, against each of a
/// server's accepted payment options; the first one that accepts a given
/// [`PaymentRequirements`] produces the signed payload for it.
#[async_trait]
pub trait ClientScheme: Send + Sync {
    /// Whether this scheme can produce a signed payload for `requirements`.
    fn accept(&self, requirements: &PaymentRequirements) -> bool;

    /// Signs a fresh [`PaymentPayload`] for `requirements`.
    async fn sign(&self, requirements: &PaymentRequirements) -> Result<PaymentPayload, X402Error>;
}

/// One `(requirements, scheme)` pairing a [`ClientSchemes`] registry found.
#[derive(Clone)]
pub struct PaymentCandidate {
    pub requirements: PaymentRequirements,
    pub scheme: Arc<dyn ClientScheme>,
}

/// Chooses among several [`PaymentCandidate`]s when a server accepts more
/// than one payment option.
pub trait PaymentSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate>;
}

/// Picks whichever candidate was found first — the default policy (spec
/// §4.4: "default: first supported").
pub struct FirstMatch;

impl PaymentSelector for FirstMatch {
    fn select<'a>(&self, candidates: &'a [PaymentCandidate]) -> Option<&'a PaymentCandidate> {
        candidates.first()
    }
}

/// The registered collection of [`ClientScheme`]s.
#[derive(Default, Clone)]
pub struct ClientSchemes(Vec<Arc<dyn ClientScheme>>);

impl ClientSchemes {
    pub fn push<S: ClientScheme + 'static>(&mut self, scheme: S) {
        self.0.push(Arc::new(scheme));
    }

    /// Finds every accepted requirement at least one registered scheme can sign.
    pub fn candidates(&self, accepts: &[PaymentRequirements]) -> Vec<PaymentCandidate> {
        let mut out = Vec::new();
        for requirements in accepts {
            if let Some(scheme) = self.0.iter().find(|s| s.accept(requirements)) {
                out.push(PaymentCandidate {
                    requirements: requirements.clone(),
                    scheme: scheme.clone(),
                });
            }
        }
        out
    }
}
