//! The client-side permit cache (spec §5: "indexed by `(network, asset)`;
//! invalidation is a scalar replace").

use dashmap::DashMap;
use x402_types::{ChainId, PaymentPayload};

/// Caches a signed Upto permit per `(network, asset)` so repeated requests
/// against the same batched cap reuse one signature instead of prompting a
/// fresh one for every call.
#[derive(Default)]
pub struct PermitCache {
    entries: DashMap<(ChainId, String), PaymentPayload>,
}

impl PermitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, network: &ChainId, asset: &str) -> Option<PaymentPayload> {
        self.entries
            .get(&(network.clone(), asset.to_string()))
            .map(|entry| entry.clone())
    }

    pub fn put(&self, network: &ChainId, asset: &str, payload: PaymentPayload) {
        self.entries.insert((network.clone(), asset.to_string()), payload);
    }

    /// Drops the cached permit for `(network, asset)`, forcing the next
    /// request to sign a fresh one.
    pub fn invalidate(&self, network: &ChainId, asset: &str) {
        self.entries.remove(&(network.clone(), asset.to_string()));
    }
}
