//! Resource-server route registration (spec §6 "HTTP: Resource server").
//!
//! Route keys are `METHOD PATH`, with `:param`/`{param}` segments folded to
//! `[param]` so that registrations made against either axum's path syntax
//! or the wire-level convention collapse to the same key.

use http::Method;
use std::collections::HashMap;
use x402_types::PaymentRequirements;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("duplicate route registration for `{0}`")]
    Duplicate(String),
}

fn normalize_segment(segment: &str) -> String {
    if let Some(name) = segment.strip_prefix(':') {
        format!("[{name}]")
    } else if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        format!("[{}]", name.trim_end_matches('*'))
    } else {
        segment.to_string()
    }
}

/// `METHOD PATH` with every `:param`/`{param}` segment folded to `[param]`.
pub fn route_key(method: &Method, path: &str) -> String {
    let normalized = path.split('/').map(normalize_segment).collect::<Vec<_>>().join("/");
    format!("{} {}", method, normalized)
}

/// The catalog of per-route accepted payment options. Registration is the
/// single source of truth the paygate middleware consults to build a 402's
/// `accepts` list and to validate an inbound payload's requirements.
#[derive(Default)]
pub struct RouteRegistry {
    entries: HashMap<String, Vec<PaymentRequirements>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `requirements` for `method path`. Fails if the normalized
    /// key is already registered (spec §6: "Duplicate keys MUST fail
    /// registration").
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        requirements: Vec<PaymentRequirements>,
    ) -> Result<(), RegisterError> {
        let key = route_key(&method, path);
        if self.entries.contains_key(&key) {
            return Err(RegisterError::Duplicate(key));
        }
        self.entries.insert(key, requirements);
        Ok(())
    }

    pub fn get(&self, method: &Method, matched_path: &str) -> Option<&[PaymentRequirements]> {
        self.entries.get(&route_key(method, matched_path)).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x402_types::{Amount, ChainId};
    use x402_types::requirements::Scheme;

    fn sample() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: ChainId::new("eip155", "8453"),
            asset: "0xasset".into(),
            amount: Amount::new(1000),
            pay_to: "0xpayto".into(),
            max_timeout_seconds: 60,
            extra: Default::default(),
        }
    }

    #[test]
    fn colon_and_brace_params_normalize_the_same() {
        assert_eq!(
            route_key(&Method::GET, "/users/:id"),
            route_key(&Method::GET, "/users/{id}")
        );
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = RouteRegistry::new();
        registry.register(Method::GET, "/items/:id", vec![sample()]).unwrap();
        let err = registry
            .register(Method::GET, "/items/{id}", vec![sample()])
            .unwrap_err();
        assert_eq!(err, RegisterError::Duplicate("GET /items/[id]".to_string()));
    }

    #[test]
    fn distinct_methods_do_not_collide() {
        let mut registry = RouteRegistry::new();
        registry.register(Method::GET, "/items/:id", vec![sample()]).unwrap();
        assert!(registry.register(Method::POST, "/items/:id", vec![sample()]).is_ok());
    }
}
