//! CAIP-2 chain identifiers (`namespace:reference`).

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A CAIP-2 chain identifier, e.g. `eip155:8453` or `solana:mainnet`.
///
/// Starknet carries both a legacy form (`starknet:SN_MAIN`) and a canonical
/// numeric-chain-id form; [`ChainId::canonicalize`] maps either to the form
/// used as the dispatch engine's registry key, so both forms route to the
/// same [`x402_core`](../x402_core/index.html)-level handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId {
    namespace: String,
    reference: String,
}

impl ChainId {
    pub fn new(namespace: impl Into<String>, reference: impl Into<String>) -> Self {
        ChainId {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_eip155(&self) -> bool {
        self.namespace == "eip155"
    }

    pub fn is_solana(&self) -> bool {
        self.namespace == "solana"
    }

    pub fn is_starknet(&self) -> bool {
        self.namespace == "starknet"
    }

    /// The numeric EIP-155 chain id, if this is an `eip155:*` identifier.
    ///
    /// Per the Upto-EVM verify algorithm, an empty or malformed reference
    /// parses as `0` rather than failing outright — the caller is expected
    /// to reject `0` downstream via its own invariant (e.g. `cap_too_low`).
    pub fn eip155_chain_id(&self) -> u64 {
        self.reference.parse().unwrap_or(0)
    }

    /// Canonical form used as the dispatch engine's registry key.
    ///
    /// Starknet's legacy `SN_MAIN`/`SN_SEPOLIA` names are folded to their
    /// canonical numeric chain id so that both forms dispatch identically.
    pub fn canonicalize(&self) -> ChainId {
        if self.namespace == "starknet" {
            let canonical_reference = match self.reference.as_str() {
                "SN_MAIN" => "23448594291968334",
                "SN_SEPOLIA" => "393402133025997798000961",
                other => other,
            };
            ChainId::new("starknet", canonical_reference)
        } else {
            self.clone()
        }
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid CAIP-2 chain id `{0}`: expected `namespace:reference`")]
pub struct ChainIdParseError(String);

impl TryFrom<String> for ChainId {
    type Error = ChainIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(':') {
            Some((namespace, reference)) if !namespace.is_empty() && !reference.is_empty() => {
                Ok(ChainId::new(namespace, reference))
            }
            _ => Err(ChainIdParseError(value)),
        }
    }
}

impl std::str::FromStr for ChainId {
    type Err = ChainIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainId::try_from(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrip() {
        let id = ChainId::new("eip155", "8453");
        assert_eq!(id.to_string(), "eip155:8453");
        assert_eq!(id, "eip155:8453".parse().unwrap());
    }

    #[test]
    fn starknet_legacy_canonicalizes() {
        let legacy = ChainId::new("starknet", "SN_SEPOLIA");
        let canonical = ChainId::new("starknet", "393402133025997798000961");
        assert_eq!(legacy.canonicalize(), canonical.canonicalize());
    }

    #[test]
    fn malformed_eip155_reference_parses_as_zero() {
        let id = ChainId::new("eip155", "");
        assert_eq!(id.eip155_chain_id(), 0);
    }
}
