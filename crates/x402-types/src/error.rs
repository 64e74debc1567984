//! The closed taxonomy of `invalidReason` / `errorReason` wire strings.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Every reason a `VerifyResponse`/`SettleResponse` can carry, plus the
/// sweeper's own terminal/non-terminal trigger names (`idle_timeout`,
/// `deadline_buffer`, `cap_threshold`, `auto_close`, `manual_close`) which
/// are recorded in [`crate::session::Settlement::reason`] using the same enum
/// so the taxonomy stays closed end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    UnsupportedScheme,
    InvalidPayload,
    InvalidUptoEvmPayload,
    InvalidPaymentRequirements,
    NetworkMismatch,
    MissingEip712Domain,
    SpenderNotFacilitator,
    CapTooLow,
    CapBelowRequiredMax,
    CapExhausted,
    AuthorizationExpired,
    InvalidChainId,
    InvalidPermitSignature,
    UnsupportedSignatureType,
    InsufficientAllowance,
    PermitFailed,
    InvalidTransactionState,
    TransactionFailed,
    SessionClosed,
    ManualClose,
    IdleTimeout,
    DeadlineBuffer,
    CapThreshold,
    AutoClose,
}

impl ErrorReason {
    /// Whether a sweeper trigger of this reason is terminal (closes the session).
    pub fn is_terminal_sweep_trigger(self) -> bool {
        matches!(
            self,
            ErrorReason::DeadlineBuffer | ErrorReason::AutoClose | ErrorReason::ManualClose
        )
    }
}

impl Display for ErrorReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Reuse the serde snake_case token as the human-readable string,
        // rather than maintaining a second copy of these names.
        let json = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", json.trim_matches('"'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorReason::CapExhausted).unwrap(),
            "\"cap_exhausted\""
        );
    }

    #[test]
    fn display_matches_wire_token() {
        assert_eq!(ErrorReason::CapTooLow.to_string(), "cap_too_low");
    }
}
