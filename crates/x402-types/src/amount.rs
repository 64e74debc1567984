//! Chain-agnostic token amounts, smallest-unit integers as decimal strings on the wire.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::{Add, Sub};

/// A non-negative token amount in the asset's smallest unit.
///
/// Parsing from the wire is lenient by design (spec: "parsing helpers MUST
/// treat the empty or malformed integer as `0`"), so that a missing
/// `cap`/`amount` field naturally fails later invariants (e.g. `cap_too_low`)
/// instead of the parser itself raising an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: u128) -> Self {
        Amount(value)
    }

    pub fn parse_lenient(raw: &str) -> Self {
        raw.trim().parse::<u128>().map(Amount).unwrap_or(Amount::ZERO)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Amount> for String {
    fn from(value: Amount) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Amount {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Amount::parse_lenient(&value))
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_sub(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_parses_as_zero() {
        assert_eq!(Amount::parse_lenient(""), Amount::ZERO);
    }

    #[test]
    fn malformed_string_parses_as_zero() {
        assert_eq!(Amount::parse_lenient("not-a-number"), Amount::ZERO);
    }

    #[test]
    fn well_formed_parses() {
        assert_eq!(Amount::parse_lenient("1200"), Amount::new(1200));
    }
}
