//! Money amount types for the USD and token ledgers.
//!
//! Amounts are represented as fixed-point integers to avoid floating-point
//! errors. The smallest USD unit is 1 cent; tokens are whole units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A USD-equivalent amount in whole cents.
///
/// Unsigned by construction: balances can never go negative, and direction
/// is carried by the ledger entry kind, not by a sign bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UsdAmount(u64);

impl UsdAmount {
    pub const ZERO: Self = Self(0);

    pub fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole dollars, no fractional part.
    pub fn from_dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Double this amount (both stakes of a wager). None on overflow.
    pub fn checked_double(self) -> Option<Self> {
        self.0.checked_mul(2).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for UsdAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// A balance of the platform's internal virtual currency, in whole tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenAmount(u64);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(tokens: u64) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tokens", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_display_pads_cents() {
        assert_eq!(UsdAmount::from_cents(5).to_string(), "$0.05");
        assert_eq!(UsdAmount::from_cents(12_34).to_string(), "$12.34");
        assert_eq!(UsdAmount::from_dollars(30).to_string(), "$30.00");
    }

    #[test]
    fn usd_checked_sub_underflow_is_none() {
        let a = UsdAmount::from_cents(100);
        let b = UsdAmount::from_cents(150);
        assert_eq!(a.checked_sub(b), None);
        assert_eq!(b.checked_sub(a), Some(UsdAmount::from_cents(50)));
    }

    #[test]
    fn usd_checked_double() {
        assert_eq!(
            UsdAmount::from_cents(3000).checked_double(),
            Some(UsdAmount::from_cents(6000))
        );
        assert_eq!(UsdAmount::from_cents(u64::MAX).checked_double(), None);
    }

    #[test]
    fn token_arithmetic() {
        let a = TokenAmount::new(10);
        assert_eq!(a.checked_add(TokenAmount::new(5)), Some(TokenAmount::new(15)));
        assert_eq!(a.checked_sub(TokenAmount::new(11)), None);
    }
}
