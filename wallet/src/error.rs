use parlay_store::StoreError;
use parlay_types::{TokenAmount, UsdAmount};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    /// Zero or otherwise non-positive amounts are rejected before any read.
    #[error("amount must be positive")]
    InvalidAmount,

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        needed: UsdAmount,
        available: UsdAmount,
    },

    #[error("insufficient tokens: need {needed}, have {available}")]
    InsufficientTokens {
        needed: TokenAmount,
        available: TokenAmount,
    },

    /// A balance state that valid inputs can never produce. Always a bug;
    /// logged at error severity where it is raised.
    #[error("balance invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WalletError {
    /// User errors are safe to surface as-is and must not be retried
    /// unchanged; everything else is internal.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount | Self::InsufficientFunds { .. } | Self::InsufficientTokens { .. }
        )
    }
}
