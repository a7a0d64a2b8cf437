use parlay_store::{StoreError, WagerStatus};
use parlay_types::WagerId;
use parlay_wallet::WalletError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("wager not found: {0}")]
    WagerNotFound(WagerId),

    #[error("invalid transition: wager {wager} is {status}, cannot {attempted}")]
    InvalidTransition {
        wager: WagerId,
        status: WagerStatus,
        attempted: &'static str,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Transient conflicts are the only errors the engine retries.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(e) => e.is_conflict(),
            Self::Wallet(WalletError::Store(e)) => e.is_conflict(),
            _ => false,
        }
    }

    /// Errors the caller can act on (fund the wallet, fix the request).
    /// Everything else is internal and surfaces as an opaque failure.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::WagerNotFound(_) | Self::InvalidTransition { .. } | Self::Unauthorized(_) => true,
            Self::Wallet(e) => e.is_user_error(),
            Self::Config(_) | Self::Store(_) => false,
        }
    }
}
