//! Wallet record: one row per user.

use parlay_types::{TokenAmount, Timestamp, UsdAmount, UserId};
use serde::{Deserialize, Serialize};

/// Per-user balances.
///
/// Created lazily on first credit and never deleted; a zero-balance wallet
/// stays on disk for audit. Only the wallet service mutates these fields,
/// always inside a store transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub user: UserId,
    /// Spendable balance.
    pub available: UsdAmount,
    /// Funds held against in-flight wagers.
    pub escrow: UsdAmount,
    /// Virtual-currency balance (separate ledger, same discipline).
    pub tokens: TokenAmount,
    pub created_at: Timestamp,
}

impl WalletRecord {
    /// A fresh wallet with all balances at zero.
    pub fn new(user: UserId, created_at: Timestamp) -> Self {
        Self {
            user,
            available: UsdAmount::ZERO,
            escrow: UsdAmount::ZERO,
            tokens: TokenAmount::ZERO,
            created_at,
        }
    }
}
