//! Append-only ledger records and the replay function.
//!
//! Entry amounts are unsigned; the `kind` fixes the balance effect. Replaying
//! a user's entries from zero must reproduce the stored wallet balances
//! exactly; `replay` below is the single implementation of that rule, used
//! by reconciliation audits and tests.

use crate::StoreError;
use parlay_types::{EntryId, Timestamp, TokenAmount, UsdAmount, UserId, WagerId};
use serde::{Deserialize, Serialize};

/// What a ledger entry did to its owner's balances.
///
/// | kind | available | escrow |
/// |---|---|---|
/// | `deposit` | `+amount` | |
/// | `withdrawal` | `-amount` | |
/// | `escrow_hold` | `-amount` | `+amount` |
/// | `escrow_release` | `+amount` | `-amount` |
/// | `escrow_transfer` (payer side) | | `-amount` |
/// | `wager_settlement` (payee side) | `+amount` | |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    EscrowHold,
    EscrowRelease,
    EscrowTransfer,
    WagerSettlement,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::EscrowHold => "escrow_hold",
            Self::EscrowRelease => "escrow_release",
            Self::EscrowTransfer => "escrow_transfer",
            Self::WagerSettlement => "wager_settlement",
        }
    }
}

/// One immutable row of the USD ledger.
///
/// A row only exists if the mutation it describes was durably applied: the
/// row is written in the same transaction as the balance change, so there is
/// no pending state to track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user: UserId,
    /// The other side of a transfer or settlement, when there is one.
    pub counterparty: Option<UserId>,
    pub kind: EntryKind,
    pub amount: UsdAmount,
    pub wager: Option<WagerId>,
    pub created_at: Timestamp,
}

/// What a token entry did to its owner's token balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEntryKind {
    TokenCredit,
    TokenDebit,
}

/// One immutable row of the token ledger (distinct from the USD ledger,
/// same write-once discipline).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub id: EntryId,
    pub user: UserId,
    pub kind: TokenEntryKind,
    pub amount: TokenAmount,
    pub wager: Option<WagerId>,
    pub created_at: Timestamp,
}

/// Balances reproduced by replaying a user's ledger from zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayedBalances {
    pub available: UsdAmount,
    pub escrow: UsdAmount,
}

/// Replay a user's USD entries, in append order, from zero balances.
///
/// Any underflow or overflow means the log and the balance-mutation code
/// disagree, which is a corruption, not a user error.
pub fn replay(entries: &[LedgerEntry]) -> Result<ReplayedBalances, StoreError> {
    let mut available = UsdAmount::ZERO;
    let mut escrow = UsdAmount::ZERO;

    for entry in entries {
        let amount = entry.amount;
        let step = |v: Option<UsdAmount>| {
            v.ok_or_else(|| {
                StoreError::Corruption(format!(
                    "replay over/underflow at entry {} ({})",
                    entry.id,
                    entry.kind.as_str()
                ))
            })
        };
        match entry.kind {
            EntryKind::Deposit => {
                available = step(available.checked_add(amount))?;
            }
            EntryKind::Withdrawal => {
                available = step(available.checked_sub(amount))?;
            }
            EntryKind::EscrowHold => {
                available = step(available.checked_sub(amount))?;
                escrow = step(escrow.checked_add(amount))?;
            }
            EntryKind::EscrowRelease => {
                escrow = step(escrow.checked_sub(amount))?;
                available = step(available.checked_add(amount))?;
            }
            EntryKind::EscrowTransfer => {
                escrow = step(escrow.checked_sub(amount))?;
            }
            EntryKind::WagerSettlement => {
                available = step(available.checked_add(amount))?;
            }
        }
    }

    Ok(ReplayedBalances { available, escrow })
}

/// Replay a user's token entries from zero.
pub fn replay_tokens(entries: &[TokenEntry]) -> Result<TokenAmount, StoreError> {
    let mut tokens = TokenAmount::ZERO;
    for entry in entries {
        let next = match entry.kind {
            TokenEntryKind::TokenCredit => tokens.checked_add(entry.amount),
            TokenEntryKind::TokenDebit => tokens.checked_sub(entry.amount),
        };
        tokens = next.ok_or_else(|| {
            StoreError::Corruption(format!("token replay over/underflow at entry {}", entry.id))
        })?;
    }
    Ok(tokens)
}
