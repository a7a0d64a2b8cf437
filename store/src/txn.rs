//! Transaction traits: the contract every backend must honor.
//!
//! A `StoreTxn` is an isolated read-modify-write scope over wallets, wagers,
//! and the ledger. Nothing inside it is observable until `commit`; dropping
//! an uncommitted transaction discards every write. Reads through the
//! transaction are fresh with respect to all committed transactions, which
//! is what lets the engine detect stale transitions.

use crate::ledger::{LedgerEntry, TokenEntry};
use crate::wager::WagerRecord;
use crate::wallet::WalletRecord;
use crate::StoreError;
use parlay_types::{UserId, WagerId};

/// An open transaction. All writes are buffered until [`StoreTxn::commit`].
pub trait StoreTxn {
    /// Read a wallet row with update intent. Two concurrent transactions
    /// that both read-then-write the same wallet cannot both commit; the
    /// backend serializes them or fails one with [`StoreError::Conflict`].
    fn wallet_for_update(&mut self, user: &UserId) -> Result<Option<WalletRecord>, StoreError>;

    fn put_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError>;

    /// Read a wager row with update intent; same isolation contract as
    /// [`StoreTxn::wallet_for_update`].
    fn wager_for_update(&mut self, id: &WagerId) -> Result<Option<WagerRecord>, StoreError>;

    fn put_wager(&mut self, wager: &WagerRecord) -> Result<(), StoreError>;

    /// Append one immutable USD ledger row.
    fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// Append one immutable token ledger row.
    fn append_token_entry(&mut self, entry: &TokenEntry) -> Result<(), StoreError>;

    /// Commit every buffered write atomically. A [`StoreError::Conflict`]
    /// here means another transaction won a race; the caller may retry its
    /// whole transaction from the top.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// A storage backend for the escrow ledger.
///
/// Read-only accessors do not take a transaction and may observe any
/// committed state; they exist for balance queries and audit reads, never
/// for read-modify-write sequences.
pub trait EscrowStore: Send + Sync {
    type Txn<'a>: StoreTxn
    where
        Self: 'a;

    /// Open a transaction.
    fn begin(&self) -> Result<Self::Txn<'_>, StoreError>;

    fn wallet(&self, user: &UserId) -> Result<Option<WalletRecord>, StoreError>;

    fn wager(&self, id: &WagerId) -> Result<Option<WagerRecord>, StoreError>;

    /// A user's USD ledger rows in append order (the replay order).
    fn entries_for_user(&self, user: &UserId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// All USD ledger rows tagged with a wager, in append order.
    fn entries_for_wager(&self, id: &WagerId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// A user's token ledger rows in append order.
    fn token_entries_for_user(&self, user: &UserId) -> Result<Vec<TokenEntry>, StoreError>;
}
