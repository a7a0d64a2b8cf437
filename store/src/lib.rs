//! Abstract storage for the parlay escrow ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements the traits
//! in this crate. The wallet service and wager engine depend only on the
//! traits, never on a concrete backend.

pub mod error;
pub mod ledger;
pub mod txn;
pub mod wager;
pub mod wallet;

pub use error::StoreError;
pub use ledger::{EntryKind, LedgerEntry, TokenEntry, TokenEntryKind};
pub use txn::{EscrowStore, StoreTxn};
pub use wager::{WagerRecord, WagerStatus};
pub use wallet::WalletRecord;
