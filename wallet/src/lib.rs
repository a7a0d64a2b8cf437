//! Wallet service for the parlay platform.
//!
//! The operations in this crate are the only code permitted to mutate
//! `available`, `escrow`, or `tokens` on a wallet. Every mutation writes a
//! matching ledger row in the same store transaction, so replaying the
//! ledger always reproduces the balances.

pub mod error;
pub mod service;

pub use error::WalletError;
