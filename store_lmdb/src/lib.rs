//! LMDB storage backend for the parlay escrow ledger.
//!
//! Implements the `parlay-store` traits using the `heed` LMDB bindings.
//! LMDB allows a single write transaction at a time, which directly provides
//! the serialized read-modify-write discipline the store contract asks for:
//! a transition that reaches its write transaction always sees the latest
//! committed wallet and wager rows.

pub mod environment;
pub mod error;
pub mod txn;

pub use environment::LmdbStore;
pub use error::LmdbError;
