//! Nullable infrastructure for tests: an in-memory escrow store with real
//! conflict semantics.

pub mod store;

pub use store::{MemoryStore, MemoryTxn};
