//! Wager engine for the parlay platform.
//!
//! Owns the wager lifecycle: `pending → {accepted, cancelled}`,
//! `accepted → {completed, cancelled}`. Each transition runs as one store
//! transaction that re-reads the wager row, validates the precondition
//! against that fresh read, applies the single matching wallet operation,
//! and writes the new wager state. Transient store conflicts are retried
//! with bounded exponential backoff; everything else surfaces unchanged.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;

pub use config::EngineConfig;
pub use engine::{BalanceView, WagerEngine};
pub use error::EngineError;
pub use events::{EventBus, WagerEvent, WagerEventKind};
