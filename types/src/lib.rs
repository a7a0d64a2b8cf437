//! Fundamental types for the parlay platform.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: user/wager/game identifiers, fixed-point money amounts, and
//! timestamps. It carries no business logic.

pub mod amount;
pub mod id;
pub mod time;

pub use amount::{TokenAmount, UsdAmount};
pub use id::{EntryId, GameId, UserId, WagerId};
pub use time::Timestamp;
