//! Wager record and status enum.

use parlay_types::{GameId, Timestamp, UsdAmount, UserId, WagerId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a wager. Transitions are owned by the wager engine;
/// this enum only knows which states are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    /// Created; initiator's stake is escrowed, waiting on the opponent.
    Pending,
    /// Both stakes escrowed, waiting on a result.
    Accepted,
    /// Settled; both stakes paid out to the winner.
    Completed,
    /// Stakes returned; no settlement will happen.
    Cancelled,
}

impl WagerStatus {
    /// Terminal states reject every further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One peer-to-peer wager. `amount` is the stake each side risks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerRecord {
    pub id: WagerId,
    pub initiator: UserId,
    pub opponent: UserId,
    pub game: GameId,
    pub amount: UsdAmount,
    pub status: WagerStatus,
    /// Set exactly when `status` is `Completed`.
    pub winner: Option<UserId>,
    pub created_at: Timestamp,
    pub settled_at: Option<Timestamp>,
}

impl WagerRecord {
    /// A freshly created wager in `Pending` state.
    pub fn new(
        id: WagerId,
        initiator: UserId,
        opponent: UserId,
        game: GameId,
        amount: UsdAmount,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            initiator,
            opponent,
            game,
            amount,
            status: WagerStatus::Pending,
            winner: None,
            created_at,
            settled_at: None,
        }
    }

    /// Whether `user` is one of the two parties.
    pub fn is_party(&self, user: &UserId) -> bool {
        self.initiator == *user || self.opponent == *user
    }

    /// The other party relative to `user`. None if `user` is not a party.
    pub fn counterparty(&self, user: &UserId) -> Option<&UserId> {
        if *user == self.initiator {
            Some(&self.opponent)
        } else if *user == self.opponent {
            Some(&self.initiator)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wager() -> WagerRecord {
        WagerRecord::new(
            WagerId::generate(),
            UserId::new("alice"),
            UserId::new("bob"),
            GameId::new("chess-1"),
            UsdAmount::from_dollars(30),
            Timestamp::from_millis(1_000),
        )
    }

    #[test]
    fn new_wager_is_pending_without_winner() {
        let w = wager();
        assert_eq!(w.status, WagerStatus::Pending);
        assert!(w.winner.is_none());
        assert!(w.settled_at.is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!WagerStatus::Pending.is_terminal());
        assert!(!WagerStatus::Accepted.is_terminal());
        assert!(WagerStatus::Completed.is_terminal());
        assert!(WagerStatus::Cancelled.is_terminal());
    }

    #[test]
    fn party_and_counterparty() {
        let w = wager();
        assert!(w.is_party(&UserId::new("alice")));
        assert!(w.is_party(&UserId::new("bob")));
        assert!(!w.is_party(&UserId::new("carol")));
        assert_eq!(
            w.counterparty(&UserId::new("alice")),
            Some(&UserId::new("bob"))
        );
        assert_eq!(w.counterparty(&UserId::new("carol")), None);
    }
}
