//! Post-commit notifier boundary.
//!
//! The engine publishes one event per applied transition, strictly after the
//! owning transaction commits. Delivery is fire-and-forget over a broadcast
//! channel: no subscribers, slow subscribers, or dropped receivers never
//! affect a settlement. The real-time transport subscribes here and fans
//! events out to clients.

use serde::Serialize;
use tokio::sync::broadcast;

use parlay_store::WagerRecord;
use parlay_types::Timestamp;

/// Which transition a [`WagerEvent`] announces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerEventKind {
    WagerCreated,
    WagerAccepted,
    WagerCompleted,
    WagerCancelled,
}

/// A wager lifecycle notification with a snapshot of the committed record.
#[derive(Clone, Debug, Serialize)]
pub struct WagerEvent {
    #[serde(rename = "type")]
    pub kind: WagerEventKind,
    pub wager: WagerRecord,
    pub at: Timestamp,
}

impl WagerEvent {
    /// Wire form for outbound delivery.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("wager events are always serializable")
    }
}

/// Broadcast fan-out for wager events.
pub struct EventBus {
    tx: broadcast::Sender<WagerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WagerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Failure here only means nobody is listening;
    /// it is logged and otherwise ignored.
    pub fn publish(&self, event: WagerEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("wager event dropped: no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlay_store::WagerStatus;
    use parlay_types::{GameId, UsdAmount, UserId, WagerId};

    fn event() -> WagerEvent {
        WagerEvent {
            kind: WagerEventKind::WagerCreated,
            wager: WagerRecord::new(
                WagerId::generate(),
                UserId::new("alice"),
                UserId::new("bob"),
                GameId::new("chess-1"),
                UsdAmount::from_dollars(30),
                Timestamp::from_millis(1_000),
            ),
            at: Timestamp::from_millis(1_000),
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(8);
        bus.publish(event());
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(event());
        let received = rx.recv().await.expect("event");
        assert_eq!(received.kind, WagerEventKind::WagerCreated);
        assert_eq!(received.wager.status, WagerStatus::Pending);
    }

    #[test]
    fn json_wire_form_is_tagged() {
        let json = event().to_json();
        assert!(json.contains(r#""type":"wager_created""#));
        assert!(json.contains(r#""status":"pending""#));
    }
}
