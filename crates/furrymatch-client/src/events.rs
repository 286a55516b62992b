//! Session-scoped publish/subscribe channel.
//!
//! Views that need to hear about read-state changes or new matches get a
//! [`SessionBus`] injected and call [`SessionBus::subscribe`].

use serde::Serialize;
use tokio::sync::broadcast;

use furrymatch_shared::types::{MatchId, PetId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A conversation was opened and its unread bucket flipped to read.
    ChatRead { match_id: MatchId },

    /// A message was persisted; `preview` is its text.
    MessageSent { match_id: MatchId, preview: String },

    /// A like produced a mutual match.
    MatchFound { match_id: MatchId, target: PetId },

    /// The set of matches with unread messages changed.
    UnreadChanged { match_ids: Vec<MatchId> },
}

#[derive(Debug, Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: SessionEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(event = ?e.0, "No subscribers for session event");
        }
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = SessionBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(SessionEvent::ChatRead {
            match_id: MatchId(3),
        });

        let expected = SessionEvent::ChatRead {
            match_id: MatchId(3),
        };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = SessionBus::default();
        bus.publish(SessionEvent::UnreadChanged { match_ids: vec![] });
    }
}
