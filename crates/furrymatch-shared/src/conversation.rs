//! Conversation keys.
//!
//! A two-party thread is partitioned into four buckets addressed by
//! `(sender, recipient, read_state)`. The backend stores the tuple as a
//! single `sender;recipient;state` string on every message; this module keeps
//! it structured and only formats or parses it at the serde boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{FIELD_SEPARATOR, STATE_READ, STATE_UNREAD};
use crate::error::KeyError;
use crate::types::OwnerId;

/// Whether the recipient has opened the conversation since the message
/// arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadState {
    Unread,
    Read,
}

impl ReadState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadState::Unread => STATE_UNREAD,
            ReadState::Read => STATE_READ,
        }
    }
}

impl FromStr for ReadState {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            STATE_UNREAD => Ok(ReadState::Unread),
            STATE_READ => Ok(ReadState::Read),
            other => Err(KeyError::UnknownReadState(other.to_string())),
        }
    }
}

/// One bucket of a two-party thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatStateKey {
    pub sender: OwnerId,
    pub recipient: OwnerId,
    pub read_state: ReadState,
}

impl ChatStateKey {
    pub fn new(sender: OwnerId, recipient: OwnerId, read_state: ReadState) -> Self {
        Self {
            sender,
            recipient,
            read_state,
        }
    }

    /// The same direction, flipped to read.
    pub fn mark_read(self) -> Self {
        Self {
            read_state: ReadState::Read,
            ..self
        }
    }

    pub fn is_unread(&self) -> bool {
        self.read_state == ReadState::Unread
    }

    /// Whether `owner` is either party of this bucket.
    pub fn involves(&self, owner: OwnerId) -> bool {
        self.sender == owner || self.recipient == owner
    }
}

impl fmt::Display for ChatStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.sender,
            self.recipient,
            self.read_state.as_str(),
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for ChatStateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(KeyError::SegmentCount(parts.len()));
        }
        let sender = parts[0]
            .parse::<OwnerId>()
            .map_err(|_| KeyError::InvalidOwnerId(parts[0].to_string()))?;
        let recipient = parts[1]
            .parse::<OwnerId>()
            .map_err(|_| KeyError::InvalidOwnerId(parts[1].to_string()))?;
        let read_state = parts[2].parse::<ReadState>()?;
        Ok(Self::new(sender, recipient, read_state))
    }
}

impl TryFrom<String> for ChatStateKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChatStateKey> for String {
    fn from(key: ChatStateKey) -> Self {
        key.to_string()
    }
}

/// The four buckets of a conversation, seen from one participant.
///
/// `self` is always the first segment of the `sender_*` keys, so the same
/// pair built from the other end yields the same four buckets with the roles
/// swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationKeys {
    pub sender_unread: ChatStateKey,
    pub sender_read: ChatStateKey,
    pub recipient_unread: ChatStateKey,
    pub recipient_read: ChatStateKey,
}

impl ConversationKeys {
    /// Messages written by `self`, both read states.
    pub fn outgoing(&self) -> (ChatStateKey, ChatStateKey) {
        (self.sender_unread, self.sender_read)
    }

    /// Messages written by the peer, both read states.
    pub fn incoming(&self) -> (ChatStateKey, ChatStateKey) {
        (self.recipient_unread, self.recipient_read)
    }

    pub fn all(&self) -> [ChatStateKey; 4] {
        [
            self.sender_unread,
            self.sender_read,
            self.recipient_unread,
            self.recipient_read,
        ]
    }

    pub fn contains(&self, key: &ChatStateKey) -> bool {
        self.all().contains(key)
    }
}

/// Build the four keys addressing the conversation between `self_id` and
/// `peer_id`.
pub fn build_tokens(self_id: OwnerId, peer_id: OwnerId) -> ConversationKeys {
    ConversationKeys {
        sender_unread: ChatStateKey::new(self_id, peer_id, ReadState::Unread),
        sender_read: ChatStateKey::new(self_id, peer_id, ReadState::Read),
        recipient_unread: ChatStateKey::new(peer_id, self_id, ReadState::Unread),
        recipient_read: ChatStateKey::new(peer_id, self_id, ReadState::Read),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_build_tokens_wire_form() {
        let keys = build_tokens(OwnerId(3), OwnerId(8));
        assert_eq!(keys.sender_unread.to_string(), "3;8;unread");
        assert_eq!(keys.sender_read.to_string(), "3;8;read");
        assert_eq!(keys.recipient_unread.to_string(), "8;3;unread");
        assert_eq!(keys.recipient_read.to_string(), "8;3;read");
    }

    #[test]
    fn test_tokens_symmetric_between_parties() {
        let a = build_tokens(OwnerId(3), OwnerId(8));
        let b = build_tokens(OwnerId(8), OwnerId(3));

        let set_a: HashSet<_> = a.all().into_iter().collect();
        let set_b: HashSet<_> = b.all().into_iter().collect();
        assert_eq!(set_a, set_b);
        assert_eq!(a.outgoing(), b.incoming());
        assert_eq!(a.incoming(), b.outgoing());
    }

    #[test]
    fn test_parse_round_trip_and_errors() {
        let key: ChatStateKey = "12;40;unread".parse().unwrap();
        assert_eq!(key.sender, OwnerId(12));
        assert_eq!(key.recipient, OwnerId(40));
        assert!(key.is_unread());
        assert_eq!(key.mark_read().to_string(), "12;40;read");

        assert_eq!(
            "12;40".parse::<ChatStateKey>(),
            Err(KeyError::SegmentCount(2))
        );
        assert!(matches!(
            "x;40;read".parse::<ChatStateKey>(),
            Err(KeyError::InvalidOwnerId(_))
        ));
        assert!(matches!(
            "1;2;seen".parse::<ChatStateKey>(),
            Err(KeyError::UnknownReadState(_))
        ));
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let key = ChatStateKey::new(OwnerId(1), OwnerId(2), ReadState::Read);
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""1;2;read""#);
        let back: ChatStateKey = serde_json::from_str(r#""1;2;read""#).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<ChatStateKey>(r#""1;2""#).is_err());
    }
}
