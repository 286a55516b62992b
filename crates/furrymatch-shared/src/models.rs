//! Backend records as they travel over the wire.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names so it maps one-to-one onto the REST payloads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::ChatStateKey;
use crate::negotiation::Negotiation;
use crate::types::{
    ContractId, EntityRef, LikeId, MatchId, MessageId, OwnerId, PetId, PhotoId,
};

// ---------------------------------------------------------------------------
// Owner / Pet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: OwnerId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Owner {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => format!("owner #{}", self.id),
        }
    }
}

/// A listed animal. Identity is immutable; the remaining attributes are
/// whatever the owner last saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: PetId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pet_type: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub pedigree: Option<bool>,
    #[serde(default)]
    pub owner: Option<Owner>,
}

impl Pet {
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner.as_ref().map(|o| o.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: PhotoId,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub pet: Option<EntityRef<PetId>>,
}

// ---------------------------------------------------------------------------
// Like / Match
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LikeState {
    Like,
    Dislike,
}

/// Directional preference edge from `first_pet` (actor) to `second_pet`
/// (target). Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: LikeId,
    pub like_state: LikeState,
    pub first_pet: EntityRef<PetId>,
    pub second_pet: EntityRef<PetId>,
}

impl Like {
    pub fn actor(&self) -> PetId {
        self.first_pet.id
    }

    pub fn target(&self) -> PetId {
        self.second_pet.id
    }

    /// The pet on this edge that is not `current`, if `current` is on it.
    pub fn opposite_of(&self, current: PetId) -> Option<PetId> {
        if self.actor() == current && self.target() != current {
            Some(self.target())
        } else if self.target() == current && self.actor() != current {
            Some(self.actor())
        } else {
            None
        }
    }
}

/// Mutual-interest relationship materialised from two reciprocal likes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    #[serde(default)]
    pub notify_match: Option<bool>,
    #[serde(default)]
    pub date_match: Option<NaiveDate>,
    #[serde(default)]
    pub contract: Option<Contract>,
    #[serde(default)]
    pub first_liked: Option<EntityRef<LikeId>>,
    #[serde(default)]
    pub second_liked: Option<EntityRef<LikeId>>,
}

/// One row of the matched-pets query: the match plus both pets on its
/// like edge, in backend order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "(Match, Pet, Pet)", into = "(Match, Pet, Pet)")]
pub struct MatchedPair {
    pub matched: Match,
    pub first_pet: Pet,
    pub second_pet: Pet,
}

impl MatchedPair {
    /// Split into (current, opposing) if `current` is one of the two pets.
    pub fn sides(&self, current: PetId) -> Option<(&Pet, &Pet)> {
        if self.first_pet.id == current {
            Some((&self.first_pet, &self.second_pet))
        } else if self.second_pet.id == current {
            Some((&self.second_pet, &self.first_pet))
        } else {
            None
        }
    }
}

impl From<(Match, Pet, Pet)> for MatchedPair {
    fn from((matched, first_pet, second_pet): (Match, Pet, Pet)) -> Self {
        Self {
            matched,
            first_pet,
            second_pet,
        }
    }
}

impl From<MatchedPair> for (Match, Pet, Pet) {
    fn from(pair: MatchedPair) -> Self {
        (pair.matched, pair.first_pet, pair.second_pet)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Message timestamps. The backend stores local date-times and sends them
/// without an offset (`2023-05-02T10:00:00.123`); those are read as UTC.
/// RFC 3339 strings with an offset are accepted as well.
mod wire_time {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        LOCAL_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    fn invalid<E: de::Error>(raw: &str) -> E {
        E::custom(format!("invalid timestamp {raw:?}"))
    }

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.naive_utc().format(LOCAL_FORMATS[0]))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| invalid(&raw))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(t: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => super::serialize(t, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| parse(&raw).ok_or_else(|| invalid(&raw)))
                .transpose()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub message: String,
    #[serde(with = "wire_time")]
    pub date_chat: DateTime<Utc>,
    pub state_chat: ChatStateKey,
    #[serde(default, rename = "match")]
    pub match_ref: Option<EntityRef<MatchId>>,
}

impl ChatMessage {
    pub fn match_id(&self) -> Option<MatchId> {
        self.match_ref.map(|m| m.id)
    }
}

/// Outgoing message before the backend assigns an id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewChatMessage {
    pub id: Option<MessageId>,
    pub message: String,
    #[serde(default, with = "wire_time::option")]
    pub date_chat: Option<DateTime<Utc>>,
    pub state_chat: ChatStateKey,
    #[serde(rename = "match")]
    pub match_ref: EntityRef<MatchId>,
}

impl NewChatMessage {
    pub fn new(message: impl Into<String>, key: ChatStateKey, match_id: MatchId) -> Self {
        Self {
            id: None,
            message: message.into(),
            date_chat: None,
            state_chat: key,
            match_ref: EntityRef::new(match_id),
        }
    }
}

/// A conversation partner as listed by the backend: the opposing owner,
/// the match the thread belongs to, and the newest message in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatPartner {
    pub owner: Owner,
    pub match_id: MatchId,
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Transfer contract attached to a match. Negotiation state lives only in
/// the packed `other_notes` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: ContractId,
    #[serde(default)]
    pub date_contract: Option<NaiveDate>,
    #[serde(default)]
    pub other_notes: Option<String>,
}

impl Contract {
    /// Decode the packed notes. `None` for absent or malformed notes.
    pub fn negotiation(&self) -> Option<Negotiation> {
        self.other_notes.as_deref().and_then(Negotiation::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_pair_from_json_tuple() {
        let json = r#"[
            {"id": 11, "notifyMatch": true, "dateMatch": "2023-05-02", "contract": null,
             "firstLiked": {"id": 1}, "secondLiked": {"id": 2}},
            {"id": 5, "name": "Luna", "owner": {"id": 42}},
            {"id": 9, "name": "Milo", "owner": {"id": 7}}
        ]"#;
        let pair: MatchedPair = serde_json::from_str(json).unwrap();
        assert_eq!(pair.matched.id, MatchId(11));

        let (current, other) = pair.sides(PetId(9)).unwrap();
        assert_eq!(current.id, PetId(9));
        assert_eq!(other.owner_id(), Some(OwnerId(42)));
        assert!(pair.sides(PetId(1)).is_none());
    }

    #[test]
    fn test_chat_message_wire_names() {
        let json = r#"{
            "id": 3, "message": "hola", "dateChat": "2023-05-02T10:00:00.123",
            "stateChat": "4;6;unread", "match": {"id": 11}
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.match_id(), Some(MatchId(11)));
        assert_eq!(msg.state_chat.sender, OwnerId(4));

        let out = NewChatMessage::new("hi", msg.state_chat, MatchId(11));
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["stateChat"], "4;6;unread");
        assert_eq!(value["match"]["id"], 11);
        assert!(value["id"].is_null());
        assert!(value["dateChat"].is_null());
    }

    #[test]
    fn test_chat_timestamps_without_offset() {
        let json = r#"{"id":3,"message":"hola","dateChat":"2023-05-02T10:00:00.123","stateChat":"4;6;unread","match":{"id":11}}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        let expected = NaiveDate::from_ymd_opt(2023, 5, 2)
            .unwrap()
            .and_hms_milli_opt(10, 0, 0, 123)
            .unwrap();
        assert_eq!(msg.date_chat.naive_utc(), expected);
        assert_eq!(
            serde_json::to_value(&msg).unwrap()["dateChat"],
            "2023-05-02T10:00:00.123"
        );

        for (raw, secs) in [
            ("2023-05-02T10:00:07", 7),
            ("2023-05-02T10:00", 0),
            ("2023-05-02T10:00:07Z", 7),
            ("2023-05-02T12:00:07+02:00", 7),
        ] {
            let json = format!(
                r#"{{"id":1,"message":"m","dateChat":"{raw}","stateChat":"4;6;read"}}"#
            );
            let msg: ChatMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(
                msg.date_chat.naive_utc(),
                NaiveDate::from_ymd_opt(2023, 5, 2)
                    .unwrap()
                    .and_hms_opt(10, 0, secs)
                    .unwrap(),
                "{raw}"
            );
        }

        let bad = r#"{"id":1,"message":"m","dateChat":"yesterday","stateChat":"4;6;read"}"#;
        assert!(serde_json::from_str::<ChatMessage>(bad).is_err());
    }

    #[test]
    fn test_like_opposite_of() {
        let like = Like {
            id: LikeId(1),
            like_state: LikeState::Like,
            first_pet: EntityRef::new(PetId(5)),
            second_pet: EntityRef::new(PetId(9)),
        };
        assert_eq!(like.opposite_of(PetId(5)), Some(PetId(9)));
        assert_eq!(like.opposite_of(PetId(9)), Some(PetId(5)));
        assert_eq!(like.opposite_of(PetId(3)), None);
    }
}
