//! In-process backend.
//!
//! Applies the same rules as the REST backend (reciprocal-like check, unread
//! buckets addressed to the signed-in owner, match-scoped read flips) on
//! plain collections. Individual operations can be made to fail and every
//! call is counted, so engine tests can assert what went over the "wire".

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use furrymatch_shared::conversation::ChatStateKey;
use furrymatch_shared::models::{
    ChatMessage, ChatPartner, Contract, Like, LikeState, Match, MatchedPair, Pet, Photo,
};
use furrymatch_shared::types::{
    ContractId, EntityRef, LikeId, MatchId, MessageId, OwnerId, PetId,
};

use super::Backend;
use crate::error::{ClientError, Result};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
    current_owner: Option<OwnerId>,
    current_pet: Option<PetId>,
    pets: BTreeMap<PetId, Pet>,
    photos: Vec<Photo>,
    likes: Vec<Like>,
    matches: BTreeMap<MatchId, Match>,
    messages: Vec<ChatMessage>,
    contract_links: Vec<(MatchId, OwnerId, PetId)>,
    read_marks: Vec<(MatchId, OwnerId, OwnerId)>,
    sent_contracts: Vec<ContractId>,
    calls: HashMap<&'static str, usize>,
    failing: HashSet<&'static str>,
    failing_photos: HashSet<PetId>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing so messages sent back-to-back keep their order.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::milliseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn like(&self, id: LikeId) -> Option<&Like> {
        self.likes.iter().find(|l| l.id == id)
    }

    /// Most recent edge `actor -> target`.
    fn latest_edge(&self, actor: PetId, target: PetId) -> Option<&Like> {
        self.likes
            .iter()
            .rev()
            .find(|l| l.actor() == actor && l.target() == target)
    }

    fn match_between(&self, a: PetId, b: PetId) -> Option<MatchId> {
        self.matches.values().find_map(|m| {
            let pets: Vec<(PetId, PetId)> = [m.first_liked, m.second_liked]
                .into_iter()
                .flatten()
                .filter_map(|r| self.like(r.id))
                .map(|l| (l.actor(), l.target()))
                .collect();
            pets.iter()
                .any(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
                .then_some(m.id)
        })
    }

    /// The two pets a match connects.
    fn match_pets(&self, m: &Match) -> Option<(PetId, PetId)> {
        let edge = m.first_liked.and_then(|r| self.like(r.id))?;
        Some((edge.actor(), edge.target()))
    }

    fn owner_of(&self, pet: PetId) -> Option<OwnerId> {
        self.pets.get(&pet).and_then(Pet::owner_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: Mutex<Store>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> Result<MutexGuard<'_, Store>> {
        self.store.lock().map_err(|_| ClientError::Lock)
    }

    /// Count the call and fail it if the operation was marked failing.
    fn enter(&self, op: &'static str) -> Result<MutexGuard<'_, Store>> {
        let mut store = self.store()?;
        *store.calls.entry(op).or_default() += 1;
        if store.failing.contains(op) {
            debug!(op, "Injected backend failure");
            return Err(ClientError::Status {
                status: 503,
                url: format!("memory://{op}"),
            });
        }
        Ok(store)
    }

    // -- Seeding and inspection ------------------------------------------

    /// Sign in as `owner`, operating as `pet`.
    pub fn set_session(&self, owner: OwnerId, pet: Option<PetId>) -> Result<()> {
        let mut store = self.store()?;
        store.current_owner = Some(owner);
        store.current_pet = pet;
        Ok(())
    }

    pub fn add_pet(&self, pet: Pet) -> Result<()> {
        self.store()?.pets.insert(pet.id, pet);
        Ok(())
    }

    pub fn add_photo(&self, pet: PetId, url: &str) -> Result<()> {
        let mut store = self.store()?;
        let id = store.next_id();
        store.photos.push(Photo {
            id: id.into(),
            photo_url: Some(url.to_string()),
            pet: Some(EntityRef::new(pet)),
        });
        Ok(())
    }

    pub fn attach_contract(&self, match_id: MatchId, notes: Option<&str>) -> Result<ContractId> {
        let mut store = self.store()?;
        let id = ContractId(store.next_id());
        let m = store
            .matches
            .get_mut(&match_id)
            .ok_or(ClientError::NotFound("match"))?;
        m.contract = Some(Contract {
            id,
            date_contract: Some(Utc::now().date_naive()),
            other_notes: notes.map(str::to_string),
        });
        Ok(id)
    }

    /// Store a message as-is, keeping its id and timestamp.
    pub fn insert_message(&self, message: ChatMessage) -> Result<()> {
        let mut store = self.store()?;
        store.next_id = store.next_id.max(message.id.get());
        store.messages.push(message);
        Ok(())
    }

    pub fn set_failing(&self, op: &'static str, failing: bool) -> Result<()> {
        let mut store = self.store()?;
        if failing {
            store.failing.insert(op);
        } else {
            store.failing.remove(op);
        }
        Ok(())
    }

    /// Make photo lookups fail for one pet only.
    pub fn fail_photos_for(&self, pet: PetId) -> Result<()> {
        self.store()?.failing_photos.insert(pet);
        Ok(())
    }

    pub fn calls(&self, op: &str) -> usize {
        self.store()
            .map(|s| s.calls.get(op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn likes(&self) -> Vec<Like> {
        self.store().map(|s| s.likes.clone()).unwrap_or_default()
    }

    pub fn matches(&self) -> Vec<Match> {
        self.store()
            .map(|s| s.matches.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.store().map(|s| s.messages.clone()).unwrap_or_default()
    }

    pub fn contract_links(&self) -> Vec<(MatchId, OwnerId, PetId)> {
        self.store()
            .map(|s| s.contract_links.clone())
            .unwrap_or_default()
    }

    /// Every `(match, reader, peer)` passed to `mark_conversation_read`.
    pub fn read_marks(&self) -> Vec<(MatchId, OwnerId, OwnerId)> {
        self.store()
            .map(|s| s.read_marks.clone())
            .unwrap_or_default()
    }

    pub fn sent_contracts(&self) -> Vec<ContractId> {
        self.store()
            .map(|s| s.sent_contracts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn resolve_current_pet_id(&self) -> Result<Option<PetId>> {
        Ok(self.enter("resolve_current_pet_id")?.current_pet)
    }

    async fn record_preference(
        &self,
        state: LikeState,
        first: PetId,
        second: PetId,
    ) -> Result<Option<MatchId>> {
        let mut store = self.enter("record_preference")?;
        let like = Like {
            id: LikeId(store.next_id()),
            like_state: state,
            first_pet: EntityRef::new(first),
            second_pet: EntityRef::new(second),
        };
        let like_id = like.id;
        store.likes.push(like);

        if state == LikeState::Dislike {
            return Ok(None);
        }

        let reverse = match store.latest_edge(second, first) {
            Some(edge) if edge.like_state == LikeState::Like => edge.id,
            _ => return Ok(None),
        };

        if let Some(existing) = store.match_between(first, second) {
            debug!(match_id = %existing, "Pair already matched");
            return Ok(Some(existing));
        }

        let id = MatchId(store.next_id());
        let today = store.now().date_naive();
        store.matches.insert(
            id,
            Match {
                id,
                notify_match: Some(true),
                date_match: Some(today),
                contract: None,
                first_liked: Some(EntityRef::new(like_id)),
                second_liked: Some(EntityRef::new(reverse)),
            },
        );
        debug!(match_id = %id, first = %first, second = %second, "Match created");
        Ok(Some(id))
    }

    async fn get_thread_messages(
        &self,
        first: ChatStateKey,
        second: ChatStateKey,
    ) -> Result<Vec<ChatMessage>> {
        let store = self.enter("get_thread_messages")?;
        Ok(store
            .messages
            .iter()
            .filter(|m| m.state_chat == first || m.state_chat == second)
            .cloned()
            .collect())
    }

    async fn send_message(
        &self,
        text: &str,
        key: ChatStateKey,
        match_id: MatchId,
    ) -> Result<ChatMessage> {
        let mut store = self.enter("send_message")?;
        let message = ChatMessage {
            id: MessageId(store.next_id()),
            message: text.to_string(),
            date_chat: store.now(),
            state_chat: key,
            match_ref: Some(EntityRef::new(match_id)),
        };
        store.messages.push(message.clone());
        Ok(message)
    }

    async fn mark_conversation_read(
        &self,
        match_id: MatchId,
        reader: OwnerId,
        peer: OwnerId,
    ) -> Result<()> {
        let mut store = self.enter("mark_conversation_read")?;
        store.read_marks.push((match_id, reader, peer));
        for m in store.messages.iter_mut() {
            if m.match_id() == Some(match_id)
                && m.state_chat.recipient == reader
                && m.state_chat.is_unread()
            {
                m.state_chat = m.state_chat.mark_read();
            }
        }
        Ok(())
    }

    async fn get_unread_for_current_user(&self) -> Result<Vec<ChatMessage>> {
        let store = self.enter("get_unread_for_current_user")?;
        let Some(owner) = store.current_owner else {
            return Ok(Vec::new());
        };
        Ok(store
            .messages
            .iter()
            .filter(|m| m.state_chat.recipient == owner && m.state_chat.is_unread())
            .cloned()
            .collect())
    }

    async fn get_matched_pets_and_contracts(&self, current: PetId) -> Result<Vec<MatchedPair>> {
        let store = self.enter("get_matched_pets_and_contracts")?;
        let mut rows = Vec::new();
        for m in store.matches.values() {
            let edges = [m.first_liked, m.second_liked]
                .into_iter()
                .flatten()
                .filter_map(|r| store.like(r.id))
                .filter(|l| l.actor() == current);
            for edge in edges {
                if let (Some(a), Some(b)) =
                    (store.pets.get(&edge.actor()), store.pets.get(&edge.target()))
                {
                    rows.push(MatchedPair {
                        matched: m.clone(),
                        first_pet: a.clone(),
                        second_pet: b.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }

    async fn find_photos_by_pet(&self, pet: PetId) -> Result<Vec<Photo>> {
        let store = self.enter("find_photos_by_pet")?;
        if store.failing_photos.contains(&pet) {
            return Err(ClientError::Status {
                status: 500,
                url: format!("memory://find_photos_by_pet/{pet}"),
            });
        }
        Ok(store
            .photos
            .iter()
            .filter(|p| p.pet.map(|r| r.id) == Some(pet))
            .cloned()
            .collect())
    }

    async fn save_contract_link(
        &self,
        match_id: MatchId,
        owner: OwnerId,
        pet: PetId,
    ) -> Result<()> {
        self.enter("save_contract_link")?
            .contract_links
            .push((match_id, owner, pet));
        Ok(())
    }

    async fn send_contract_email(&self, contract: ContractId) -> Result<()> {
        let mut store = self.enter("send_contract_email")?;
        let sender = store.current_owner;
        let target = store
            .matches
            .values_mut()
            .filter_map(|m| m.contract.as_mut())
            .find(|c| c.id == contract)
            .ok_or(ClientError::NotFound("contract"))?;

        if let (Some(sender), Some(negotiation)) = (sender, target.negotiation()) {
            target.other_notes = Some(negotiation.sent_by(sender).encode());
        }
        store.sent_contracts.push(contract);
        Ok(())
    }

    async fn find_like(&self, id: LikeId) -> Result<Option<Like>> {
        Ok(self.enter("find_like")?.like(id).cloned())
    }

    async fn find_pet(&self, id: PetId) -> Result<Option<Pet>> {
        Ok(self.enter("find_pet")?.pets.get(&id).cloned())
    }

    async fn list_matches(&self) -> Result<Vec<Match>> {
        Ok(self.enter("list_matches")?.matches.values().cloned().collect())
    }

    async fn list_conversations(&self) -> Result<Vec<ChatPartner>> {
        let store = self.enter("list_conversations")?;
        let Some(owner) = store.current_owner else {
            return Ok(Vec::new());
        };

        let mut partners = Vec::new();
        for m in store.matches.values() {
            let Some((a, b)) = store.match_pets(m) else {
                continue;
            };
            let opposing = match (store.owner_of(a), store.owner_of(b)) {
                (Some(oa), Some(ob)) if ob == owner && oa != owner => a,
                (Some(oa), Some(ob)) if oa == owner && ob != owner => b,
                _ => continue,
            };
            let Some(partner) = store.pets.get(&opposing).and_then(|p| p.owner.clone()) else {
                continue;
            };
            let last_message_id = store
                .messages
                .iter()
                .filter(|msg| msg.match_id() == Some(m.id))
                .max_by_key(|msg| (msg.date_chat, msg.id))
                .map(|msg| msg.id);
            partners.push(ChatPartner {
                owner: partner,
                match_id: m.id,
                last_message_id,
            });
        }
        Ok(partners)
    }

    async fn find_message(&self, id: MessageId) -> Result<Option<ChatMessage>> {
        let store = self.enter("find_message")?;
        Ok(store.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn delete_conversation(&self, match_id: MatchId) -> Result<()> {
        self.enter("delete_conversation")?
            .messages
            .retain(|m| m.match_id() != Some(match_id));
        Ok(())
    }

    async fn search_candidates(&self) -> Result<Vec<Pet>> {
        let store = self.enter("search_candidates")?;
        let owner = store.current_owner;
        Ok(store
            .pets
            .values()
            .filter(|p| owner.is_none() || p.owner_id() != owner)
            .cloned()
            .collect())
    }
}

/// A pet with just an id, a name and an owner.
pub fn pet(id: i64, name: &str, owner: i64) -> Pet {
    Pet {
        id: PetId(id),
        name: Some(name.to_string()),
        pet_type: None,
        sex: None,
        trade_type: None,
        pedigree: None,
        owner: Some(furrymatch_shared::models::Owner {
            id: OwnerId(owner),
            first_name: None,
            last_name: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryBackend {
        let b = InMemoryBackend::new();
        b.add_pet(pet(5, "Luna", 42)).unwrap();
        b.add_pet(pet(9, "Milo", 7)).unwrap();
        b.add_pet(pet(12, "Kira", 13)).unwrap();
        b
    }

    #[tokio::test]
    async fn test_reciprocal_like_creates_match_once() {
        let b = backend();
        assert_eq!(
            b.record_preference(LikeState::Like, PetId(9), PetId(5))
                .await
                .unwrap(),
            None
        );
        let m = b
            .record_preference(LikeState::Like, PetId(5), PetId(9))
            .await
            .unwrap()
            .expect("match");

        // Swiping again on a matched pair returns the same match.
        let again = b
            .record_preference(LikeState::Like, PetId(9), PetId(5))
            .await
            .unwrap();
        assert_eq!(again, Some(m));
        assert_eq!(b.matches().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_reverse_edge_wins() {
        let b = backend();
        b.record_preference(LikeState::Like, PetId(9), PetId(5))
            .await
            .unwrap();
        b.record_preference(LikeState::Dislike, PetId(9), PetId(5))
            .await
            .unwrap();
        let res = b
            .record_preference(LikeState::Like, PetId(5), PetId(9))
            .await
            .unwrap();
        assert_eq!(res, None);
    }

    #[tokio::test]
    async fn test_failing_operation_is_counted() {
        let b = backend();
        b.set_failing("list_matches", true).unwrap();
        assert!(b.list_matches().await.unwrap_err().is_transport());
        assert_eq!(b.calls("list_matches"), 1);
        b.set_failing("list_matches", false).unwrap();
        assert!(b.list_matches().await.unwrap().is_empty());
    }
}
