//! Display-ready lists derived from a user's matches.
//!
//! All three rosters resolve "the other side" of each match and fan out the
//! per-pet lookups concurrently, then join. A failed or empty leg only
//! blanks its own field: the row itself is always kept.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use furrymatch_shared::models::{ChatPartner, Contract, Match, MatchedPair, Owner, Pet, Photo};
use furrymatch_shared::negotiation::{classify, ContractStatus};
use furrymatch_shared::types::{MatchId, MessageId, OwnerId, PetId};

use crate::backend::Backend;
use crate::error::Result;
use crate::identity::IdentityResolver;

/// One opposing pet in the match roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub pet_id: PetId,
    pub match_id: MatchId,
    /// `None` when the pet record could not be loaded.
    pub pet: Option<Pet>,
    pub photo: Option<Photo>,
}

/// One opposing pet in the contract roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEntry {
    pub pet: Pet,
    /// Owner of the opposing pet.
    pub owner_id: Option<OwnerId>,
    pub match_id: MatchId,
    pub contract: Option<Contract>,
    pub status: ContractStatus,
    pub photo: Option<Photo>,
}

#[derive(Debug, Clone, Default)]
pub struct ContractRoster {
    /// Owner of the active pet; contracts are classified from this side.
    pub viewer: Option<OwnerId>,
    pub entries: Vec<ContractEntry>,
}

impl ContractRoster {
    pub fn entry_for(&self, pet: PetId) -> Option<&ContractEntry> {
        self.entries.iter().find(|e| e.pet.id == pet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    pub partner: Owner,
    pub match_id: MatchId,
    /// Text of the newest message in the thread.
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    pub rows: Vec<ConversationRow>,
}

impl ConversationList {
    pub fn row(&self, match_id: MatchId) -> Option<&ConversationRow> {
        self.rows.iter().find(|r| r.match_id == match_id)
    }

    /// Update a row's preview after a local send, without refetching.
    pub fn apply_preview(&mut self, match_id: MatchId, text: &str) -> bool {
        match self.rows.iter_mut().find(|r| r.match_id == match_id) {
            Some(row) => {
                row.preview = Some(text.to_string());
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, match_id: MatchId) {
        self.rows.retain(|r| r.match_id != match_id);
    }
}

/// Owner of the active pet, taken from whichever row contains it.
pub fn current_owner_id(pairs: &[MatchedPair], current: PetId) -> Option<OwnerId> {
    pairs
        .iter()
        .filter_map(|p| p.sides(current))
        .find_map(|(me, _)| me.owner_id())
}

pub struct RosterBuilder {
    backend: Arc<dyn Backend>,
    identity: Arc<IdentityResolver>,
}

impl RosterBuilder {
    pub fn new(backend: Arc<dyn Backend>, identity: Arc<IdentityResolver>) -> Self {
        Self { backend, identity }
    }

    async fn first_photo(&self, pet: PetId) -> Option<Photo> {
        match self.backend.find_photos_by_pet(pet).await {
            Ok(photos) => photos.into_iter().next(),
            Err(e) => {
                warn!(pet_id = %pet, error = %e, "Photo lookup failed");
                None
            }
        }
    }

    async fn photos_for(&self, pets: &[PetId]) -> Vec<Option<Photo>> {
        join_all(pets.iter().map(|&pet| self.first_photo(pet))).await
    }

    /// Load all matches and build the roster for the active pet.
    pub async fn load_match_roster(&self) -> Result<Vec<RosterEntry>> {
        let matches = self.backend.list_matches().await?;
        Ok(self.build_match_roster(&matches).await)
    }

    /// Resolve the opposing pet of each match through its first like edge.
    /// One entry per distinct opposing pet.
    pub async fn build_match_roster(&self, matches: &[Match]) -> Vec<RosterEntry> {
        let Some(current) = self.identity.resolve().await else {
            return Vec::new();
        };

        let linked: Vec<_> = matches
            .iter()
            .filter_map(|m| m.first_liked.map(|like| (m.id, like.id)))
            .collect();

        let edges = join_all(linked.iter().map(|&(match_id, like_id)| async move {
            match self.backend.find_like(like_id).await {
                Ok(Some(like)) => Some((match_id, like)),
                Ok(None) => {
                    warn!(match_id = %match_id, like_id = %like_id, "Like edge not found");
                    None
                }
                Err(e) => {
                    warn!(match_id = %match_id, error = %e, "Like edge lookup failed");
                    None
                }
            }
        }))
        .await;

        let mut seen = HashSet::new();
        let opposing: Vec<(PetId, MatchId)> = edges
            .into_iter()
            .flatten()
            .filter_map(|(match_id, like)| like.opposite_of(current).map(|pet| (pet, match_id)))
            .filter(|(pet, _)| seen.insert(*pet))
            .collect();

        let pet_ids: Vec<PetId> = opposing.iter().map(|(pet, _)| *pet).collect();
        let (pets, photos) = futures::join!(
            join_all(pet_ids.iter().map(|&id| async move {
                match self.backend.find_pet(id).await {
                    Ok(pet) => pet,
                    Err(e) => {
                        warn!(pet_id = %id, error = %e, "Pet lookup failed");
                        None
                    }
                }
            })),
            self.photos_for(&pet_ids),
        );

        let roster: Vec<RosterEntry> = opposing
            .into_iter()
            .zip(pets)
            .zip(photos)
            .map(|(((pet_id, match_id), pet), photo)| RosterEntry {
                pet_id,
                match_id,
                pet,
                photo,
            })
            .collect();
        info!(current = %current, entries = roster.len(), "Match roster built");
        roster
    }

    /// Matched pets with their contract state, from the active pet's side.
    pub async fn build_contract_roster(&self) -> Result<ContractRoster> {
        let Some(current) = self.identity.resolve().await else {
            return Ok(ContractRoster::default());
        };

        let pairs = self.backend.get_matched_pets_and_contracts(current).await?;
        let viewer = current_owner_id(&pairs, current);
        if viewer.is_none() && !pairs.is_empty() {
            warn!(current = %current, "Active pet has no owner; contracts shown as idle");
        }

        let mut seen = HashSet::new();
        let mut entries: Vec<ContractEntry> = Vec::new();
        for pair in &pairs {
            let Some((_, other)) = pair.sides(current) else {
                debug!(match_id = %pair.matched.id, "Row does not contain the active pet");
                continue;
            };
            if !seen.insert(other.id) {
                continue;
            }
            let contract = pair.matched.contract.clone();
            let status = match viewer {
                Some(viewer) => classify(contract.as_ref(), viewer),
                None => ContractStatus::Idle,
            };
            entries.push(ContractEntry {
                pet: other.clone(),
                owner_id: other.owner_id(),
                match_id: pair.matched.id,
                contract,
                status,
                photo: None,
            });
        }

        let pet_ids: Vec<PetId> = entries.iter().map(|e| e.pet.id).collect();
        for (entry, photo) in entries.iter_mut().zip(self.photos_for(&pet_ids).await) {
            entry.photo = photo;
        }

        info!(current = %current, entries = entries.len(), "Contract roster built");
        Ok(ContractRoster { viewer, entries })
    }

    /// One row per conversation partner, each with its latest message text.
    pub async fn build_conversation_list(&self) -> Result<ConversationList> {
        let partners = self.backend.list_conversations().await?;

        let mut seen = HashSet::new();
        let partners: Vec<ChatPartner> = partners
            .into_iter()
            .filter(|p| seen.insert(p.owner.id))
            .collect();

        let previews = join_all(
            partners
                .iter()
                .map(|p| self.preview(p.match_id, p.last_message_id)),
        )
        .await;

        let rows: Vec<ConversationRow> = partners
            .into_iter()
            .zip(previews)
            .map(|(p, preview)| ConversationRow {
                partner: p.owner,
                match_id: p.match_id,
                preview,
            })
            .collect();
        debug!(rows = rows.len(), "Conversation list built");
        Ok(ConversationList { rows })
    }

    async fn preview(&self, match_id: MatchId, last: Option<MessageId>) -> Option<String> {
        let id = last?;
        match self.backend.find_message(id).await {
            Ok(msg) => msg.map(|m| m.message),
            Err(e) => {
                warn!(match_id = %match_id, error = %e, "Preview lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::backend::memory::{pet, InMemoryBackend};
    use crate::state::{shared, SessionState};
    use furrymatch_shared::conversation::{ChatStateKey, ReadState};
    use furrymatch_shared::models::{ChatMessage, LikeState};
    use furrymatch_shared::types::EntityRef;

    /// Luna (5, owner 42) matched with Milo (9, owner 7) and Kira (12, owner 13).
    async fn matched_backend() -> (Arc<InMemoryBackend>, RosterBuilder) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_pet(pet(5, "Luna", 42)).unwrap();
        backend.add_pet(pet(9, "Milo", 7)).unwrap();
        backend.add_pet(pet(12, "Kira", 13)).unwrap();
        backend.add_photo(PetId(9), "milo-1.jpg").unwrap();
        backend.add_photo(PetId(9), "milo-2.jpg").unwrap();
        backend.add_photo(PetId(12), "kira.jpg").unwrap();

        for other in [9, 12] {
            backend
                .record_preference(LikeState::Like, PetId(other), PetId(5))
                .await
                .unwrap();
            backend
                .record_preference(LikeState::Like, PetId(5), PetId(other))
                .await
                .unwrap();
        }

        backend.set_session(OwnerId(42), Some(PetId(5))).unwrap();
        let identity = Arc::new(IdentityResolver::new(
            backend.clone(),
            shared(SessionState::new()),
        ));
        let builder = RosterBuilder::new(backend.clone(), identity);
        (backend, builder)
    }

    #[tokio::test]
    async fn test_match_roster_resolves_opposing_pets() {
        let (_, builder) = matched_backend().await;
        let roster = builder.load_match_roster().await.unwrap();

        let ids: Vec<PetId> = roster.iter().map(|e| e.pet_id).collect();
        assert_eq!(ids, vec![PetId(9), PetId(12)]);
        assert_eq!(
            roster[0].photo.as_ref().and_then(|p| p.photo_url.as_deref()),
            Some("milo-1.jpg")
        );
        assert!(roster.iter().all(|e| e.pet.is_some()));
    }

    #[tokio::test]
    async fn test_match_roster_dedupes_by_pet() {
        let (backend, builder) = matched_backend().await;
        let mut matches = backend.list_matches().await.unwrap();
        matches.extend(matches.clone());
        let roster = builder.build_match_roster(&matches).await;
        assert_eq!(roster.len(), 2);
    }

    #[tokio::test]
    async fn test_photo_failure_keeps_entry() {
        let (backend, builder) = matched_backend().await;
        backend.fail_photos_for(PetId(9)).unwrap();

        let roster = builder.load_match_roster().await.unwrap();
        assert_eq!(roster.len(), 2);
        let milo = roster.iter().find(|e| e.pet_id == PetId(9)).unwrap();
        assert!(milo.photo.is_none());
        assert!(milo.pet.is_some());
        let kira = roster.iter().find(|e| e.pet_id == PetId(12)).unwrap();
        assert!(kira.photo.is_some());
    }

    #[tokio::test]
    async fn test_failed_pet_lookup_keeps_row() {
        let (backend, builder) = matched_backend().await;
        backend.set_failing("find_pet", true).unwrap();
        let roster = builder.load_match_roster().await.unwrap();
        assert_eq!(roster.len(), 2);
        assert!(roster.iter().all(|e| e.pet.is_none() && e.photo.is_some()));
    }

    #[tokio::test]
    async fn test_no_active_pet_gives_empty_roster() {
        let (backend, _) = matched_backend().await;
        backend.set_session(OwnerId(42), None).unwrap();
        let identity = Arc::new(IdentityResolver::new(
            backend.clone(),
            shared(SessionState::new()),
        ));
        let builder = RosterBuilder::new(backend.clone(), identity);
        assert!(builder.load_match_roster().await.unwrap().is_empty());
        assert!(builder
            .build_contract_roster()
            .await
            .unwrap()
            .entries
            .is_empty());
    }

    #[tokio::test]
    async fn test_contract_roster_classifies_per_viewer() {
        let (backend, builder) = matched_backend().await;
        let matches = backend.matches();
        let with_milo = matches[0].id;
        let with_kira = matches[1].id;
        backend
            .attach_contract(with_milo, Some("negotiating;42;1"))
            .unwrap();
        backend
            .attach_contract(with_kira, Some("final;13;2"))
            .unwrap();

        let roster = builder.build_contract_roster().await.unwrap();
        assert_eq!(roster.viewer, Some(OwnerId(42)));

        let milo = roster.entry_for(PetId(9)).unwrap();
        assert_eq!(milo.status, ContractStatus::CreatedByMe);
        assert_eq!(milo.owner_id, Some(OwnerId(7)));
        assert!(milo.photo.is_some());

        let kira = roster.entry_for(PetId(12)).unwrap();
        assert_eq!(kira.status, ContractStatus::SentByOther);
    }

    #[tokio::test]
    async fn test_conversation_list_previews_latest_message() {
        let (backend, builder) = matched_backend().await;
        let with_milo = backend.matches()[0].id;
        let key = ChatStateKey::new(OwnerId(7), OwnerId(42), ReadState::Unread);
        for (id, secs, text) in [(100, 10, "first"), (101, 20, "latest")] {
            backend
                .insert_message(ChatMessage {
                    id: MessageId(id),
                    message: text.into(),
                    date_chat: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
                    state_chat: key,
                    match_ref: Some(EntityRef::new(with_milo)),
                })
                .unwrap();
        }

        let mut list = builder.build_conversation_list().await.unwrap();
        assert_eq!(list.rows.len(), 2);
        assert_eq!(
            list.row(with_milo).and_then(|r| r.preview.as_deref()),
            Some("latest")
        );

        assert!(list.apply_preview(with_milo, "just sent"));
        assert_eq!(
            list.row(with_milo).and_then(|r| r.preview.as_deref()),
            Some("just sent")
        );
    }

    #[tokio::test]
    async fn test_failed_preview_leaves_row() {
        let (backend, builder) = matched_backend().await;
        let with_milo = backend.matches()[0].id;
        backend
            .insert_message(ChatMessage {
                id: MessageId(100),
                message: "hola".into(),
                date_chat: Utc::now(),
                state_chat: ChatStateKey::new(OwnerId(7), OwnerId(42), ReadState::Read),
                match_ref: Some(EntityRef::new(with_milo)),
            })
            .unwrap();
        backend.set_failing("find_message", true).unwrap();

        let list = builder.build_conversation_list().await.unwrap();
        assert_eq!(list.rows.len(), 2);
        assert!(list.rows.iter().all(|r| r.preview.is_none()));
    }
}
