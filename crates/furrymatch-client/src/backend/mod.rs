//! The backend collaborator.
//!
//! The engine never owns persistent state: every record lives behind a
//! [`Backend`]. [`rest::RestBackend`] talks to the REST API;
//! [`memory::InMemoryBackend`] keeps everything in process and applies the
//! same server-side rules, for tests and offline use.

pub mod memory;
pub mod rest;

use async_trait::async_trait;

use furrymatch_shared::conversation::ChatStateKey;
use furrymatch_shared::models::{
    ChatMessage, ChatPartner, Like, LikeState, Match, MatchedPair, Pet, Photo,
};
use furrymatch_shared::types::{ContractId, LikeId, MatchId, MessageId, OwnerId, PetId};

use crate::error::Result;

pub use memory::InMemoryBackend;
pub use rest::RestBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// The pet the signed-in user operates as, if any.
    async fn resolve_current_pet_id(&self) -> Result<Option<PetId>>;

    /// Persist a like/dislike edge `first -> second`. For likes the backend
    /// checks the reverse edge and returns the match id when both pets like
    /// each other.
    async fn record_preference(
        &self,
        state: LikeState,
        first: PetId,
        second: PetId,
    ) -> Result<Option<MatchId>>;

    /// Messages in either of two buckets.
    async fn get_thread_messages(
        &self,
        first: ChatStateKey,
        second: ChatStateKey,
    ) -> Result<Vec<ChatMessage>>;

    async fn send_message(
        &self,
        text: &str,
        key: ChatStateKey,
        match_id: MatchId,
    ) -> Result<ChatMessage>;

    /// Flip every unread message of `match_id` that `peer` sent to `reader`.
    async fn mark_conversation_read(
        &self,
        match_id: MatchId,
        reader: OwnerId,
        peer: OwnerId,
    ) -> Result<()>;

    /// Unread messages addressed to the signed-in user, across all matches.
    async fn get_unread_for_current_user(&self) -> Result<Vec<ChatMessage>>;

    async fn get_matched_pets_and_contracts(&self, current: PetId) -> Result<Vec<MatchedPair>>;

    async fn find_photos_by_pet(&self, pet: PetId) -> Result<Vec<Photo>>;

    /// Remember which match/owner/pet the next contract form is for.
    async fn save_contract_link(&self, match_id: MatchId, owner: OwnerId, pet: PetId)
        -> Result<()>;

    async fn send_contract_email(&self, contract: ContractId) -> Result<()>;

    async fn find_like(&self, id: LikeId) -> Result<Option<Like>>;

    async fn find_pet(&self, id: PetId) -> Result<Option<Pet>>;

    async fn list_matches(&self) -> Result<Vec<Match>>;

    /// Conversation partners of the signed-in user.
    async fn list_conversations(&self) -> Result<Vec<ChatPartner>>;

    async fn find_message(&self, id: MessageId) -> Result<Option<ChatMessage>>;

    /// Remove every message of a match.
    async fn delete_conversation(&self, match_id: MatchId) -> Result<()>;

    /// Pets matching the signed-in user's saved search criteria.
    async fn search_candidates(&self) -> Result<Vec<Pet>>;
}
