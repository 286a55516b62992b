use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use furrymatch_shared::conversation::ChatStateKey;
use furrymatch_shared::models::{
    ChatMessage, ChatPartner, Like, LikeState, Match, MatchedPair, NewChatMessage, Pet, Photo,
};
use furrymatch_shared::types::{
    ContractId, EntityRef, LikeId, MatchId, MessageId, OwnerId, PetId,
};

use super::Backend;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Like edge as posted to the backend, before it has an id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewLike {
    id: Option<LikeId>,
    like_state: LikeState,
    first_pet: EntityRef<PetId>,
    second_pet: EntityRef<PetId>,
}

/// [`Backend`] over the FurryMatch REST API.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(path, "GET");
        let resp = self.send(self.request(Method::GET, path)).await?;
        Ok(resp.json::<T>().await?)
    }

    /// GET that maps 404 to `None`.
    async fn find_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get_json::<T>(path).await {
            Ok(v) => Ok(Some(v)),
            Err(ClientError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn no_content(&self, method: Method, path: &str) -> Result<()> {
        debug!(%method, path, "Request");
        self.send(self.request(method, path)).await?;
        Ok(())
    }
}

/// Some endpoints answer a bare `Long` or an empty body for "none".
fn parse_optional_id<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str::<Option<T>>(body)?)
}

/// The server flips the match's rows sent by `peer`; the reader is implied
/// by the session.
fn mark_read_path(match_id: MatchId, peer: OwnerId) -> String {
    format!("api/chats/update-state/{match_id}/{peer}")
}

/// Body of the contract-link endpoint: `matchId,ownerId-petId`.
fn contract_link_body(match_id: MatchId, owner: OwnerId, pet: PetId) -> String {
    format!("{match_id},{owner}-{pet}")
}

#[async_trait]
impl Backend for RestBackend {
    async fn resolve_current_pet_id(&self) -> Result<Option<PetId>> {
        let resp = self.send(self.request(Method::GET, "api/pets/current")).await?;
        parse_optional_id(&resp.text().await?)
    }

    async fn record_preference(
        &self,
        state: LikeState,
        first: PetId,
        second: PetId,
    ) -> Result<Option<MatchId>> {
        let body = NewLike {
            id: None,
            like_state: state,
            first_pet: EntityRef::new(first),
            second_pet: EntityRef::new(second),
        };
        let resp = self
            .send(self.request(Method::POST, "api/likees/is-match").json(&body))
            .await?;
        parse_optional_id(&resp.text().await?)
    }

    async fn get_thread_messages(
        &self,
        first: ChatStateKey,
        second: ChatStateKey,
    ) -> Result<Vec<ChatMessage>> {
        let req = self
            .request(Method::GET, "api/chats/state")
            .query(&[("state1", first.to_string()), ("state2", second.to_string())]);
        Ok(self.send(req).await?.json().await?)
    }

    async fn send_message(
        &self,
        text: &str,
        key: ChatStateKey,
        match_id: MatchId,
    ) -> Result<ChatMessage> {
        let body = NewChatMessage::new(text, key, match_id);
        let resp = self
            .send(self.request(Method::POST, "api/chats").json(&body))
            .await?;
        Ok(resp.json().await?)
    }

    async fn mark_conversation_read(
        &self,
        match_id: MatchId,
        _reader: OwnerId,
        peer: OwnerId,
    ) -> Result<()> {
        self.no_content(Method::PUT, &mark_read_path(match_id, peer))
            .await
    }

    async fn get_unread_for_current_user(&self) -> Result<Vec<ChatMessage>> {
        self.get_json("api/chats/unread").await
    }

    async fn get_matched_pets_and_contracts(&self, current: PetId) -> Result<Vec<MatchedPair>> {
        self.get_json(&format!("api/contracts/matched-pets-no-contract/{current}"))
            .await
    }

    async fn find_photos_by_pet(&self, pet: PetId) -> Result<Vec<Photo>> {
        self.get_json(&format!("api/photos/pet/{pet}")).await
    }

    async fn save_contract_link(
        &self,
        match_id: MatchId,
        owner: OwnerId,
        pet: PetId,
    ) -> Result<()> {
        let req = self
            .request(Method::POST, "api/contracts/match-pet")
            .body(contract_link_body(match_id, owner, pet));
        self.send(req).await?;
        Ok(())
    }

    async fn send_contract_email(&self, contract: ContractId) -> Result<()> {
        self.no_content(Method::GET, &format!("api/contracts/sendEmail/{contract}"))
            .await
    }

    async fn find_like(&self, id: LikeId) -> Result<Option<Like>> {
        self.find_json(&format!("api/likees/{id}")).await
    }

    async fn find_pet(&self, id: PetId) -> Result<Option<Pet>> {
        self.find_json(&format!("api/pets/{id}")).await
    }

    async fn list_matches(&self) -> Result<Vec<Match>> {
        self.get_json("api/matches").await
    }

    async fn list_conversations(&self) -> Result<Vec<ChatPartner>> {
        self.get_json("api/owners/chats").await
    }

    async fn find_message(&self, id: MessageId) -> Result<Option<ChatMessage>> {
        self.find_json(&format!("api/chats/{id}")).await
    }

    async fn delete_conversation(&self, match_id: MatchId) -> Result<()> {
        self.no_content(Method::DELETE, &format!("api/chats/{match_id}"))
            .await
    }

    async fn search_candidates(&self) -> Result<Vec<Pet>> {
        self.get_json("api/pets/search").await
    }
}
