//! Contract actions offered from the contract roster.

use std::sync::Arc;

use tracing::info;

use crate::backend::Backend;
use crate::error::{Result, ValidationError};
use crate::roster::{ContractEntry, ContractRoster, RosterBuilder};

pub struct ContractDesk {
    backend: Arc<dyn Backend>,
    roster: Arc<RosterBuilder>,
}

impl ContractDesk {
    pub fn new(backend: Arc<dyn Backend>, roster: Arc<RosterBuilder>) -> Self {
        Self { backend, roster }
    }

    /// Link the match, opposing owner and pet so the contract form can be
    /// opened for them.
    pub async fn propose(&self, entry: &ContractEntry) -> Result<()> {
        let owner = entry.owner_id.ok_or(ValidationError::MissingRecipient)?;
        self.backend
            .save_contract_link(entry.match_id, owner, entry.pet.id)
            .await?;
        info!(match_id = %entry.match_id, pet_id = %entry.pet.id, "Contract proposal started");
        Ok(())
    }

    /// Send the drafted contract to the other owner, then rebuild the roster
    /// so the new stage shows.
    pub async fn send(&self, entry: &ContractEntry) -> Result<ContractRoster> {
        let contract = entry
            .contract
            .as_ref()
            .map(|c| c.id)
            .ok_or(ValidationError::MissingContract)?;
        let owner = entry.owner_id.ok_or(ValidationError::MissingRecipient)?;

        self.backend
            .save_contract_link(entry.match_id, owner, entry.pet.id)
            .await?;
        self.backend.send_contract_email(contract).await?;
        info!(match_id = %entry.match_id, contract_id = %contract, "Contract sent");

        self.roster.build_contract_roster().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{pet, InMemoryBackend};
    use crate::error::ClientError;
    use crate::identity::IdentityResolver;
    use crate::state::{shared, SessionState};
    use furrymatch_shared::models::LikeState;
    use furrymatch_shared::negotiation::{Affordance, ContractStatus};
    use furrymatch_shared::types::{OwnerId, PetId};

    async fn desk() -> (Arc<InMemoryBackend>, Arc<RosterBuilder>, ContractDesk) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_pet(pet(5, "Luna", 42)).unwrap();
        backend.add_pet(pet(9, "Milo", 7)).unwrap();
        backend
            .record_preference(LikeState::Like, PetId(9), PetId(5))
            .await
            .unwrap();
        backend
            .record_preference(LikeState::Like, PetId(5), PetId(9))
            .await
            .unwrap();
        backend.set_session(OwnerId(42), Some(PetId(5))).unwrap();

        let identity = Arc::new(IdentityResolver::new(
            backend.clone(),
            shared(SessionState::new()),
        ));
        let roster = Arc::new(RosterBuilder::new(backend.clone(), identity));
        let desk = ContractDesk::new(backend.clone(), roster.clone());
        (backend, roster, desk)
    }

    #[tokio::test]
    async fn test_propose_links_match_owner_and_pet() {
        let (backend, roster, desk) = desk().await;
        let built = roster.build_contract_roster().await.unwrap();
        let entry = built.entry_for(PetId(9)).unwrap();
        assert_eq!(entry.status.affordance(), Affordance::Propose);

        desk.propose(entry).await.unwrap();
        assert_eq!(
            backend.contract_links(),
            vec![(entry.match_id, OwnerId(7), PetId(9))]
        );
    }

    #[tokio::test]
    async fn test_send_moves_draft_to_sent() {
        let (backend, roster, desk) = desk().await;
        let match_id = backend.matches()[0].id;
        let contract = backend
            .attach_contract(match_id, Some("vaccinated;42;1"))
            .unwrap();

        let built = roster.build_contract_roster().await.unwrap();
        let entry = built.entry_for(PetId(9)).unwrap();
        assert_eq!(entry.status, ContractStatus::CreatedByMe);
        assert_eq!(entry.status.affordance(), Affordance::Send);

        let after = desk.send(entry).await.unwrap();
        assert_eq!(backend.sent_contracts(), vec![contract]);
        assert_eq!(
            after.entry_for(PetId(9)).unwrap().status,
            ContractStatus::SentByMe
        );
    }

    #[tokio::test]
    async fn test_send_without_contract_is_rejected() {
        let (backend, roster, desk) = desk().await;
        let built = roster.build_contract_roster().await.unwrap();
        let entry = built.entry_for(PetId(9)).unwrap();

        let err = desk.send(entry).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::MissingContract)
        ));
        assert_eq!(backend.calls("send_contract_email"), 0);
    }
}
