//! Like/match detection and the candidate browsing queue.
//!
//! Each swipe persists one directional edge. The backend checks the reverse
//! edge in the same call and answers with a match id when both pets like
//! each other. Duplicate swipes on the same pair are possible; they simply
//! reinforce the existing edge.

use std::sync::Arc;

use tracing::{debug, info};

use furrymatch_shared::models::{LikeState, Pet};
use furrymatch_shared::types::{MatchId, PetId};

use crate::backend::Backend;
use crate::error::{ClientError, Result, ValidationError};
use crate::events::{SessionBus, SessionEvent};
use crate::identity::IdentityResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeOutcome {
    /// Both pets like each other; show the match.
    Matched(MatchId),
    /// Move on to the next candidate.
    NoMatch,
}

impl SwipeOutcome {
    pub fn match_id(self) -> Option<MatchId> {
        match self {
            SwipeOutcome::Matched(id) => Some(id),
            SwipeOutcome::NoMatch => None,
        }
    }
}

pub struct MatchDetector {
    backend: Arc<dyn Backend>,
    identity: Arc<IdentityResolver>,
    bus: SessionBus,
}

impl MatchDetector {
    pub fn new(backend: Arc<dyn Backend>, identity: Arc<IdentityResolver>, bus: SessionBus) -> Self {
        Self {
            backend,
            identity,
            bus,
        }
    }

    /// Record `actor -> target` and report whether a mutual match exists.
    pub async fn record_preference(
        &self,
        actor: PetId,
        target: PetId,
        state: LikeState,
    ) -> Result<SwipeOutcome> {
        if actor == target {
            return Err(ValidationError::SamePet.into());
        }
        let current = self.identity.resolve().await.ok_or(ClientError::NoActivePet)?;
        if actor != current {
            return Err(ValidationError::NotCurrentPet.into());
        }

        let match_id = self.backend.record_preference(state, actor, target).await?;
        debug!(actor = %actor, target = %target, ?state, "Preference recorded");

        match (state, match_id) {
            (LikeState::Like, Some(match_id)) => {
                info!(match_id = %match_id, target = %target, "Match found");
                self.bus.publish(SessionEvent::MatchFound { match_id, target });
                Ok(SwipeOutcome::Matched(match_id))
            }
            _ => Ok(SwipeOutcome::NoMatch),
        }
    }
}

/// Candidates in browsing order. Reaching the end is terminal.
#[derive(Debug, Clone, Default)]
pub struct CandidateQueue {
    pets: Vec<Pet>,
    index: usize,
    exhausted: bool,
}

impl CandidateQueue {
    pub fn new(pets: Vec<Pet>) -> Self {
        let exhausted = pets.is_empty();
        Self {
            pets,
            index: 0,
            exhausted,
        }
    }

    pub fn current(&self) -> Option<&Pet> {
        if self.exhausted {
            None
        } else {
            self.pets.get(self.index)
        }
    }

    pub fn advance(&mut self) {
        if self.index + 1 < self.pets.len() {
            self.index += 1;
        } else {
            self.exhausted = true;
        }
    }

    /// The "no more pets" state.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn remaining(&self) -> usize {
        if self.exhausted {
            0
        } else {
            self.pets.len() - self.index
        }
    }
}

/// Browsing session: a candidate queue driven through a [`MatchDetector`].
pub struct Swiper {
    backend: Arc<dyn Backend>,
    identity: Arc<IdentityResolver>,
    detector: MatchDetector,
    queue: CandidateQueue,
}

impl Swiper {
    pub fn new(backend: Arc<dyn Backend>, identity: Arc<IdentityResolver>, bus: SessionBus) -> Self {
        let detector = MatchDetector::new(backend.clone(), identity.clone(), bus);
        Self {
            backend,
            identity,
            detector,
            queue: CandidateQueue::default(),
        }
    }

    /// Fetch candidates, never including the active pet itself.
    pub async fn load(&mut self) -> Result<usize> {
        let current = self.identity.resolve().await;
        let pets: Vec<Pet> = self
            .backend
            .search_candidates()
            .await?
            .into_iter()
            .filter(|p| Some(p.id) != current)
            .collect();
        info!(count = pets.len(), "Candidates loaded");
        self.queue = CandidateQueue::new(pets);
        Ok(self.queue.remaining())
    }

    pub fn queue(&self) -> &CandidateQueue {
        &self.queue
    }

    /// Swipe on the current candidate and advance, whatever the outcome.
    /// A failed request leaves the queue where it was.
    pub async fn swipe(&mut self, state: LikeState) -> Result<SwipeOutcome> {
        let target = self
            .queue
            .current()
            .map(|p| p.id)
            .ok_or(ValidationError::CandidatesExhausted)?;
        let actor = self.identity.resolve().await.ok_or(ClientError::NoActivePet)?;

        let outcome = self.detector.record_preference(actor, target, state).await?;
        self.queue.advance();
        Ok(outcome)
    }
}
