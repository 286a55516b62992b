//! Active pet resolution.
//!
//! One account operates as exactly one pet per session. Matching operations
//! all start from that id; when it cannot be resolved the caller has no
//! matching context and shows an empty view instead of an error.

use std::sync::Arc;

use tracing::{info, warn};

use furrymatch_shared::types::PetId;

use crate::backend::Backend;
use crate::state::SharedSession;

pub struct IdentityResolver {
    backend: Arc<dyn Backend>,
    session: SharedSession,
}

impl IdentityResolver {
    pub fn new(backend: Arc<dyn Backend>, session: SharedSession) -> Self {
        Self { backend, session }
    }

    /// The cached pet id, if already resolved this session.
    pub fn cached(&self) -> Option<PetId> {
        self.session.lock().ok().and_then(|s| s.current_pet)
    }

    /// Resolve and cache the active pet. Failures are logged and reported
    /// as `None`.
    pub async fn resolve(&self) -> Option<PetId> {
        if let Some(pet) = self.cached() {
            return Some(pet);
        }

        let resolved = match self.backend.resolve_current_pet_id().await {
            Ok(pet) => pet,
            Err(e) => {
                warn!(error = %e, "Could not resolve active pet");
                return None;
            }
        };

        match resolved {
            Some(pet) => {
                if let Ok(mut guard) = self.session.lock() {
                    guard.current_pet = Some(pet);
                }
                info!(pet_id = %pet, "Active pet resolved");
            }
            None => info!("Account has no active pet"),
        }
        resolved
    }

    /// Drop the cached id, e.g. after the user switches pet.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.session.lock() {
            guard.current_pet = None;
        }
    }
}
