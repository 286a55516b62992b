//! Session state shared by every view of one signed-in user.
//!
//! [`SessionState`] is wrapped in `Arc<Mutex<>>` ([`SharedSession`]) so the
//! pollers and the views can all read it. The lock is never held across an
//! await point.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use furrymatch_shared::types::{OwnerId, PetId};

/// The authenticated account, as returned by the account endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Owner id of the user. Conversation keys are built from it.
    pub id: OwnerId,
    pub login: String,
}

/// Central session state.
#[derive(Debug, Default)]
pub struct SessionState {
    /// `None` until the user signs in, and again after sign-out.
    pub account: Option<Account>,

    /// The single pet the user currently operates as.
    /// `None` until resolved, or when the account has no pet yet.
    pub current_pet: Option<PetId>,
}

impl SessionState {
    /// Create a new, signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(account: Account) -> Self {
        Self {
            account: Some(account),
            current_pet: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.account.is_some()
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.account.as_ref().map(|a| a.id)
    }

    pub fn sign_out(&mut self) {
        self.account = None;
        self.current_pet = None;
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

pub fn shared(state: SessionState) -> SharedSession {
    Arc::new(Mutex::new(state))
}
