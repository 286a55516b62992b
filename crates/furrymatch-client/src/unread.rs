//! Process-wide unread aggregation and the notification indicator.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use furrymatch_shared::models::ChatMessage;
use furrymatch_shared::types::MatchId;

use crate::backend::Backend;
use crate::error::Result;
use crate::events::{SessionBus, SessionEvent};
use crate::polling::Refresh;
use crate::state::SharedSession;

/// What the chat entry in the navigation shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIndicator {
    /// The user is on the chat route already.
    ActiveRoute,
    HasUnread,
    Idle,
}

impl NotificationIndicator {
    pub fn resolve(route_active: bool, unread_matches: usize) -> Self {
        if route_active {
            NotificationIndicator::ActiveRoute
        } else if unread_matches > 0 {
            NotificationIndicator::HasUnread
        } else {
            NotificationIndicator::Idle
        }
    }
}

/// Distinct matches that have at least one of `messages`, ascending.
pub fn unread_match_ids(messages: &[ChatMessage]) -> Vec<MatchId> {
    messages
        .iter()
        .filter_map(ChatMessage::match_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct UnreadTracker {
    backend: Arc<dyn Backend>,
    session: SharedSession,
    bus: SessionBus,
    unread: Mutex<Vec<MatchId>>,
}

impl UnreadTracker {
    pub fn new(backend: Arc<dyn Backend>, session: SharedSession, bus: SessionBus) -> Self {
        Self {
            backend,
            session,
            bus,
            unread: Mutex::new(Vec::new()),
        }
    }

    fn authenticated(&self) -> bool {
        self.session
            .lock()
            .map(|s| s.is_authenticated())
            .unwrap_or(false)
    }

    /// Re-fetch the unread set. Publishes [`SessionEvent::UnreadChanged`]
    /// when it differs from the previous one. A signed-out session has no
    /// unread messages and makes no request.
    pub async fn refresh(&self) -> Result<Vec<MatchId>> {
        let ids = if self.authenticated() {
            unread_match_ids(&self.backend.get_unread_for_current_user().await?)
        } else {
            Vec::new()
        };

        let changed = {
            let mut current = self.unread.lock().unwrap_or_else(|e| e.into_inner());
            if *current == ids {
                false
            } else {
                *current = ids.clone();
                true
            }
        };
        if changed {
            debug!(count = ids.len(), "Unread set changed");
            self.bus.publish(SessionEvent::UnreadChanged {
                match_ids: ids.clone(),
            });
        }
        Ok(ids)
    }

    pub fn unread_matches(&self) -> Vec<MatchId> {
        self.unread.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.unread.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether a conversation row should be highlighted.
    pub fn is_unread(&self, match_id: MatchId) -> bool {
        self.unread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&match_id)
    }

    pub fn indicator(&self, route_active: bool) -> NotificationIndicator {
        NotificationIndicator::resolve(route_active, self.count())
    }
}

#[async_trait]
impl Refresh for UnreadTracker {
    fn is_active(&self) -> bool {
        self.authenticated()
    }

    async fn refresh(&self) -> Result<()> {
        UnreadTracker::refresh(self).await.map(|_| ())
    }
}
