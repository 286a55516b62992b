//! Two-party chat threads.
//!
//! A thread is the union of four buckets (see
//! [`furrymatch_shared::conversation`]). Loading fetches the local user's
//! outgoing and incoming halves concurrently, merges them and replaces the
//! in-memory copy. The copy is owned by the view that opened it; results
//! that arrive after the view closed the thread are discarded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use furrymatch_shared::conversation::{build_tokens, ConversationKeys};
use furrymatch_shared::models::ChatMessage;
use furrymatch_shared::types::{MatchId, OwnerId};

use crate::backend::Backend;
use crate::error::{Result, ValidationError};
use crate::events::{SessionBus, SessionEvent};
use crate::polling::Refresh;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadState {
    Closed,
    Loading,
    Open {
        messages: Vec<ChatMessage>,
        last_sync: DateTime<Utc>,
    },
}

/// Who is talking to whom, about which match. Any of the three may be
/// unknown while the surrounding view is still loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Participants {
    pub self_id: Option<OwnerId>,
    pub peer_id: Option<OwnerId>,
    pub match_id: Option<MatchId>,
}

impl Participants {
    pub fn new(self_id: OwnerId, peer_id: OwnerId, match_id: MatchId) -> Self {
        Self {
            self_id: Some(self_id),
            peer_id: Some(peer_id),
            match_id: Some(match_id),
        }
    }

    fn pair(&self) -> std::result::Result<(OwnerId, OwnerId), ValidationError> {
        let me = self.self_id.ok_or(ValidationError::MissingSender)?;
        let peer = self.peer_id.ok_or(ValidationError::MissingRecipient)?;
        Ok((me, peer))
    }

    fn full(&self) -> std::result::Result<(OwnerId, OwnerId, MatchId), ValidationError> {
        let (me, peer) = self.pair()?;
        let match_id = self.match_id.ok_or(ValidationError::MissingMatch)?;
        Ok((me, peer, match_id))
    }
}

/// Concatenate both halves, drop duplicate ids and order by timestamp.
/// Ties fall back to the rendered timestamp, then the message id, so both
/// participants see the same order.
pub fn merge_thread(outgoing: Vec<ChatMessage>, incoming: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut all: Vec<ChatMessage> = outgoing.into_iter().chain(incoming).collect();
    let mut seen = HashSet::new();
    all.retain(|m| seen.insert(m.id));
    all.sort_by(|a, b| {
        a.date_chat
            .cmp(&b.date_chat)
            .then_with(|| a.date_chat.to_rfc3339().cmp(&b.date_chat.to_rfc3339()))
            .then_with(|| a.id.cmp(&b.id))
    });
    all
}

#[derive(Debug)]
struct Inner {
    state: ThreadState,
    /// Bumped on every open and close. A load only applies if the epoch it
    /// started under is still current.
    epoch: u64,
    read_marked: bool,
}

/// One open conversation. Clones share the same in-memory thread, so a
/// poller can hold one while the view holds another.
#[derive(Clone)]
pub struct ChatThread {
    backend: Arc<dyn Backend>,
    bus: SessionBus,
    parties: Participants,
    inner: Arc<Mutex<Inner>>,
}

impl ChatThread {
    pub fn new(backend: Arc<dyn Backend>, bus: SessionBus, parties: Participants) -> Self {
        Self {
            backend,
            bus,
            parties,
            inner: Arc::new(Mutex::new(Inner {
                state: ThreadState::Closed,
                epoch: 0,
                read_marked: false,
            })),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn participants(&self) -> Participants {
        self.parties
    }

    pub fn keys(&self) -> Result<ConversationKeys> {
        let (me, peer) = self.parties.pair()?;
        Ok(build_tokens(me, peer))
    }

    pub fn state(&self) -> ThreadState {
        self.inner().state.clone()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.inner().state, ThreadState::Closed)
    }

    /// Messages of the open thread, oldest first. Empty unless open.
    pub fn messages(&self) -> Vec<ChatMessage> {
        match &self.inner().state {
            ThreadState::Open { messages, .. } => messages.clone(),
            _ => Vec::new(),
        }
    }

    /// Messages in the loaded thread that the local user has not read.
    pub fn unread_count(&self) -> usize {
        let Some(me) = self.parties.self_id else {
            return 0;
        };
        self.messages()
            .iter()
            .filter(|m| m.state_chat.recipient == me && m.state_chat.is_unread())
            .count()
    }

    /// Open the conversation: flip its unread bucket once, then load.
    pub async fn open(&self) -> Result<usize> {
        {
            let mut inner = self.inner();
            inner.epoch += 1;
            inner.read_marked = false;
            inner.state = ThreadState::Loading;
        }
        if let Err(e) = self.mark_read().await {
            warn!(error = %e, "Could not mark conversation read");
        }
        self.load_thread().await
    }

    /// Tear down. In-flight loads finish but no longer touch the thread.
    pub fn close(&self) {
        let mut inner = self.inner();
        inner.epoch += 1;
        inner.state = ThreadState::Closed;
        debug!(match_id = ?self.parties.match_id, "Thread closed");
    }

    fn begin(&self) -> u64 {
        self.inner().epoch
    }

    /// Replace the thread if `epoch` is still current and the thread open.
    fn apply(&self, epoch: u64, messages: Vec<ChatMessage>) -> bool {
        let mut inner = self.inner();
        if inner.epoch != epoch || matches!(inner.state, ThreadState::Closed) {
            debug!(epoch, current = inner.epoch, "Discarding stale thread load");
            return false;
        }
        inner.state = ThreadState::Open {
            messages,
            last_sync: Utc::now(),
        };
        true
    }

    /// Fetch both halves and replace the in-memory thread. Either half may
    /// be empty; if either request fails the previous thread is kept.
    /// Returns 0 without a request while the thread is closed.
    pub async fn load_thread(&self) -> Result<usize> {
        let keys = self.keys()?;
        let epoch = self.begin();
        if self.is_closed() {
            debug!(match_id = ?self.parties.match_id, "Skipping load of closed thread");
            return Ok(0);
        }

        let (out_unread, out_read) = keys.outgoing();
        let (in_unread, in_read) = keys.incoming();
        let (outgoing, incoming) = tokio::join!(
            self.backend.get_thread_messages(out_unread, out_read),
            self.backend.get_thread_messages(in_unread, in_read),
        );
        let merged = merge_thread(outgoing?, incoming?);
        let count = merged.len();

        if self.apply(epoch, merged) {
            debug!(match_id = ?self.parties.match_id, count, "Thread loaded");
        }
        Ok(count)
    }

    /// Persist a message from the local user, then reload. The message is
    /// stored unread for the peer.
    pub async fn send(&self, text: &str) -> Result<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let (me, peer, match_id) = self.parties.full()?;
        let key = build_tokens(me, peer).sender_unread;

        let message = self.backend.send_message(text, key, match_id).await?;
        info!(match_id = %match_id, message_id = %message.id, "Message sent");
        self.bus.publish(SessionEvent::MessageSent {
            match_id,
            preview: message.message.clone(),
        });

        if let Err(e) = self.load_thread().await {
            warn!(match_id = %match_id, error = %e, "Reload after send failed");
        }
        Ok(message)
    }

    /// Flip the peer's unread messages to the local user to read. Runs at
    /// most once per open; later calls return immediately.
    pub async fn mark_read(&self) -> Result<()> {
        let (me, peer) = self.parties.pair()?;
        let match_id = self.parties.match_id.ok_or(ValidationError::MissingMatch)?;
        if self.inner().read_marked {
            return Ok(());
        }

        self.backend.mark_conversation_read(match_id, me, peer).await?;
        self.inner().read_marked = true;
        debug!(match_id = %match_id, "Conversation marked read");
        self.bus.publish(SessionEvent::ChatRead { match_id });
        Ok(())
    }

    /// Remove every message of the match and close the thread.
    pub async fn delete(&self) -> Result<()> {
        let match_id = self.parties.match_id.ok_or(ValidationError::MissingMatch)?;
        self.backend.delete_conversation(match_id).await?;
        info!(match_id = %match_id, "Conversation deleted");
        self.close();
        Ok(())
    }
}

#[async_trait]
impl Refresh for ChatThread {
    fn is_active(&self) -> bool {
        !self.is_closed()
    }

    async fn refresh(&self) -> Result<()> {
        self.load_thread().await.map(|_| ())
    }
}
