//! # furrymatch-client
//!
//! Client-side matching and conversation engine. Builds the user-visible
//! state of likes, matches, chat threads and contract negotiations from a
//! [`Backend`], keeping it fresh through interval polling.

pub mod backend;
pub mod chat;
pub mod config;
pub mod contracts;
pub mod error;
pub mod events;
pub mod identity;
pub mod polling;
pub mod roster;
pub mod state;
pub mod swipe;
pub mod unread;

use tracing_subscriber::{fmt, EnvFilter};

pub use backend::{Backend, InMemoryBackend, RestBackend};
pub use chat::{ChatThread, Participants, ThreadState};
pub use config::ClientConfig;
pub use contracts::ContractDesk;
pub use error::{ClientError, Result, ValidationError};
pub use events::{SessionBus, SessionEvent};
pub use identity::IdentityResolver;
pub use polling::{PollHandle, Poller, Refresh};
pub use roster::{ContractRoster, ConversationList, RosterBuilder, RosterEntry};
pub use state::{SessionState, SharedSession};
pub use swipe::{CandidateQueue, MatchDetector, SwipeOutcome, Swiper};
pub use unread::{NotificationIndicator, UnreadTracker};

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("furrymatch_client=debug,furrymatch_watch=debug,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
