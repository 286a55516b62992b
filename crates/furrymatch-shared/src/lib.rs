//! # furrymatch-shared
//!
//! Types shared by every FurryMatch crate: identifier newtypes, the wire
//! models returned by the backend, structured conversation keys and the
//! contract negotiation decoder. Nothing here performs I/O.

pub mod constants;
pub mod conversation;
pub mod error;
pub mod models;
pub mod negotiation;
pub mod types;

pub use conversation::{build_tokens, ChatStateKey, ConversationKeys, ReadState};
pub use error::KeyError;
pub use models::*;
pub use negotiation::{classify, Affordance, ContractStatus, Negotiation, NegotiationStage};
pub use types::*;
