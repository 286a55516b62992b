use thiserror::Error;

/// Input rejected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("No sender for this conversation")]
    MissingSender,

    #[error("No recipient for this conversation")]
    MissingRecipient,

    #[error("No match for this conversation")]
    MissingMatch,

    #[error("No contract to send")]
    MissingContract,

    #[error("A pet cannot express a preference for itself")]
    SamePet,

    #[error("Preferences can only be recorded for the active pet")]
    NotCurrentPet,

    #[error("No more candidates to browse")]
    CandidatesExhausted,
}

/// Errors produced by the client engine.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Request could not be sent or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Backend returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(&'static str),

    #[error("No active pet for this session")]
    NoActivePet,

    #[error("Lock poisoned")]
    Lock,
}

impl ClientError {
    /// Failures of the request itself, as opposed to rejected input.
    /// Background refreshes swallow these and wait for the next tick.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_) | ClientError::Status { .. } | ClientError::Decode(_)
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
