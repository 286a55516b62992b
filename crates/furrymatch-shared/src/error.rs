use thiserror::Error;

/// Failures decoding the `sender;recipient;state` wire form of a
/// conversation key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Expected 3 segments in conversation key, got {0}")]
    SegmentCount(usize),

    #[error("Invalid owner id in conversation key: {0:?}")]
    InvalidOwnerId(String),

    #[error("Unknown read state: {0:?}")]
    UnknownReadState(String),
}
