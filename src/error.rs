//! Error Taxonomy
//!
//! Every fallible operation in the overlay surfaces one of these variants.
//! Unreachable peers and missing files are usually recovered by the caller
//! (an empty branch, a negative search result); only validation failures are
//! rejected before any network activity happens.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    /// Missing or malformed required field (empty filename, empty address, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The remote side spoke the protocol incorrectly.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

impl OverlayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unreachable(peer: impl ToString, reason: impl ToString) -> Self {
        Self::Unreachable {
            peer: peer.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Rejects empty (or whitespace-only) required string fields.
pub fn require_non_empty(field: &str, value: &str) -> OverlayResult<()> {
    if value.trim().is_empty() {
        return Err(OverlayError::validation(format!("{} is required", field)));
    }
    Ok(())
}
