//! Error types for message assembly.

use crate::crypto::CryptoError;

/// Result type alias for composer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling a message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// MIME construction failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailquill_mime::Error),

    /// Fetching rendered content from the editor failed.
    #[error("Failed to retrieve editor content: {0}")]
    ContentFetch(String),

    /// Signing or encrypting failed.
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The operation was cancelled.
    ///
    /// Not a failure: callers must not surface this as an error dialog.
    #[error("Operation cancelled")]
    Cancelled,

    /// The background crypto task was aborted before completion.
    #[error("Background task failed: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Whether the caller may retry the send without encryption.
    ///
    /// True only for a missing recipient key, which the UI surfaces as
    /// "send without encryption?" instead of a fatal error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::KeyNotFound { .. }))
    }
}
