//! Error types for confab-chat

use thiserror::Error;

/// Result type alias using confab-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from conversation store operations.
///
/// These are local and synchronous; none of them leaves the store in a
/// state where the active pointer is dangling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Empty or blank chat name on creation
    #[error("Chat name must not be empty")]
    InvalidName,

    /// Operation referenced a chat that is not in the store
    #[error("Chat not found: {0}")]
    NotFound(String),

    /// Attempt to delete the default chat
    #[error("The default chat cannot be deleted")]
    ProtectedChat,
}

/// Errors that can occur while assembling a response
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend client layer
    #[error(transparent)]
    Ai(#[from] confab_ai::Error),

    /// A store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The turn was aborted before the stream completed
    #[error("Request aborted")]
    Aborted,
}
