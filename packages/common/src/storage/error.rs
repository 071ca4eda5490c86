use thiserror::Error;

/// Longest remote diagnostic we keep.
pub const MAX_REMOTE_MESSAGE_CHARS: usize = 300;

/// Errors returned by a [`RepositoryClient`](super::RepositoryClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoError {
    /// The requested branch does not exist.
    #[error("branch not found: {0}")]
    RefNotFound(String),

    /// A branch with this name already exists.
    #[error("branch already exists: {0}")]
    BranchConflict(String),

    /// The requested path does not exist on the given branch.
    #[error("not found: {0}")]
    NotFound(String),

    /// The blob identity supplied (or omitted) does not match the stored file.
    #[error("write conflict on {0}: the file changed or already exists")]
    WriteConflict(String),

    /// The remote rejected the credential.
    #[error("remote rejected credentials: {0}")]
    Auth(String),

    /// The remote refused the payload because of its size.
    #[error("payload rejected by remote store: {0}")]
    SizeLimitExceeded(String),

    /// The remote rate limit is exhausted. `reset` is the unix time it lifts.
    #[error("remote rate limit exceeded")]
    RateLimited { reset: Option<u64> },

    /// Any other non-2xx response.
    #[error("remote API error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Cut a remote diagnostic down to [`MAX_REMOTE_MESSAGE_CHARS`].
pub fn truncate_message(message: &str) -> String {
    let trimmed = message.trim();
    match trimmed.char_indices().nth(MAX_REMOTE_MESSAGE_CHARS) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}
