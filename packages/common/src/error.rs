use thiserror::Error;

use crate::placement::PlacementError;
use crate::storage::RepoError;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a publish, list, remove or health operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Required server configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request itself is unacceptable.
    #[error("{0}")]
    Validation(#[from] PlacementError),

    /// No authenticated principal.
    #[error("authentication required")]
    Unauthenticated,

    /// The principal is not permitted, or the target is off limits.
    #[error("{0}")]
    Forbidden(String),

    /// The remote repository refused or failed the operation.
    #[error(transparent)]
    Repository(#[from] RepoError),
}

/// Taxonomy tag attached to every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Auth,
    Forbidden,
    NotFound,
    WriteConflict,
    RateLimited,
    RemoteApi,
}

impl ErrorKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Auth => "AUTH_ERROR",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::WriteConflict => "WRITE_CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::RemoteApi => "REMOTE_API_ERROR",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthenticated | Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Repository(err) => match err {
                RepoError::Auth(_) => ErrorKind::Auth,
                RepoError::RefNotFound(_) | RepoError::NotFound(_) => ErrorKind::NotFound,
                RepoError::WriteConflict(_) | RepoError::BranchConflict(_) => {
                    ErrorKind::WriteConflict
                }
                RepoError::SizeLimitExceeded(_) => ErrorKind::Validation,
                RepoError::RateLimited { .. } => ErrorKind::RateLimited,
                RepoError::Remote { .. } | RepoError::Transport(_) | RepoError::Decode(_) => {
                    ErrorKind::RemoteApi
                }
            },
        }
    }
}
