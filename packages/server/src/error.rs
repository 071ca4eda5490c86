use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::placement::PlacementError;
use common::storage::RepoError;
use common::{Error, ErrorKind};
use serde::Serialize;

/// Seconds suggested to clients when the remote gives no reset time.
const DEFAULT_RETRY_AFTER: u64 = 60;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `PAYLOAD_TOO_LARGE`,
    /// `TOKEN_MISSING`, `TOKEN_INVALID`, `AUTH_ERROR`, `FORBIDDEN`, `NOT_FOUND`,
    /// `WRITE_CONFLICT`, `RATE_LIMITED`, `CONFIGURATION_ERROR`, `REMOTE_API_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Only .glb allowed")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    PayloadTooLarge(String),
    TokenMissing,
    TokenInvalid,
    /// The repository rejected the server's own credential.
    RemoteAuth(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Rate limit exceeded. Contains seconds until retry is allowed.
    RateLimited {
        retry_after: u64,
    },
    /// Server configuration is missing or malformed. Reported verbatim.
    Configuration(String),
    RemoteApi(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                "Authentication required".into(),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token".into(),
            ),
            AppError::RemoteAuth(msg) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "WRITE_CONFLICT", msg),
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Try again in {retry_after} seconds"),
            ),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    msg,
                )
            }
            AppError::RemoteApi(msg) => {
                tracing::error!("Remote API error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "REMOTE_API_ERROR", msg)
            }
        };
        (status, ErrorBody { code, message })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = if let AppError::RateLimited { retry_after } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let (status, body) = self.status_and_body();

        if let Some(seconds) = retry_after {
            (status, [("Retry-After", seconds.to_string())], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

fn retry_after(reset: Option<u64>) -> u64 {
    let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    reset
        .map(|reset| reset.saturating_sub(now).max(1))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::Validation(PlacementError::PayloadTooLarge { .. })
            | Error::Repository(RepoError::SizeLimitExceeded(_)) => {
                AppError::PayloadTooLarge(message)
            }
            Error::Unauthenticated => AppError::TokenMissing,
            Error::Repository(RepoError::RateLimited { reset }) => AppError::RateLimited {
                retry_after: retry_after(reset),
            },
            other => match other.kind() {
                ErrorKind::Configuration => AppError::Configuration(message),
                ErrorKind::Validation => AppError::Validation(message),
                ErrorKind::Auth => AppError::RemoteAuth(message),
                ErrorKind::Forbidden => AppError::Forbidden(message),
                ErrorKind::NotFound => AppError::NotFound(message),
                ErrorKind::WriteConflict => AppError::Conflict(message),
                ErrorKind::RateLimited => AppError::RateLimited {
                    retry_after: DEFAULT_RETRY_AFTER,
                },
                ErrorKind::RemoteApi => AppError::RemoteApi(message),
            },
        }
    }
}
