// crates/backend-lib/src/error.rs

//! Central error types + Axum integration.
use authgate_common::{ErrorBody, ErrorDetail};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The one message both credential failures are reported with.
pub const INCORRECT_CREDENTIALS: &str = "Incorrect username or password";

/// Failures of the session-store collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session could not be destroyed: {0}")]
    DestroyFailed(String),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Outcomes of credential verification and session gating.
///
/// `UnknownUser` only exists between the verifier and the lifecycle
/// manager; callers of `login` see `InvalidCredentials` for both.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credential record for this username")]
    UnknownUser,

    #[error("{}", INCORRECT_CREDENTIALS)]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("internal authentication failure: {0}")]
    Internal(String),
}

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", INCORRECT_CREDENTIALS)]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Session destroy failed: {0}")]
    SessionDestroyFailed(String),

    #[error("Session store unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AuthRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::SessionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SessionDestroyFailed(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::Unauthorized => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::SessionDestroyFailed(_) => "SESS_001",
            AppError::SessionUnavailable(_) => "SESS_002",
            AppError::Conflict(_) => "CONF_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => INCORRECT_CREDENTIALS.to_string(),
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::SessionDestroyFailed(_) => "Logout could not be completed".to_string(),
            AppError::SessionUnavailable(_) => {
                "Session service temporarily unavailable".to_string()
            },
            AppError::Conflict(_) => "Resource already exists".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownUser | AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::Unauthorized => AppError::Unauthorized,
            AuthError::Session(session_err) => session_err.into(),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::DestroyFailed(msg) => AppError::SessionDestroyFailed(msg),
            SessionError::Unavailable(msg) => AppError::SessionUnavailable(msg),
        }
    }
}
