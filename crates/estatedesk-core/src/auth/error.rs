use thiserror::Error;

use crate::api::ApiError;

/// Failure of a session operation, as seen by the store and the UI.
///
/// `Display` is the message shown inline under the login or registration form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server refused the credentials or the submitted fields.
    #[error("{0}")]
    Rejected(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Unable to connect to server. Check your internet connection.")]
    Network(String),

    /// Token present but no longer accepted.
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("Another sign-in request is still in progress")]
    Busy,

    /// A newer session change (usually a logout) landed first.
    #[error("Request was superseded by a newer session change")]
    Superseded,

    #[error("Unexpected server response: {0}")]
    Service(String),
}

/// Coarse classification used for logging and UI decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Validation,
    Network,
    StaleSession,
    Conflict,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Rejected(_) | AuthError::MissingField(_) => AuthErrorKind::Validation,
            AuthError::Network(_) | AuthError::Service(_) => AuthErrorKind::Network,
            AuthError::SessionExpired => AuthErrorKind::StaleSession,
            AuthError::Busy | AuthError::Superseded => AuthErrorKind::Conflict,
        }
    }

    /// Map a failed credential submission (login or register).
    pub fn from_submission(err: ApiError) -> Self {
        if let Some(msg) = err.server_message() {
            return AuthError::Rejected(msg.to_string());
        }
        match err {
            ApiError::Unauthorized(_) => AuthError::Rejected("Invalid email or password".to_string()),
            ApiError::Conflict(_) => AuthError::Rejected("An account with that email already exists".to_string()),
            ApiError::BadRequest(_) | ApiError::AccessDenied(_) => {
                AuthError::Rejected("The server rejected the request".to_string())
            }
            other => Self::from(other),
        }
    }
}

impl From<ApiError> for AuthError {
    /// Generic mapping for calls made with an existing token.
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(_) | ApiError::AccessDenied(_) => AuthError::SessionExpired,
            ApiError::NetworkError(e) => AuthError::Network(e.to_string()),
            ApiError::RateLimited => {
                AuthError::Network("Server is busy. Please wait a moment and try again.".to_string())
            }
            other => AuthError::Service(other.to_string()),
        }
    }
}
