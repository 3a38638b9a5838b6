//! Classified auth errors surfaced to views.

use super::validate::ValidationError;
use crate::session_store::StoreError;

/// What went wrong with an auth call, in terms a view can act on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthErrorKind {
    /// Wrong email or password. The user can correct it.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The Session Store could not be reached. Retryable by the user.
    #[error("network error; check your connection and try again")]
    NetworkFailure,

    /// Rejected before reaching the Session Store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The Session Store answered with a server error.
    #[error("authentication service unavailable; please try again shortly")]
    ServiceUnavailable,

    #[error("{0}")]
    Unknown(String),
}

impl From<StoreError> for AuthErrorKind {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidCredentials(_) => Self::InvalidCredentials,
            StoreError::Network(_) => Self::NetworkFailure,
            StoreError::Unavailable(_) => Self::ServiceUnavailable,
            StoreError::Rejected { message, .. } => Self::Unknown(message),
            StoreError::Decode(msg) | StoreError::Persistence(msg) => Self::Unknown(msg),
        }
    }
}

impl AuthErrorKind {
    /// Whether retrying the same call unchanged might succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure | Self::ServiceUnavailable)
    }
}
