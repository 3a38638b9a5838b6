//! Session Store types: identities, sessions, auth events and errors.
//!
//! Wire shapes follow the hosted auth service's REST responses. Raw payloads
//! are deserialized into `Raw*` structs and converted into the narrow types
//! the rest of the crate reads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds before expiry at which a session is already treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 10;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by Session Store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The request never produced an HTTP response (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The store rejected the email/password pair.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The store answered with a 5xx status.
    #[error("session store unavailable: status {0}")]
    Unavailable(u16),

    /// The store answered with a non-credential 4xx status.
    #[error("request rejected: status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The local session file could not be read or written.
    #[error("session persistence failed: {0}")]
    Persistence(String),
}

// =============================================================================
// IDENTITY & SESSION
// =============================================================================

/// Read-only snapshot of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// A session issued by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) at which the access token stops being valid.
    pub expires_at: i64,
    pub user: Identity,
}

impl Session {
    /// Whether the access token is expired (or about to be) at `now` (unix seconds).
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.saturating_sub(EXPIRY_MARGIN_SECS) <= now
    }

    /// Whether the access token is expired right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Ordered session-change notifications emitted by a Session Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
    UserUpdated(Session),
}

impl AuthEvent {
    /// The identity implied by this event.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::SignedIn(s) | Self::TokenRefreshed(s) | Self::UserUpdated(s) => Some(&s.user),
            Self::SignedOut => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::SignedOut => "signed_out",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::UserUpdated(_) => "user_updated",
        }
    }
}

/// Extra user metadata sent with a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUpMetadata {
    pub full_name: String,
}

/// Result of a sign-up call. `session` is absent while email confirmation is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResponse {
    pub user: Identity,
    pub session: Option<Session>,
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl From<RawUser> for Identity {
    fn from(raw: RawUser) -> Self {
        let display_name = raw
            .user_metadata
            .get("full_name")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned);
        Self { id: raw.id, email: raw.email.unwrap_or_default(), display_name }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: RawUser,
}

impl RawSession {
    /// Convert to a [`Session`], deriving `expires_at` from `expires_in` when absent.
    pub(crate) fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now.saturating_add(secs)))
            .unwrap_or(now);
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into(),
        }
    }
}

/// Error body returned by the auth service. Older and newer deployments use
/// different field names, so every field is optional.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RawErrorBody {
    pub(crate) fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }

    pub(crate) fn message(&self) -> String {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .or(self.error.as_deref())
            .unwrap_or("unknown error")
            .to_owned()
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
