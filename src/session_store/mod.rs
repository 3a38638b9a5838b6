//! Session Store: the hosted auth service, seen from this application.
//!
//! ARCHITECTURE
//! ============
//! Two seams sit in front of the hosted service:
//! - [`AuthGateway`] is the stateless REST surface (password grant, sign-up,
//!   logout, user lookup, refresh). The server binary and the route guard use
//!   it directly, one call per request.
//! - [`SessionStore`] is the stateful, per-process client: it owns the current
//!   session, refreshes it when it expires and publishes an ordered stream of
//!   [`AuthEvent`]s. The Auth State Holder consumes it.
//!
//! The handle is constructed once at startup and passed down explicitly.

pub mod api;
pub mod hosted;
pub mod types;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use api::AuthApi;
pub use hosted::HostedSessionStore;
pub use types::{AuthEvent, Identity, Session, SignUpMetadata, SignUpResponse, StoreError};

/// Stateless operations against the hosted auth REST API.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange an email/password pair for a session.
    async fn password_grant(&self, email: &str, password: &str) -> Result<Session, StoreError>;

    /// Create an account. The response carries no session while confirmation is pending.
    async fn register(&self, email: &str, password: &str, metadata: &SignUpMetadata)
    -> Result<SignUpResponse, StoreError>;

    /// Invalidate the session behind `access_token`. Already-invalid tokens succeed.
    async fn revoke(&self, access_token: &str) -> Result<(), StoreError>;

    /// Resolve the user behind `access_token`; `None` when the token is not valid.
    async fn user(&self, access_token: &str) -> Result<Option<Identity>, StoreError>;

    /// Trade a refresh token for a new session; `None` when the refresh token is not valid.
    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, StoreError>;
}

/// Per-process session client with change notifications.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, refreshed first if it has expired.
    async fn get_session(&self) -> Result<Option<Session>, StoreError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, StoreError>;

    async fn sign_up(&self, email: &str, password: &str, metadata: &SignUpMetadata)
    -> Result<SignUpResponse, StoreError>;

    /// Invalidate the current session. A no-op success when there is none.
    async fn sign_out(&self) -> Result<(), StoreError>;

    /// Register for session-change notifications, delivered in order.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

// =============================================================================
// TEST HELPERS
// =============================================================================
