//! Hosted session store: per-process session cache over an [`AuthGateway`].
//!
//! DESIGN
//! ======
//! The current session lives behind one async mutex. Every state change is
//! applied, persisted and published while that lock is held, so the event
//! stream observed by subscribers has the same order as the state changes.
//!
//! An optional JSON session file lets a session outlive the process, the way a
//! browser keeps it in local storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::{AuthEvent, AuthGateway, Session, SessionStore, SignUpMetadata, SignUpResponse, StoreError};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Stateful [`SessionStore`] backed by the hosted REST API.
pub struct HostedSessionStore {
    gateway: Arc<dyn AuthGateway>,
    current: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    storage: Option<PathBuf>,
}

impl HostedSessionStore {
    /// In-memory store with no persisted session.
    #[must_use]
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { gateway, current: Mutex::new(None), events, storage: None }
    }

    /// Store that restores and persists its session at `path`.
    ///
    /// A missing or unreadable file starts the store signed out.
    pub async fn open(gateway: Arc<dyn AuthGateway>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let restored = match load_session(&path).await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "ignoring unreadable session file");
                None
            }
        };
        if restored.is_some() {
            debug!(path = %path.display(), "restored persisted session");
        }
        let mut store = Self::new(gateway);
        store.current = Mutex::new(restored);
        store.storage = Some(path);
        store
    }

    /// Apply a new session value, persist it and publish `event`. Caller holds the lock.
    async fn commit(&self, slot: &mut Option<Session>, value: Option<Session>, event: AuthEvent) {
        *slot = value;
        if let Some(path) = &self.storage {
            if let Err(e) = save_session(path, slot.as_ref()).await {
                warn!(error = %e, path = %path.display(), "failed to persist session");
            }
        }
        debug!(event = event.name(), "auth state change");
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SessionStore for HostedSessionStore {
    async fn get_session(&self) -> Result<Option<Session>, StoreError> {
        let mut current = self.current.lock().await;
        let Some(session) = current.clone() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        match self.gateway.refresh(&session.refresh_token).await? {
            Some(refreshed) => {
                info!(user_id = %refreshed.user.id, "session refreshed");
                self.commit(&mut current, Some(refreshed.clone()), AuthEvent::TokenRefreshed(refreshed.clone()))
                    .await;
                Ok(Some(refreshed))
            }
            None => {
                info!(user_id = %session.user.id, "refresh token rejected; signing out");
                self.commit(&mut current, None, AuthEvent::SignedOut).await;
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let session = self.gateway.password_grant(email, password).await?;
        let mut current = self.current.lock().await;
        info!(user_id = %session.user.id, "signed in");
        self.commit(&mut current, Some(session.clone()), AuthEvent::SignedIn(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpResponse, StoreError> {
        let response = self.gateway.register(email, password, metadata).await?;
        if let Some(session) = &response.session {
            let mut current = self.current.lock().await;
            info!(user_id = %session.user.id, "account created with session");
            self.commit(&mut current, Some(session.clone()), AuthEvent::SignedIn(session.clone()))
                .await;
        } else {
            info!(user_id = %response.user.id, "account created; confirmation pending");
        }
        Ok(response)
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        let mut current = self.current.lock().await;
        let Some(session) = current.clone() else {
            return Ok(());
        };
        // Revoke first: on failure the session is kept and nothing is published.
        self.gateway.revoke(&session.access_token).await?;
        info!(user_id = %session.user.id, "signed out");
        self.commit(&mut current, None, AuthEvent::SignedOut).await;
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// SESSION FILE
// =============================================================================

async fn load_session(path: &Path) -> Result<Option<Session>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Persistence(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Persistence(e.to_string())),
    }
}

async fn save_session(path: &Path, session: Option<&Session>) -> Result<(), StoreError> {
    let Some(session) = session else {
        return match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(StoreError::Persistence(e.to_string())),
            _ => Ok(()),
        };
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
    }
    let bytes = serde_json::to_vec_pretty(session).map_err(|e| StoreError::Persistence(e.to_string()))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))
}

#[cfg(test)]
#[path = "hosted_test.rs"]
mod tests;
