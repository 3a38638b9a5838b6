//! Auth State Holder: who is signed in right now, for every view in the process.
//!
//! ARCHITECTURE
//! ============
//! The holder owns a `watch` channel of [`AuthState`]. Views read snapshots or
//! wait on changes through [`AuthHolder::watch`]; only the holder writes.
//!
//! Two writers feed it:
//! - the listener task started by [`AuthHolder::subscribe`], which applies the
//!   Session Store's ordered event stream (last write wins), and
//! - [`AuthHolder::initialize`], which applies the one-time initial fetch.
//!
//! ORDERING
//! ========
//! `start` subscribes before fetching, so no event can fall between the two.
//! Every event bumps a generation counter inside the channel's write lock; the
//! initial fetch only writes its identity if no event landed while it was in
//! flight, so a slow initial answer never overwrites a newer event.
//!
//! Sign-in and sign-up never write identity directly: the store's event
//! does, which keeps exactly one update path.

pub mod error;
pub mod notify;
pub mod profile;
pub mod validate;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub use error::AuthErrorKind;
pub use notify::{Notice, Notifier, TracingNotifier};
pub use profile::ProfilePoll;

use crate::data::DataStore;
use crate::session_store::{AuthEvent, Identity, SessionStore, SignUpMetadata};

// =============================================================================
// STATE
// =============================================================================

/// Derived auth state shared with views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { identity: None, loading: true }
    }
}

impl AuthState {
    /// Loaded and nobody signed in: views should send the user to sign-in.
    #[must_use]
    pub fn should_redirect_unauth(&self) -> bool {
        !self.loading && self.identity.is_none()
    }

    /// Whether `email` is the signed-in user. Case and surrounding whitespace are ignored.
    #[must_use]
    pub fn is_signed_in_as(&self, email: &str) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|i| i.email.eq_ignore_ascii_case(email.trim()))
    }
}

/// How a successful sign-up left the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    /// Signed in immediately; views redirect to the landing page.
    AccountCreatedWithSession,
    /// The store returned a user but no session; views ask the user to confirm by email.
    AccountCreatedPendingConfirmation,
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Cancellation handle for the holder's Session Store registration.
///
/// Dropping it stops the listener; no callback runs against a released holder.
pub struct AuthSubscription {
    task: JoinHandle<()>,
}

impl AuthSubscription {
    /// Stop listening now.
    pub fn cancel(self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// HOLDER
// =============================================================================

struct Shared {
    state: watch::Sender<AuthState>,
    /// Number of store events applied so far.
    generation: AtomicU64,
}

impl Shared {
    fn apply_event(&self, identity: Option<Identity>) {
        self.state.send_modify(|s| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            s.identity = identity;
            s.loading = false;
        });
    }

    /// Apply the initial fetch unless an event landed after `started_at`.
    fn apply_initial(&self, identity: Option<Identity>, started_at: u64) -> bool {
        let mut applied = false;
        self.state.send_modify(|s| {
            if self.generation.load(Ordering::SeqCst) == started_at {
                s.identity = identity;
                applied = true;
            }
            s.loading = false;
        });
        applied
    }

    fn resolve_loading(&self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

/// Process-wide auth state holder. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthHolder {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    profiles: Option<(Arc<dyn DataStore>, ProfilePoll)>,
    shared: Arc<Shared>,
}

impl AuthHolder {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self { store, notifier, profiles: None, shared: Arc::new(Shared { state, generation: AtomicU64::new(0) }) }
    }

    /// Wait for the trigger-created profile after a sign-up that returns a session.
    #[must_use]
    pub fn with_profile_check(mut self, data: Arc<dyn DataStore>, poll: ProfilePoll) -> Self {
        self.profiles = Some((data, poll));
        self
    }

    /// Subscribe to the store, then run the initial fetch.
    ///
    /// Keep the returned handle alive for as long as the holder should track changes.
    pub async fn start(&self) -> AuthSubscription {
        let subscription = self.subscribe();
        self.initialize().await;
        subscription
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that always yields the latest state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.shared.state.subscribe()
    }

    /// Wait until `done` holds for the current state and return that state.
    ///
    /// Checks the current value first. To wait for the effect of a call just
    /// made, pass a predicate that only the new state satisfies.
    pub async fn wait_until(&self, mut done: impl FnMut(&AuthState) -> bool) -> AuthState {
        let mut rx = self.watch();
        let settled = rx.wait_for(|s| done(s)).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Register for session-change notifications.
    ///
    /// Each event replaces `identity` and clears `loading`. The returned handle
    /// releases the registration when dropped.
    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        let mut events = self.store.on_auth_state_change();
        let shared = Arc::clone(&self.shared);
        let notifier = Arc::clone(&self.notifier);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(event = event.name(), "applying auth event");
                        shared.apply_event(event.identity().cloned());
                        announce(notifier.as_ref(), &event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth listener lagged; continuing with newest events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("auth listener stopped");
        });

        AuthSubscription { task }
    }

    /// Query the store once for the current session.
    ///
    /// Never fails: a store error leaves `identity` empty, clears `loading`
    /// and is reported through the log and the notifier.
    pub async fn initialize(&self) {
        let started_at = self.shared.generation.load(Ordering::SeqCst);
        match self.store.get_session().await {
            Ok(session) => {
                let identity = session.map(|s| s.user);
                let found = identity.is_some();
                if self.shared.apply_initial(identity, started_at) {
                    info!(signed_in = found, "auth initialized");
                } else {
                    debug!("initial session superseded by a newer auth event");
                }
            }
            Err(e) => {
                error!(error = %e, "failed to initialize auth");
                self.shared.resolve_loading();
                self.notifier.notify(Notice::destructive(
                    "Authentication Error",
                    "Failed to initialize authentication. Please refresh the page.",
                ));
            }
        }
    }

    /// Verify credentials with the store. Identity updates arrive via the subscription.
    ///
    /// # Errors
    ///
    /// Returns a classified error; validation failures never reach the store.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthErrorKind> {
        let email = validate::validate_sign_in(email, password)?;
        match self.store.sign_in_with_password(&email, password).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let kind = AuthErrorKind::from(e);
                warn!(error = %kind, "sign in failed");
                self.notifier
                    .notify(Notice::destructive("Sign in failed", kind.to_string()));
                Err(kind)
            }
        }
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns a classified error; validation failures never reach the store.
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<SignupOutcome, AuthErrorKind> {
        let input = validate::validate_sign_up(email, password, display_name)?;
        let metadata = SignUpMetadata { full_name: input.display_name };

        let response = match self.store.sign_up(&input.email, password, &metadata).await {
            Ok(response) => response,
            Err(e) => {
                let kind = AuthErrorKind::from(e);
                warn!(error = %kind, "sign up failed");
                self.notifier
                    .notify(Notice::destructive("Sign up failed", kind.to_string()));
                return Err(kind);
            }
        };

        let Some(session) = response.session else {
            info!(user_id = %response.user.id, "sign up pending email confirmation");
            self.notifier.notify(Notice::info(
                "Check your email",
                "We've sent you a confirmation link. Please check your email to complete signup.",
            ));
            return Ok(SignupOutcome::AccountCreatedPendingConfirmation);
        };

        if let Some((data, poll)) = &self.profiles {
            match profile::wait_for_profile(data.as_ref(), &session.access_token, session.user.id, *poll).await {
                Ok(Some(_)) => {}
                Ok(None) => warn!(user_id = %session.user.id, "account created without a visible profile"),
                Err(e) => warn!(error = %e, user_id = %session.user.id, "profile check failed"),
            }
        }
        self.notifier
            .notify(Notice::info("Account created!", "Welcome to WishKart!"));
        Ok(SignupOutcome::AccountCreatedWithSession)
    }

    /// Sign out. Already signed out is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns a classified error; the previous state is kept.
    pub async fn sign_out(&self) -> Result<(), AuthErrorKind> {
        if let Err(e) = self.store.sign_out().await {
            let kind = AuthErrorKind::from(e);
            warn!(error = %kind, "sign out failed");
            self.notifier.notify(Notice::destructive(
                "Sign out failed",
                "Failed to sign out. Please try again.",
            ));
            return Err(kind);
        }
        Ok(())
    }
}

fn announce(notifier: &dyn Notifier, event: &AuthEvent) {
    match event {
        AuthEvent::SignedIn(_) => {
            notifier.notify(Notice::info("Welcome!", "You have successfully signed in."));
        }
        AuthEvent::SignedOut => {
            notifier.notify(Notice::info("Signed out", "You have been signed out successfully."));
        }
        AuthEvent::TokenRefreshed(_) | AuthEvent::UserUpdated(_) => {}
    }
}

#[cfg(test)]
#[path = "holder_test.rs"]
mod tests;
