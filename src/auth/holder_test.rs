use std::time::Duration;

use tokio::sync::Notify;

use super::notify::test_helpers::RecordingNotifier;
use super::validate::ValidationError;
use super::*;
use crate::data::test_helpers::FakeDataStore;
use crate::session_store::StoreError;
use crate::session_store::test_helpers::{FakeSessionStore, identity, session_for};

const PASSWORD: &str = "hunter22";

fn holder_over(store: &Arc<FakeSessionStore>) -> (AuthHolder, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let holder = AuthHolder::new(store.clone(), notifier.clone());
    (holder, notifier)
}

async fn wait_for(holder: &AuthHolder, pred: impl Fn(&AuthState) -> bool) -> AuthState {
    let mut rx = holder.watch();
    let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| pred(s)))
        .await
        .expect("timed out waiting for auth state")
        .expect("holder dropped")
        .clone();
    state
}

fn email_of(state: &AuthState) -> Option<&str> {
    state.identity.as_ref().map(|i| i.email.as_str())
}

// =============================================================================
// initialization
// =============================================================================

#[tokio::test]
async fn starts_loading_with_no_identity() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);

    let state = holder.state();

    assert!(state.loading);
    assert!(state.identity.is_none());
    assert!(!state.should_redirect_unauth());
}

#[tokio::test]
async fn start_restores_existing_session() {
    let user = identity("ada@example.com");
    let store = Arc::new(FakeSessionStore::signed_in(PASSWORD, session_for(user.clone())));
    let (holder, _) = holder_over(&store);

    let _sub = holder.start().await;

    assert_eq!(holder.state(), AuthState { identity: Some(user), loading: false });
}

#[tokio::test]
async fn start_without_session_resolves_loading() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);

    let _sub = holder.start().await;

    let state = holder.state();
    assert!(!state.loading);
    assert!(state.should_redirect_unauth());
}

#[tokio::test]
async fn initialize_failure_clears_loading_and_notifies() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    *store.get_session_error.lock().unwrap() = Some(StoreError::Network("offline".into()));
    let (holder, notifier) = holder_over(&store);

    holder.initialize().await;

    assert_eq!(holder.state(), AuthState { identity: None, loading: false });
    assert_eq!(notifier.titles(), vec!["Authentication Error".to_owned()]);
}

#[tokio::test]
async fn stale_initial_fetch_does_not_overwrite_newer_event() {
    let user = identity("ada@example.com");
    let store = Arc::new(FakeSessionStore::signed_in(PASSWORD, session_for(user)));
    let gate = Arc::new(Notify::new());
    *store.get_session_gate.lock().unwrap() = Some(gate.clone());
    let (holder, _) = holder_over(&store);

    let _sub = holder.subscribe();
    let init = tokio::spawn({
        let holder = holder.clone();
        async move { holder.initialize().await }
    });
    while store.calls() == 0 {
        tokio::task::yield_now().await;
    }

    store.emit(AuthEvent::SignedOut);
    wait_for(&holder, |s| !s.loading).await;
    gate.notify_one();
    init.await.unwrap();

    assert_eq!(holder.state(), AuthState { identity: None, loading: false });
}

// =============================================================================
// subscription
// =============================================================================

#[tokio::test]
async fn events_apply_last_write_wins() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);
    let _sub = holder.subscribe();

    store.emit(AuthEvent::SignedIn(session_for(identity("a@example.com"))));
    store.emit(AuthEvent::SignedOut);
    store.emit(AuthEvent::SignedIn(session_for(identity("b@example.com"))));
    let last = identity("c@example.com");
    store.emit(AuthEvent::TokenRefreshed(session_for(last.clone())));

    let state = wait_for(&holder, |s| email_of(s) == Some("c@example.com")).await;
    assert_eq!(state.identity, Some(last));
    assert!(!state.loading);
}

#[tokio::test]
async fn sign_in_and_out_events_are_announced() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, notifier) = holder_over(&store);
    let _sub = holder.subscribe();

    store.emit(AuthEvent::SignedIn(session_for(identity("a@example.com"))));
    wait_for(&holder, |s| s.identity.is_some()).await;
    store.emit(AuthEvent::SignedOut);
    wait_for(&holder, |s| s.identity.is_none()).await;
    tokio::task::yield_now().await;

    assert_eq!(notifier.titles(), vec!["Welcome!".to_owned(), "Signed out".to_owned()]);
}

#[tokio::test]
async fn dropped_subscription_stops_updates() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);

    let sub = holder.subscribe();
    assert!(sub.is_active());
    sub.cancel();
    tokio::task::yield_now().await;

    store.emit(AuthEvent::SignedIn(session_for(identity("a@example.com"))));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(holder.state(), AuthState::default());
}

#[tokio::test]
async fn cancelled_subscription_ignores_later_events() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);

    let sub = holder.subscribe();
    let mut rx = holder.watch();
    sub.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    store.emit(AuthEvent::SignedOut);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!rx.has_changed().unwrap());
    assert!(holder.state().loading);
}

// =============================================================================
// sign_in
// =============================================================================

#[tokio::test]
async fn sign_in_updates_identity_through_event() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);
    let _sub = holder.start().await;

    holder.sign_in("  Ada@Example.com ", PASSWORD).await.unwrap();

    let state = wait_for(&holder, |s| s.identity.is_some()).await;
    assert_eq!(email_of(&state), Some("ada@example.com"));
}

#[test]
fn signed_in_as_matches_only_that_user() {
    let state = AuthState { identity: Some(identity("a@example.com")), loading: false };
    assert!(state.is_signed_in_as(" A@Example.com "));
    assert!(!state.is_signed_in_as("b@example.com"));
    assert!(!AuthState::default().is_signed_in_as("a@example.com"));
}

#[tokio::test]
async fn switching_user_waits_for_the_new_identity() {
    let store = Arc::new(FakeSessionStore::signed_in(PASSWORD, session_for(identity("a@example.com"))));
    let (holder, _) = holder_over(&store);
    let _sub = holder.start().await;
    assert!(holder.state().is_signed_in_as("a@example.com"));

    holder.sign_in("b@example.com", PASSWORD).await.unwrap();

    let state = tokio::time::timeout(
        Duration::from_secs(2),
        holder.wait_until(|s| s.is_signed_in_as("b@example.com")),
    )
    .await
    .expect("timed out waiting for the new user");
    assert_eq!(email_of(&state), Some("b@example.com"));
}

#[tokio::test]
async fn wait_until_returns_at_once_when_already_true() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);
    let _sub = holder.start().await;

    let state = tokio::time::timeout(Duration::from_millis(100), holder.wait_until(|s| !s.loading))
        .await
        .expect("state already settled");
    assert!(state.identity.is_none());
}

#[tokio::test]
async fn sign_in_wrong_password_keeps_state() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, notifier) = holder_over(&store);
    let _sub = holder.start().await;

    let err = holder.sign_in("ada@example.com", "nope-nope").await.unwrap_err();

    assert_eq!(err, AuthErrorKind::InvalidCredentials);
    assert!(holder.state().identity.is_none());
    assert_eq!(notifier.titles(), vec!["Sign in failed".to_owned()]);
}

#[tokio::test]
async fn sign_in_network_failure_is_retryable() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    *store.sign_in_error.lock().unwrap() = Some(StoreError::Network("connection refused".into()));
    let (holder, _) = holder_over(&store);

    let err = holder.sign_in("ada@example.com", PASSWORD).await.unwrap_err();

    assert_eq!(err, AuthErrorKind::NetworkFailure);
    assert!(err.retryable());
}

#[tokio::test]
async fn invalid_sign_in_never_reaches_store() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, notifier) = holder_over(&store);

    let err = holder.sign_in("not-an-email", PASSWORD).await.unwrap_err();

    assert_eq!(err, AuthErrorKind::Validation(ValidationError::InvalidEmail));
    assert_eq!(store.calls(), 0);
    assert!(notifier.titles().is_empty());
}

// =============================================================================
// sign_up
// =============================================================================

#[tokio::test]
async fn sign_up_with_session_signs_in() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, notifier) = holder_over(&store);
    let _sub = holder.start().await;

    let outcome = holder.sign_up("ada@example.com", PASSWORD, " Ada Lovelace ").await.unwrap();

    assert_eq!(outcome, SignupOutcome::AccountCreatedWithSession);
    let state = wait_for(&holder, |s| s.identity.is_some()).await;
    assert_eq!(
        state.identity.and_then(|i| i.display_name),
        Some("Ada Lovelace".to_owned())
    );
    assert!(notifier.titles().contains(&"Account created!".to_owned()));
}

#[tokio::test]
async fn sign_up_pending_confirmation_keeps_signed_out() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    *store.require_confirmation.lock().unwrap() = true;
    let (holder, notifier) = holder_over(&store);
    let _sub = holder.start().await;

    let outcome = holder.sign_up("ada@example.com", PASSWORD, "Ada").await.unwrap();

    assert_eq!(outcome, SignupOutcome::AccountCreatedPendingConfirmation);
    assert_eq!(holder.state(), AuthState { identity: None, loading: false });
    assert_eq!(notifier.titles(), vec!["Check your email".to_owned()]);
}

#[tokio::test]
async fn short_password_sign_up_never_reaches_store() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, _) = holder_over(&store);

    let err = holder.sign_up("ada@example.com", "12345", "Ada").await.unwrap_err();

    assert_eq!(err, AuthErrorKind::Validation(ValidationError::PasswordTooShort));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn sign_up_waits_for_profile_when_configured() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let data = Arc::new(FakeDataStore::default());
    let poll = ProfilePoll {
        attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    let holder = AuthHolder::new(store.clone(), Arc::new(RecordingNotifier::default()))
        .with_profile_check(data.clone(), poll);

    let outcome = holder.sign_up("ada@example.com", PASSWORD, "Ada").await.unwrap();

    assert_eq!(outcome, SignupOutcome::AccountCreatedWithSession);
    assert_eq!(data.lookups(), 2);
}

// =============================================================================
// sign_out
// =============================================================================

#[tokio::test]
async fn sign_out_when_signed_out_is_noop() {
    let store = Arc::new(FakeSessionStore::new(PASSWORD));
    let (holder, notifier) = holder_over(&store);
    let _sub = holder.start().await;

    holder.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(holder.state(), AuthState { identity: None, loading: false });
    assert!(notifier.titles().is_empty());
}

#[tokio::test]
async fn sign_out_clears_identity() {
    let store = Arc::new(FakeSessionStore::signed_in(PASSWORD, session_for(identity("a@example.com"))));
    let (holder, _) = holder_over(&store);
    let _sub = holder.start().await;

    holder.sign_out().await.unwrap();

    let state = wait_for(&holder, |s| s.identity.is_none()).await;
    assert!(state.should_redirect_unauth());
}

#[tokio::test]
async fn sign_out_failure_keeps_identity() {
    let user = identity("a@example.com");
    let store = Arc::new(FakeSessionStore::signed_in(PASSWORD, session_for(user.clone())));
    *store.sign_out_error.lock().unwrap() = Some(StoreError::Unavailable(503));
    let (holder, notifier) = holder_over(&store);
    let _sub = holder.start().await;

    let err = holder.sign_out().await.unwrap_err();

    assert_eq!(err, AuthErrorKind::ServiceUnavailable);
    assert_eq!(holder.state().identity, Some(user));
    assert_eq!(notifier.titles(), vec!["Sign out failed".to_owned()]);
}
