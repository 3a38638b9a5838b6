use super::*;

fn identity() -> Identity {
    Identity { id: Uuid::nil(), email: "a@b.com".into(), display_name: Some("Alice".into()) }
}

fn session(expires_at: i64) -> Session {
    Session { access_token: "at".into(), refresh_token: "rt".into(), expires_at, user: identity() }
}

// =============================================================================
// Session expiry
// =============================================================================

#[test]
fn session_not_expired_well_before_deadline() {
    assert!(!session(1_000).is_expired_at(500));
}

#[test]
fn session_expired_inside_margin() {
    assert!(session(1_000).is_expired_at(1_000 - EXPIRY_MARGIN_SECS));
}

#[test]
fn session_expired_after_deadline() {
    assert!(session(1_000).is_expired_at(2_000));
}

#[test]
fn extreme_expiry_values_do_not_overflow() {
    assert!(session(i64::MIN).is_expired_at(0));
    assert!(!session(i64::MAX).is_expired_at(i64::MAX - EXPIRY_MARGIN_SECS - 1));
}

// =============================================================================
// AuthEvent
// =============================================================================

#[test]
fn signed_out_event_implies_no_identity() {
    assert!(AuthEvent::SignedOut.identity().is_none());
}

#[test]
fn session_events_imply_session_user() {
    let s = session(1_000);
    for event in [AuthEvent::SignedIn(s.clone()), AuthEvent::TokenRefreshed(s.clone()), AuthEvent::UserUpdated(s)] {
        assert_eq!(event.identity(), Some(&identity()), "{}", event.name());
    }
}

// =============================================================================
// Wire conversion
// =============================================================================

#[test]
fn raw_user_reads_full_name_metadata() {
    let raw: RawUser = serde_json::from_value(serde_json::json!({
        "id": "00000000-0000-0000-0000-000000000000",
        "email": "a@b.com",
        "user_metadata": { "full_name": "  Alice  " }
    }))
    .unwrap();
    let id: Identity = raw.into();
    assert_eq!(id.display_name.as_deref(), Some("Alice"));
    assert_eq!(id.email, "a@b.com");
}

#[test]
fn raw_user_without_metadata_has_no_display_name() {
    let raw: RawUser = serde_json::from_value(serde_json::json!({
        "id": "00000000-0000-0000-0000-000000000000"
    }))
    .unwrap();
    let id: Identity = raw.into();
    assert!(id.display_name.is_none());
    assert_eq!(id.email, "");
}

#[test]
fn raw_session_derives_expiry_from_expires_in() {
    let raw: RawSession = serde_json::from_value(serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "expires_in": 3600,
        "user": { "id": "00000000-0000-0000-0000-000000000000", "email": "a@b.com" }
    }))
    .unwrap();
    assert_eq!(raw.into_session(100).expires_at, 3700);
}

#[test]
fn huge_expires_in_saturates() {
    let raw: RawSession = serde_json::from_value(serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "expires_in": i64::MAX,
        "user": { "id": "00000000-0000-0000-0000-000000000000" }
    }))
    .unwrap();
    assert_eq!(raw.into_session(100).expires_at, i64::MAX);
}

#[test]
fn raw_session_prefers_explicit_expires_at() {
    let raw: RawSession = serde_json::from_value(serde_json::json!({
        "access_token": "at",
        "refresh_token": "rt",
        "expires_in": 3600,
        "expires_at": 42,
        "user": { "id": "00000000-0000-0000-0000-000000000000" }
    }))
    .unwrap();
    assert_eq!(raw.into_session(100).expires_at, 42);
}

#[test]
fn error_body_prefers_error_code_and_description() {
    let body: RawErrorBody = serde_json::from_str(
        r#"{"error":"invalid_grant","error_code":"invalid_credentials","error_description":"Invalid login credentials"}"#,
    )
    .unwrap();
    assert_eq!(body.code(), Some("invalid_credentials"));
    assert_eq!(body.message(), "Invalid login credentials");
}

#[test]
fn error_body_falls_back_to_msg() {
    let body: RawErrorBody = serde_json::from_str(r#"{"code":422,"msg":"User already registered"}"#).unwrap();
    assert_eq!(body.code(), None);
    assert_eq!(body.message(), "User already registered");
}
