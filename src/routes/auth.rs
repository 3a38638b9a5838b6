//! Auth routes: email/password sign-in and sign-up, sign-out, session cookies.

use std::convert::Infallible;

use axum::extract::{Form, FromRef, FromRequestParts, OptionalFromRequestParts, State};
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};

use crate::auth::validate;
use crate::auth::{AuthErrorKind, profile};
use crate::guard::LANDING_PATH;
use crate::session_store::{Identity, Session, SignUpMetadata};
use crate::state::AppState;

pub const ACCESS_COOKIE: &str = "wk-access-token";
pub const REFRESH_COOKIE: &str = "wk-refresh-token";
const REFRESH_COOKIE_DAYS: i64 = 30;

// =============================================================================
// COOKIES
// =============================================================================

/// Session tokens carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

#[must_use]
pub fn credentials(jar: &CookieJar) -> Credentials {
    let read = |name: &str| {
        jar.get(name)
            .map(Cookie::value)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };
    Credentials { access_token: read(ACCESS_COOKIE), refresh_token: read(REFRESH_COOKIE) }
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Add both session cookies. The access cookie lives as long as the token.
#[must_use]
pub fn set_session_cookies(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    let mut access = session_cookie(ACCESS_COOKIE, session.access_token.clone(), secure);
    let remaining = session
        .expires_at
        .saturating_sub(crate::session_store::types::unix_now())
        .max(0);
    access.set_max_age(Duration::seconds(remaining));
    let mut refresh = session_cookie(REFRESH_COOKIE, session.refresh_token.clone(), secure);
    refresh.set_max_age(Duration::days(REFRESH_COOKIE_DAYS));
    jar.add(access).add(refresh)
}

#[must_use]
pub fn clear_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    let mut access = session_cookie(ACCESS_COOKIE, String::new(), secure);
    access.set_max_age(Duration::ZERO);
    let mut refresh = session_cookie(REFRESH_COOKIE, String::new(), secure);
    refresh.set_max_age(Duration::ZERO);
    jar.add(access).add(refresh)
}

/// Whether `response` already writes either session cookie.
#[must_use]
pub fn sets_session_cookie(response: &Response) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split_once('=').map(|(name, _)| name.trim()))
        .any(|name| name == ACCESS_COOKIE || name == REFRESH_COOKIE)
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user. Set by the route guard; verified from the access
/// cookie when the guard did not run for this path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub identity: Identity,
    pub access_token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<Self>() {
            return Ok(user.clone());
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(access_token) = credentials(&jar).access_token else {
            return Err(StatusCode::UNAUTHORIZED);
        };

        let app_state = AppState::from_ref(state);
        let identity = app_state
            .gateway
            .user(&access_token)
            .await
            .map_err(|e| AuthErrorKind::from(e).status())?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { identity, access_token })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

// =============================================================================
// ERRORS
// =============================================================================

impl AuthErrorKind {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NetworkFailure => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthErrorKind {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

const SIGN_IN_PAGE: &str = r#"<!doctype html>
<title>Sign in · WishKart</title>
<form method="post" action="/auth/signin">
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button type="submit">Sign in</button>
</form>
<a href="/auth/signup">Create an account</a>
"#;

const SIGN_UP_PAGE: &str = r#"<!doctype html>
<title>Sign up · WishKart</title>
<form method="post" action="/auth/signup">
  <input name="full_name" placeholder="Full name" required>
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <input name="confirm_password" type="password" placeholder="Confirm password">
  <button type="submit">Create account</button>
</form>
<a href="/auth/signin">Already have an account?</a>
"#;

/// `GET /auth/signin`
pub async fn sign_in_page() -> Html<&'static str> {
    Html(SIGN_IN_PAGE)
}

/// `GET /auth/signup`
pub async fn sign_up_page() -> Html<&'static str> {
    Html(SIGN_UP_PAGE)
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// `POST /auth/signin`: verify credentials, set session cookies, go to the dashboard.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Result<Response, AuthErrorKind> {
    let email = validate::validate_sign_in(&form.email, &form.password)?;
    let session = state
        .gateway
        .password_grant(&email, &form.password)
        .await
        .inspect_err(|e| warn!(error = %e, "sign in failed"))?;

    info!(user_id = %session.user.id, "user signed in");
    let jar = set_session_cookies(jar, &session, state.config.cookie_secure);
    Ok((jar, Redirect::to(LANDING_PATH)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// `POST /auth/signup`: create the account; sign in at once or ask for email confirmation.
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> Result<Response, AuthErrorKind> {
    if let Some(confirmation) = form.confirm_password.as_deref() {
        validate::confirm_password(&form.password, confirmation)?;
    }
    let input = validate::validate_sign_up(&form.email, &form.password, &form.full_name)?;
    let metadata = SignUpMetadata { full_name: input.display_name };

    let response = state
        .gateway
        .register(&input.email, &form.password, &metadata)
        .await
        .inspect_err(|e| warn!(error = %e, "sign up failed"))?;

    let Some(session) = response.session else {
        info!(user_id = %response.user.id, "sign up pending email confirmation");
        let body = Json(serde_json::json!({
            "status": "confirmation_pending",
            "message": "We've sent you a confirmation link. Please check your email to complete signup.",
        }));
        return Ok((StatusCode::ACCEPTED, body).into_response());
    };

    match profile::wait_for_profile(
        state.data.as_ref(),
        &session.access_token,
        session.user.id,
        state.config.profile_poll,
    )
    .await
    {
        Ok(Some(_)) => {}
        Ok(None) => warn!(user_id = %session.user.id, "account created without a visible profile"),
        Err(e) => warn!(error = %e, user_id = %session.user.id, "profile check failed"),
    }

    info!(user_id = %session.user.id, "account created");
    let jar = set_session_cookies(jar, &session, state.config.cookie_secure);
    Ok((jar, Redirect::to(LANDING_PATH)).into_response())
}

/// `POST /api/auth/signout`: revoke the session and clear cookies. Idempotent.
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AuthErrorKind> {
    let secure = state.config.cookie_secure;
    let credentials = credentials(&jar);
    if !credentials.is_present() {
        return Ok(Redirect::to("/").into_response());
    }

    if let Some(access_token) = credentials.access_token.as_deref() {
        state
            .gateway
            .revoke(access_token)
            .await
            .inspect_err(|e| warn!(error = %e, "sign out failed"))?;
    }

    info!("user signed out");
    Ok((clear_session_cookies(jar, secure), Redirect::to("/")).into_response())
}

/// `GET /api/auth/me`: return the current identity.
pub async fn me(auth: AuthUser) -> Json<Identity> {
    Json(auth.identity)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
