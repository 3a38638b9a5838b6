//! Route guard: per-request access decision for every page.
//!
//! DESIGN
//! ======
//! The decision itself is the pure [`PathRules::decide`]; everything that
//! touches the network lives in [`verify`]. The axum layer [`route_guard`]
//! glues the two together: read session cookies, verify them, decide, then
//! either redirect or run the handler with the verified [`AuthUser`] attached.
//!
//! A verification that errors (network, 5xx) is `Unavailable` and the request
//! is allowed through. Handlers that need a user still reject it themselves.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use crate::routes::auth::{self as auth_routes, AuthUser, Credentials};
use crate::session_store::{AuthGateway, Identity, Session};
use crate::state::AppState;

pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const LANDING_PATH: &str = "/dashboard";

/// Outcome of checking a request's credentials with the Session Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    Valid,
    Invalid,
    /// The check itself failed; the guard fails open.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// Path classification used by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRules {
    /// Sign-in and sign-up pages live under this segment.
    pub auth_entry: &'static str,
    pub public_exact: Vec<&'static str>,
    pub public_prefixes: Vec<&'static str>,
    /// Static assets and infrastructure paths the guard never looks at.
    pub bypass_exact: Vec<&'static str>,
    pub bypass_prefixes: Vec<&'static str>,
    pub sign_in: &'static str,
    pub landing: &'static str,
}

impl Default for PathRules {
    fn default() -> Self {
        Self {
            auth_entry: "/auth",
            public_exact: vec!["/"],
            public_prefixes: vec!["/registry/"],
            bypass_exact: vec!["/favicon.ico", "/manifest.json", "/robots.txt", "/healthz", "/api/auth/signout"],
            bypass_prefixes: vec!["/pkg/", "/icon-"],
            sign_in: SIGN_IN_PATH,
            landing: LANDING_PATH,
        }
    }
}

impl PathRules {
    /// `/auth` itself or anything below it; `/authors` is not an auth path.
    #[must_use]
    pub fn is_auth_entry(&self, path: &str) -> bool {
        path.strip_prefix(self.auth_entry)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.is_auth_entry(path)
            || self.public_exact.contains(&path)
            || self.public_prefixes.iter().any(|p| path.starts_with(p))
    }

    #[must_use]
    pub fn bypasses(&self, path: &str) -> bool {
        self.bypass_exact.contains(&path) || self.bypass_prefixes.iter().any(|p| path.starts_with(p))
    }

    /// First matching rule wins:
    /// 1. invalid session on a non-public path: sign in
    /// 2. valid session on an auth-entry path: landing page
    /// 3. allow
    #[must_use]
    pub fn decide(&self, path: &str, check: SessionCheck) -> GuardDecision {
        match check {
            SessionCheck::Invalid if !self.is_public(path) => GuardDecision::Redirect(self.sign_in),
            SessionCheck::Valid if self.is_auth_entry(path) => GuardDecision::Redirect(self.landing),
            _ => GuardDecision::Allow,
        }
    }
}

/// Result of [`verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub check: SessionCheck,
    pub identity: Option<Identity>,
    /// Access token the identity was verified with.
    pub access_token: Option<String>,
    /// Set when the access token had to be refreshed; the caller must persist it.
    pub refreshed: Option<Session>,
}

impl Verification {
    fn invalid() -> Self {
        Self { check: SessionCheck::Invalid, identity: None, access_token: None, refreshed: None }
    }

    fn unavailable() -> Self {
        Self { check: SessionCheck::Unavailable, identity: None, access_token: None, refreshed: None }
    }
}

/// Validate request credentials, refreshing an expired access token if the
/// refresh token is still accepted.
pub async fn verify(gateway: &dyn AuthGateway, credentials: &Credentials) -> Verification {
    if let Some(access_token) = credentials.access_token.as_deref() {
        match gateway.user(access_token).await {
            Ok(Some(identity)) => {
                return Verification {
                    check: SessionCheck::Valid,
                    identity: Some(identity),
                    access_token: Some(access_token.to_owned()),
                    refreshed: None,
                };
            }
            Ok(None) => debug!("access token rejected; trying refresh"),
            Err(e) => {
                warn!(error = %e, "session check unavailable");
                return Verification::unavailable();
            }
        }
    }

    let Some(refresh_token) = credentials.refresh_token.as_deref() else {
        return Verification::invalid();
    };
    match gateway.refresh(refresh_token).await {
        Ok(Some(session)) => {
            debug!(user_id = %session.user.id, "session refreshed by guard");
            Verification {
                check: SessionCheck::Valid,
                identity: Some(session.user.clone()),
                access_token: Some(session.access_token.clone()),
                refreshed: Some(session),
            }
        }
        Ok(None) => Verification::invalid(),
        Err(e) => {
            warn!(error = %e, "session refresh unavailable");
            Verification::unavailable()
        }
    }
}

/// Axum middleware; install with `middleware::from_fn_with_state`.
pub async fn route_guard(State(state): State<AppState>, jar: CookieJar, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if state.rules.bypasses(&path) {
        return next.run(req).await;
    }

    let credentials = auth_routes::credentials(&jar);
    let verification = verify(state.gateway.as_ref(), &credentials).await;
    let stale = verification.check == SessionCheck::Invalid && credentials.is_present();
    let secure = state.config.cookie_secure;

    let jar = match (&verification.refreshed, stale) {
        (Some(session), _) => auth_routes::set_session_cookies(jar, session, secure),
        (None, true) => auth_routes::clear_session_cookies(jar, secure),
        (None, false) => jar,
    };

    match state.rules.decide(&path, verification.check) {
        GuardDecision::Redirect(to) => {
            debug!(%path, to, check = ?verification.check, "guard redirect");
            (jar, Redirect::temporary(to)).into_response()
        }
        GuardDecision::Allow => {
            if let (Some(identity), Some(access_token)) = (verification.identity, verification.access_token) {
                req.extensions_mut()
                    .insert(AuthUser { identity, access_token });
            }
            let response = next.run(req).await;
            if auth_routes::sets_session_cookie(&response) {
                // The handler just signed someone in or out; its cookies win.
                return response;
            }
            (jar, response).into_response()
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
