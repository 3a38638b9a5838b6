//! REST client for the hosted auth service.
//!
//! ERROR HANDLING
//! ==============
//! Every non-2xx answer is classified once, in [`classify_status`], so callers
//! only ever see [`StoreError`] variants. Token-validity answers (401/403 on
//! `/user`, 400 on refresh) are not errors: they map to `Ok(None)`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::debug;

use super::types::{RawErrorBody, RawSession, RawUser, unix_now};
use super::{AuthGateway, Identity, Session, SignUpMetadata, SignUpResponse, StoreError};
use crate::config::SupabaseConfig;

/// Error codes the service uses for a rejected email/password pair.
const CREDENTIAL_ERROR_CODES: &[&str] = &["invalid_grant", "invalid_credentials"];

/// Stateless client for `/auth/v1/*`.
#[derive(Clone)]
pub struct AuthApi {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl AuthApi {
    /// Build the client from typed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &SupabaseConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self { http, base_url: config.url.trim_end_matches('/').to_owned(), anon_key: config.anon_key.clone() })
    }

    fn endpoint(&self, path: &str) -> String {
        auth_endpoint(&self.base_url, path)
    }

    fn with_key(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
    }

    async fn send(req: RequestBuilder) -> Result<Response, StoreError> {
        req.send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn read_session(resp: Response) -> Result<Session, StoreError> {
        let raw: RawSession = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(raw.into_session(unix_now()))
    }
}

/// Join the service base URL with an auth path.
pub(crate) fn auth_endpoint(base_url: &str, path: &str) -> String {
    format!("{}/auth/v1/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a non-success status and its body onto a [`StoreError`].
pub(crate) fn classify_status(status: StatusCode, body: &str) -> StoreError {
    let parsed: RawErrorBody = serde_json::from_str(body).unwrap_or_default();
    if status.is_server_error() {
        return StoreError::Unavailable(status.as_u16());
    }
    if status == StatusCode::BAD_REQUEST && parsed.code().is_some_and(|c| CREDENTIAL_ERROR_CODES.contains(&c)) {
        return StoreError::InvalidCredentials(parsed.message());
    }
    let message = if body.is_empty() { status.to_string() } else { parsed.message() };
    StoreError::Rejected { status: status.as_u16(), message }
}

async fn error_from(resp: Response) -> StoreError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    classify_status(status, &body)
}

/// Split a sign-up body into user + optional session.
///
/// With auto-confirm the service answers with a full session; with email
/// confirmation it answers with the bare user (or `{ "user": ... }`).
pub(crate) fn parse_sign_up(body: serde_json::Value) -> Result<SignUpResponse, StoreError> {
    if body.get("access_token").is_some() {
        let raw: RawSession = serde_json::from_value(body).map_err(|e| StoreError::Decode(e.to_string()))?;
        let session = raw.into_session(unix_now());
        return Ok(SignUpResponse { user: session.user.clone(), session: Some(session) });
    }
    let user_value = match body.get("user") {
        Some(user) if !user.is_null() => user.clone(),
        _ => body,
    };
    let raw: RawUser = serde_json::from_value(user_value).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(SignUpResponse { user: raw.into(), session: None })
}

#[async_trait]
impl AuthGateway for AuthApi {
    async fn password_grant(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let req = self
            .http
            .post(self.endpoint("token?grant_type=password"))
            .json(&json!({ "email": email, "password": password }));
        let resp = Self::send(self.with_key(req)).await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        Self::read_session(resp).await
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpResponse, StoreError> {
        let req = self
            .http
            .post(self.endpoint("signup"))
            .json(&json!({ "email": email, "password": password, "data": metadata }));
        let resp = Self::send(self.with_key(req)).await?;
        if !resp.status().is_success() {
            return Err(error_from(resp).await);
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        parse_sign_up(body)
    }

    async fn revoke(&self, access_token: &str) -> Result<(), StoreError> {
        let req = self
            .http
            .post(self.endpoint("logout"))
            .bearer_auth(access_token);
        let resp = Self::send(self.with_key(req)).await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            debug!(%status, "session revoked");
            return Ok(());
        }
        Err(error_from(resp).await)
    }

    async fn user(&self, access_token: &str) -> Result<Option<Identity>, StoreError> {
        let req = self.http.get(self.endpoint("user")).bearer_auth(access_token);
        let resp = Self::send(self.with_key(req)).await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_from(resp).await);
        }
        let raw: RawUser = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(raw.into()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, StoreError> {
        let req = self
            .http
            .post(self.endpoint("token?grant_type=refresh_token"))
            .json(&json!({ "refresh_token": refresh_token }));
        let resp = Self::send(self.with_key(req)).await?;
        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_from(resp).await);
        }
        Self::read_session(resp).await.map(Some)
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
