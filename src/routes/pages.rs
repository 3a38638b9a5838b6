//! Page routes: landing, dashboard, public registry view.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::data::{DataError, Profile, RegistryView};
use crate::session_store::Identity;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Landing {
    pub app: &'static str,
    pub signed_in: bool,
}

/// `GET /`: public landing page.
pub async fn landing(auth: Option<AuthUser>) -> Json<Landing> {
    Json(Landing { app: "WishKart", signed_in: auth.is_some() })
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user: Identity,
    pub profile: Option<Profile>,
}

/// `GET /dashboard`: the signed-in user and their profile row.
pub async fn dashboard(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Dashboard>, StatusCode> {
    let profile = state
        .data
        .fetch_profile(&auth.access_token, auth.identity.id)
        .await
        .map_err(|e| data_status(&e))?;
    Ok(Json(Dashboard { user: auth.identity, profile }))
}

/// `GET /registry/{id}`: a public registry and its gifts; anyone may view it.
pub async fn registry(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<RegistryView>, StatusCode> {
    state
        .data
        .fetch_public_registry(id)
        .await
        .map_err(|e| data_status(&e))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

fn data_status(err: &DataError) -> StatusCode {
    tracing::error!(error = %err, "data store request failed");
    match err {
        DataError::Request(_) => StatusCode::BAD_GATEWAY,
        DataError::Status { status, .. } if *status >= 500 => StatusCode::BAD_GATEWAY,
        DataError::Status { .. } | DataError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
