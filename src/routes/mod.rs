//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every route sits behind the route guard layer, which redirects signed-out
//! visitors away from private pages and signed-in users away from the auth
//! entry pages. Static asset and infrastructure paths bypass it.

pub mod auth;
pub mod pages;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::guard;
use crate::state::AppState;

/// Full application router with the guard, CORS and request tracing applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(pages::landing))
        .route("/auth/signin", get(auth::sign_in_page).post(auth::sign_in))
        .route("/auth/signup", get(auth::sign_up_page).post(auth::sign_up))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/me", get(auth::me))
        .route("/dashboard", get(pages::dashboard))
        .route("/registry/{id}", get(pages::registry))
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
