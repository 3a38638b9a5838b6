use std::sync::Arc;

use wishkart::config::AppConfig;
use wishkart::data::RestDataStore;
use wishkart::routes;
use wishkart::session_store::AuthApi;
use wishkart::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let gateway = AuthApi::new(&config.supabase).expect("auth client init failed");
    let data = RestDataStore::new(&config.supabase).expect("data client init failed");
    let port = config.port;

    let state = AppState::new(Arc::new(gateway), Arc::new(data), config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "wishkart listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // No handler means no graceful stop; keep serving until killed.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        })
        .await
        .expect("server failed");
}
