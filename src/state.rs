//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the route guard via the
//! `State` extractor. It holds the auth gateway and data store handles, both
//! constructed once in `main`; nothing here is a module-level global.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::data::DataStore;
use crate::guard::PathRules;
use crate::session_store::AuthGateway;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn AuthGateway>,
    pub data: Arc<dyn DataStore>,
    pub config: Arc<AppConfig>,
    pub rules: Arc<PathRules>,
}

impl AppState {
    #[must_use]
    pub fn new(gateway: Arc<dyn AuthGateway>, data: Arc<dyn DataStore>, config: AppConfig) -> Self {
        Self { gateway, data, config: Arc::new(config), rules: Arc::new(PathRules::default()) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
