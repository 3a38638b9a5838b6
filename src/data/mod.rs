//! Data Store reads: profiles and public registries.
//!
//! SYSTEM CONTEXT
//! ==============
//! Rows live in the hosted relational store behind its REST layer. Every
//! request carries a bearer token: the signed-in user's access token for
//! owner-scoped rows, the anon key for public registries. Row-level security
//! on the store decides visibility; this module never filters by owner itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SupabaseConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("data request failed: {0}")]
    Request(String),
    #[error("data store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("data response parse failed: {0}")]
    Parse(String),
}

// =============================================================================
// ROWS
// =============================================================================

/// Profile row created by the store when an account is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Wedding,
    #[serde(rename = "Baby shower")]
    BabyShower,
    Birthday,
    Housewarming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub event_date: Option<String>,
    pub custom_url: Option<String>,
    pub is_public: bool,
    pub cover_image_url: Option<String>,
}

/// Gift as shown on the public view. Reserver contact details are not selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gift {
    pub id: Uuid,
    pub registry_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub priority: Priority,
    pub is_reserved: bool,
}

/// A public registry together with its gifts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryView {
    pub registry: Registry,
    pub gifts: Vec<Gift>,
}

// =============================================================================
// STORE
// =============================================================================

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Profile row for `user_id`, read with the user's own access token.
    async fn fetch_profile(&self, access_token: &str, user_id: Uuid) -> Result<Option<Profile>, DataError>;

    /// A registry and its gifts, only if the registry is public.
    async fn fetch_public_registry(&self, registry_id: Uuid) -> Result<Option<RegistryView>, DataError>;
}

const GIFT_COLUMNS: &str = "id,registry_id,title,description,price,product_url,image_url,priority,is_reserved";
const REGISTRY_COLUMNS: &str =
    "id,user_id,title,description,event_type,event_date,custom_url,is_public,cover_image_url";

/// [`DataStore`] over the hosted REST layer (`/rest/v1`).
#[derive(Clone)]
pub struct RestDataStore {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl RestDataStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SupabaseConfig) -> Result<Self, DataError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| DataError::Request(e.to_string()))?;
        Ok(Self { http, base_url: config.url.trim_end_matches('/').to_owned(), anon_key: config.anon_key.clone() })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
        bearer: &str,
    ) -> Result<Vec<T>, DataError> {
        let resp = self
            .http
            .get(rest_endpoint(&self.base_url, table))
            .query(query)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| DataError::Request(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(DataError::Status { status: status.as_u16(), body });
        }
        resp.json::<Vec<T>>()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))
    }
}

pub(crate) fn rest_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'))
}

/// `column=eq.value` filter pair.
pub(crate) fn eq_filter(column: &'static str, value: impl std::fmt::Display) -> (&'static str, String) {
    (column, format!("eq.{value}"))
}

#[async_trait]
impl DataStore for RestDataStore {
    async fn fetch_profile(&self, access_token: &str, user_id: Uuid) -> Result<Option<Profile>, DataError> {
        let rows: Vec<Profile> = self
            .select(
                "profiles",
                &[("select", "id,email,full_name,avatar_url".to_owned()), eq_filter("id", user_id)],
                access_token,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_public_registry(&self, registry_id: Uuid) -> Result<Option<RegistryView>, DataError> {
        let registries: Vec<Registry> = self
            .select(
                "registries",
                &[
                    ("select", REGISTRY_COLUMNS.to_owned()),
                    eq_filter("id", registry_id),
                    eq_filter("is_public", true),
                ],
                &self.anon_key,
            )
            .await?;
        let Some(registry) = registries.into_iter().next() else {
            return Ok(None);
        };

        let gifts: Vec<Gift> = self
            .select(
                "gifts",
                &[
                    ("select", GIFT_COLUMNS.to_owned()),
                    eq_filter("registry_id", registry_id),
                    ("order", "created_at.asc".to_owned()),
                ],
                &self.anon_key,
            )
            .await?;
        Ok(Some(RegistryView { registry, gifts }))
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "data_test.rs"]
mod tests;
