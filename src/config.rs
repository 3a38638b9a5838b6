//! Application configuration parsed from environment variables.
//!
//! `from_env` reads the process environment (after `.env` has been loaded by
//! the binary); `from_lookup` takes any key -> value function so tests never
//! touch process-global state.

use std::time::Duration;

use crate::auth::profile::ProfilePoll;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_AUTH_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROFILE_POLL_ATTEMPTS: u32 = 5;
pub const DEFAULT_PROFILE_POLL_BASE_MS: u64 = 200;
pub const DEFAULT_PROFILE_POLL_MAX_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project base URL, without a trailing slash.
    pub url: String,
    /// Public (anon) API key; row-level security applies to every request.
    pub anon_key: String,
    pub http_timeout_secs: u64,
}

impl SupabaseConfig {
    /// Required:
    /// - `WISHKART_SUPABASE_URL`
    /// - `WISHKART_SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `AUTH_HTTP_TIMEOUT_SECS`: default 10
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = required(lookup, "WISHKART_SUPABASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid { var: "WISHKART_SUPABASE_URL", value: url });
        }
        let anon_key = required(lookup, "WISHKART_SUPABASE_ANON_KEY")?;
        let http_timeout_secs = parse_or(lookup, "AUTH_HTTP_TIMEOUT_SECS", DEFAULT_AUTH_HTTP_TIMEOUT_SECS)?;
        Ok(Self { url, anon_key, http_timeout_secs })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub supabase: SupabaseConfig,
    /// Mark session cookies `Secure`.
    pub cookie_secure: bool,
    pub profile_poll: ProfilePoll,
}

impl AppConfig {
    /// Optional on top of [`SupabaseConfig`]:
    /// - `PORT`: default 3000
    /// - `COOKIE_SECURE`: bool; default inferred from `WISHKART_SITE_URL` being https
    /// - `PROFILE_POLL_ATTEMPTS`, `PROFILE_POLL_BASE_MS`, `PROFILE_POLL_MAX_MS`
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let supabase = SupabaseConfig::from_lookup(lookup)?;
        let port = parse_or(lookup, "PORT", DEFAULT_PORT)?;

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE", value: raw })?,
            None => lookup("WISHKART_SITE_URL").is_some_and(|url| url.starts_with("https://")),
        };

        let attempts = parse_or(lookup, "PROFILE_POLL_ATTEMPTS", DEFAULT_PROFILE_POLL_ATTEMPTS)?;
        let base_ms = parse_or(lookup, "PROFILE_POLL_BASE_MS", DEFAULT_PROFILE_POLL_BASE_MS)?;
        let max_ms = parse_or(lookup, "PROFILE_POLL_MAX_MS", DEFAULT_PROFILE_POLL_MAX_MS)?;
        let profile_poll = ProfilePoll {
            attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms.max(base_ms)),
        };

        Ok(Self { port, supabase, cookie_secure, profile_poll })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }
}

/// Parse the usual spellings of a boolean flag.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<String, ConfigError> {
    lookup(var)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
