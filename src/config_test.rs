use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

const BASE: &[(&str, &str)] =
    &[("WISHKART_SUPABASE_URL", "https://proj.supabase.co/"), ("WISHKART_SUPABASE_ANON_KEY", "anon-key")];

fn with_base(extra: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let mut pairs = BASE.to_vec();
    pairs.extend_from_slice(extra);
    lookup_from(&pairs)
}

// =============================================================================
// parse_bool
// =============================================================================

#[test]
fn parse_bool_true_variants() {
    for val in ["1", "true", "yes", "on", "TRUE", "  On  "] {
        assert_eq!(parse_bool(val), Some(true), "expected true for {val:?}");
    }
}

#[test]
fn parse_bool_false_variants() {
    for val in ["0", "false", "no", "off", "False"] {
        assert_eq!(parse_bool(val), Some(false), "expected false for {val:?}");
    }
}

#[test]
fn parse_bool_invalid_returns_none() {
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}

// =============================================================================
// SupabaseConfig
// =============================================================================

#[test]
fn supabase_config_trims_url_and_defaults_timeout() {
    let cfg = SupabaseConfig::from_lookup(&with_base(&[])).unwrap();
    assert_eq!(cfg.url, "https://proj.supabase.co");
    assert_eq!(cfg.anon_key, "anon-key");
    assert_eq!(cfg.http_timeout_secs, DEFAULT_AUTH_HTTP_TIMEOUT_SECS);
}

#[test]
fn supabase_config_missing_url_errors() {
    let err = SupabaseConfig::from_lookup(&lookup_from(&[("WISHKART_SUPABASE_ANON_KEY", "k")])).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "WISHKART_SUPABASE_URL" });
}

#[test]
fn supabase_config_blank_key_counts_as_missing() {
    let lookup = lookup_from(&[("WISHKART_SUPABASE_URL", "https://x.co"), ("WISHKART_SUPABASE_ANON_KEY", "   ")]);
    let err = SupabaseConfig::from_lookup(&lookup).unwrap_err();
    assert_eq!(err, ConfigError::Missing { var: "WISHKART_SUPABASE_ANON_KEY" });
}

#[test]
fn supabase_config_rejects_non_http_url() {
    let lookup = lookup_from(&[("WISHKART_SUPABASE_URL", "proj.supabase.co"), ("WISHKART_SUPABASE_ANON_KEY", "k")]);
    let err = SupabaseConfig::from_lookup(&lookup).unwrap_err();
    assert!(err.to_string().contains("WISHKART_SUPABASE_URL"));
}

// =============================================================================
// AppConfig
// =============================================================================

#[test]
fn app_config_defaults() {
    let cfg = AppConfig::from_lookup(&with_base(&[])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(!cfg.cookie_secure);
    assert_eq!(cfg.profile_poll.attempts, DEFAULT_PROFILE_POLL_ATTEMPTS);
    assert_eq!(cfg.profile_poll.base_delay, Duration::from_millis(DEFAULT_PROFILE_POLL_BASE_MS));
    assert_eq!(cfg.profile_poll.max_delay, Duration::from_millis(DEFAULT_PROFILE_POLL_MAX_MS));
}

#[test]
fn app_config_parses_overrides() {
    let cfg = AppConfig::from_lookup(&with_base(&[
        ("PORT", "8080"),
        ("COOKIE_SECURE", "yes"),
        ("PROFILE_POLL_ATTEMPTS", "3"),
        ("PROFILE_POLL_BASE_MS", "50"),
        ("PROFILE_POLL_MAX_MS", "400"),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 8080);
    assert!(cfg.cookie_secure);
    assert_eq!(cfg.profile_poll.attempts, 3);
    assert_eq!(cfg.profile_poll.base_delay, Duration::from_millis(50));
    assert_eq!(cfg.profile_poll.max_delay, Duration::from_millis(400));
}

#[test]
fn app_config_infers_secure_cookies_from_https_site() {
    let cfg = AppConfig::from_lookup(&with_base(&[("WISHKART_SITE_URL", "https://wishkart.app")])).unwrap();
    assert!(cfg.cookie_secure);
}

#[test]
fn app_config_explicit_cookie_flag_wins_over_site_url() {
    let cfg = AppConfig::from_lookup(&with_base(&[
        ("WISHKART_SITE_URL", "https://wishkart.app"),
        ("COOKIE_SECURE", "off"),
    ]))
    .unwrap();
    assert!(!cfg.cookie_secure);
}

#[test]
fn app_config_invalid_port_errors() {
    let err = AppConfig::from_lookup(&with_base(&[("PORT", "eighty")])).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "PORT", value: "eighty".into() });
}

#[test]
fn app_config_max_delay_never_below_base() {
    let cfg = AppConfig::from_lookup(&with_base(&[("PROFILE_POLL_BASE_MS", "500"), ("PROFILE_POLL_MAX_MS", "100")]))
        .unwrap();
    assert_eq!(cfg.profile_poll.max_delay, Duration::from_millis(500));
}
