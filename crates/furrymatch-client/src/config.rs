//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so a client can start against a local
//! backend with zero configuration.

use std::time::Duration;

use furrymatch_shared::constants::DEFAULT_POLL_INTERVAL_SECS;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend, always ending in `/`.
    /// Env: `FURRYMATCH_API_URL`
    /// Default: `http://localhost:8080/`
    pub api_url: String,

    /// Bearer token sent with every request.
    /// Env: `FURRYMATCH_API_TOKEN`
    /// Default: none.
    pub api_token: Option<String>,

    /// Refresh cadence for open threads and the unread indicator.
    /// Env: `FURRYMATCH_POLL_INTERVAL_SECS`
    /// Default: 5 seconds.
    pub poll_interval: Duration,

    /// Per-request timeout.
    /// Env: `FURRYMATCH_REQUEST_TIMEOUT_SECS`
    /// Default: 10 seconds.
    pub request_timeout: Duration,

    /// Buffered events per subscriber on the session bus.
    /// Env: `FURRYMATCH_EVENT_CAPACITY`
    /// Default: 64.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/".to_string(),
            api_token: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(10),
            event_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("FURRYMATCH_API_URL") {
            config.api_url = normalize_base_url(&url);
        }

        if let Some(token) = lookup("FURRYMATCH_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }

        if let Some(val) = lookup("FURRYMATCH_POLL_INTERVAL_SECS") {
            match parse_secs(&val) {
                Some(d) => config.poll_interval = d,
                None => tracing::warn!(
                    value = %val,
                    "Invalid FURRYMATCH_POLL_INTERVAL_SECS, using default"
                ),
            }
        }

        if let Some(val) = lookup("FURRYMATCH_REQUEST_TIMEOUT_SECS") {
            match parse_secs(&val) {
                Some(d) => config.request_timeout = d,
                None => tracing::warn!(
                    value = %val,
                    "Invalid FURRYMATCH_REQUEST_TIMEOUT_SECS, using default"
                ),
            }
        }

        if let Some(val) = lookup("FURRYMATCH_EVENT_CAPACITY") {
            if let Ok(n) = val.parse::<usize>() {
                if n > 0 {
                    config.event_capacity = n;
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Whole seconds, strictly positive.
fn parse_secs(val: &str) -> Option<Duration> {
    match val.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(Duration::from_secs(n)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(config.api_url.ends_with('/'));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("FURRYMATCH_API_URL", "https://furrymatch.example/api-root"),
            ("FURRYMATCH_API_TOKEN", "abc"),
            ("FURRYMATCH_POLL_INTERVAL_SECS", "2"),
        ]));
        assert_eq!(config.api_url, "https://furrymatch.example/api-root/");
        assert_eq!(config.api_token.as_deref(), Some("abc"));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("FURRYMATCH_POLL_INTERVAL_SECS", "0"),
            ("FURRYMATCH_REQUEST_TIMEOUT_SECS", "soon"),
            ("FURRYMATCH_API_TOKEN", ""),
        ]));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.api_token.is_none());
    }
}
