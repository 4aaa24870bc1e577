//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables and exposes the
//! process-wide options store the webhook reads its production secret from.

use std::env;
use tracing::warn;
use url::Url;

/// Option key holding the production webhook secret.
pub const SECRET_KEY_OPTION: &str = "cloudflare.secret-key";

/// Base URL used for DSNs when `DSN_BASE_URL` is unset or invalid.
pub const DEFAULT_DSN_BASE_URL: &str = "https://sentry.io";

/// Read-only, process-wide key/value options.
pub trait OptionsStore: Send + Sync {
    /// Look up an option by key.
    fn get(&self, key: &str) -> Option<String>;
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared secret for webhooks signed with key variant "1"
    pub cloudflare_secret_key: Option<String>,

    /// Optional JSON fixture backing the in-memory directory
    pub directory_path: Option<String>,

    /// Base URL that public DSNs are derived from
    pub dsn_base_url: Url,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            cloudflare_secret_key: parse_non_empty("CLOUDFLARE_SECRET_KEY"),

            directory_path: parse_non_empty("DIRECTORY_PATH"),

            dsn_base_url: parse_url("DSN_BASE_URL"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            cloudflare_secret_key: None,
            directory_path: None,
            dsn_base_url: default_dsn_base_url(),
        }
    }
}

impl OptionsStore for Config {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            SECRET_KEY_OPTION => self.cloudflare_secret_key.clone(),
            _ => None,
        }
    }
}

fn default_dsn_base_url() -> Url {
    Url::parse(DEFAULT_DSN_BASE_URL).expect("default DSN base URL is valid")
}

/// Read a variable, treating blank values as unset.
fn parse_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a URL variable, falling back to the default DSN base.
fn parse_url(name: &str) -> Url {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default_dsn_base_url(),
    };

    match Url::parse(raw.trim()) {
        Ok(url) if url.has_host() => url,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid URL, using default");
            default_dsn_base_url()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_non_empty_blank() {
        env::set_var("TEST_BLANK_SECRET", "   ");
        assert_eq!(parse_non_empty("TEST_BLANK_SECRET"), None);
        env::remove_var("TEST_BLANK_SECRET");
    }

    #[test]
    fn test_parse_non_empty_trims() {
        env::set_var("TEST_PADDED_SECRET", " s3cr3t ");
        assert_eq!(parse_non_empty("TEST_PADDED_SECRET"), Some("s3cr3t".to_string()));
        env::remove_var("TEST_PADDED_SECRET");
    }

    #[test]
    fn test_parse_url_valid() {
        env::set_var("TEST_DSN_URL", "http://localhost:9000");
        let url = parse_url("TEST_DSN_URL");
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(9000));
        env::remove_var("TEST_DSN_URL");
    }

    #[test]
    fn test_parse_url_invalid_uses_default() {
        env::set_var("TEST_BAD_DSN_URL", "not a url");
        assert_eq!(parse_url("TEST_BAD_DSN_URL").as_str(), "https://sentry.io/");
        env::remove_var("TEST_BAD_DSN_URL");
    }

    #[test]
    fn test_options_store_secret() {
        let config = Config {
            cloudflare_secret_key: Some("prod-secret".to_string()),
            ..Config::default()
        };
        assert_eq!(config.get(SECRET_KEY_OPTION), Some("prod-secret".to_string()));
        assert_eq!(config.get("unknown.option"), None);
    }
}
