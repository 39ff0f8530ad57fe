//! Configuration options for the tracker client

use std::time::Duration;
use url::Url;

use crate::error::Error;

/// Value sent in the `X-Client-Info` header
pub const DEFAULT_CLIENT_INFO: &str = concat!("habit-sync/", env!("CARGO_PKG_VERSION"));

/// Configuration options for the tracker client
#[derive(Debug, Clone)]
pub struct TrackerOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// The database schema
    pub db_schema: String,

    /// The client info header value
    pub client_info: String,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            db_schema: "public".to_string(),
            client_info: DEFAULT_CLIENT_INFO.to_string(),
        }
    }
}

impl TrackerOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the database schema
    pub fn with_db_schema(mut self, value: &str) -> Self {
        self.db_schema = value.to_string();
        self
    }

    /// Set the client info header value
    pub fn with_client_info(mut self, value: &str) -> Self {
        self.client_info = value.to_string();
        self
    }
}

/// Connection settings for the Supabase project backing the tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub url: Url,
    pub anon_key: String,
    pub options: TrackerOptions,
}

impl TrackerConfig {
    /// Creates a new configuration, validating the URL.
    pub fn new(url_str: &str, anon_key: &str) -> Result<Self, Error> {
        let url = Url::parse(url_str)?;
        if anon_key.is_empty() {
            return Err(Error::config("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
            options: TrackerOptions::default(),
        })
    }

    /// Reads `SUPABASE_URL` and `SUPABASE_ANON_KEY`, loading a `.env` file first if present.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let url_str = std::env::var("SUPABASE_URL")
            .map_err(|_| Error::config("SUPABASE_URL environment variable not found"))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| Error::config("SUPABASE_ANON_KEY environment variable not found"))?;
        Self::new(&url_str, &anon_key)
    }

    /// Replace the client options
    pub fn with_options(mut self, options: TrackerOptions) -> Self {
        self.options = options;
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_key() {
        let result = TrackerConfig::new("https://example.supabase.co", "");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let result = TrackerConfig::new("not a url", "anon");
        assert!(matches!(result, Err(Error::Url(_))));
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let config = TrackerConfig::new("https://example.supabase.co/", "anon").unwrap();
        assert_eq!(config.base_url(), "https://example.supabase.co");
    }

    #[test]
    fn test_option_builders() {
        let options = TrackerOptions::default()
            .with_db_schema("tracker")
            .with_request_timeout(None);
        assert_eq!(options.db_schema, "tracker");
        assert!(options.request_timeout.is_none());
        assert!(options.client_info.starts_with("habit-sync/"));
    }
}
