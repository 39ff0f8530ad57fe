//! Error handling for the tracker

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Error body returned by PostgREST for a rejected request
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl ApiErrorDetails {
    /// Details carrying only a code and a message
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.to_string()),
            message: Some(message.into()),
            details: None,
            hint: None,
        }
    }
}

impl fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Unified error type for the tracker
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Access token decoding errors
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The store rejected the request
    #[error("API error: {details} (Status: {status})")]
    Api {
        status: reqwest::StatusCode,
        details: ApiErrorDetails,
    },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A record addressed by id does not exist for the current owner
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before reaching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new API error
    pub fn api(status: reqwest::StatusCode, details: ApiErrorDetails) -> Self {
        Error::Api { status, details }
    }

    /// Create a new authentication error
    pub fn auth<T: fmt::Display>(msg: T) -> Self {
        Error::Auth(msg.to_string())
    }

    /// Create a new not found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    /// Create a new invalid input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidInput(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// PostgreSQL / PostgREST error code, when the store reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { details, .. } => details.code.as_deref(),
            _ => None,
        }
    }

    /// HTTP status reported by the store, when there was one
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(err) => err.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_api_error_display() {
        let err = Error::api(
            StatusCode::CONFLICT,
            ApiErrorDetails::new("23505", "duplicate key value violates unique constraint"),
        );
        assert_eq!(
            err.to_string(),
            "API error: Code: 23505, Message: duplicate key value violates unique constraint \
             (Status: 409 Conflict)"
        );
        assert_eq!(err.code(), Some("23505"));
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    }

    #[test]
    fn test_details_parse_partial_body() {
        let details: ApiErrorDetails =
            serde_json::from_str(r#"{"message":"JWT expired","code":"PGRST301"}"#).unwrap();
        assert_eq!(details.code.as_deref(), Some("PGRST301"));
        assert!(details.hint.is_none());
    }
}
