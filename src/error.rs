// src/error.rs

//! Unified error handling for the bot.

use std::fmt;

use teloxide::RequestError;
use thiserror::Error;

/// Result type alias for bot operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Telegram Bot API request failed
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote API answered with a non-success status
    #[error("{service} API error {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A remote API refused the call because of rate limits or quota
    #[error("{service} rate limit: {message}")]
    RateLimited {
        service: &'static str,
        message: String,
    },

    /// Authentication against a remote service failed
    #[error("Auth error for {service}: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },

    /// Reading chat history failed
    #[error("History error for {channel}: {message}")]
    History { channel: String, message: String },

    /// Session encryption/decryption failed
    #[error("Session error: {0}")]
    Session(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an error from a non-success HTTP response.
    ///
    /// 429 becomes [`AppError::RateLimited`], everything else [`AppError::Api`].
    pub fn api(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 429 {
            Self::RateLimited {
                service,
                message: body,
            }
        } else {
            Self::Api {
                service,
                status,
                body,
            }
        }
    }

    /// Create an authentication error.
    pub fn auth(service: &'static str, message: impl fmt::Display) -> Self {
        Self::Auth {
            service,
            message: message.to_string(),
        }
    }

    /// Create a chat history error.
    pub fn history(channel: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::History {
            channel: channel.into(),
            message: message.to_string(),
        }
    }

    /// Create a session error.
    pub fn session(message: impl fmt::Display) -> Self {
        Self::Session(message.to_string())
    }

    /// Whether retrying the failed call may succeed.
    ///
    /// Network failures, timeouts, rate limits and 5xx answers are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Telegram(e) => matches!(
                e,
                RequestError::Network(_) | RequestError::Io(_) | RequestError::RetryAfter(_)
            ),
            Self::Api { status, .. } => *status >= 500,
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Whether the error is a rate-limit or quota refusal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Telegram(RequestError::RetryAfter(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_status_classification() {
        assert!(AppError::api("Telegram", 429, "Too Many Requests").is_rate_limited());
        assert!(AppError::api("Sheets", 503, "unavailable").is_transient());
        assert!(!AppError::api("Telegram", 400, "Bad Request").is_transient());
    }

    #[test]
    fn test_permanent_errors_are_not_transient() {
        assert!(!AppError::config("missing BOT_TOKEN").is_transient());
        assert!(!AppError::selector("[[", "bad").is_transient());
        assert!(!AppError::session("bad key").is_transient());
    }

    #[test]
    fn test_display_includes_service() {
        let err = AppError::api("Gemini", 404, "model not found");
        assert_eq!(err.to_string(), "Gemini API error 404: model not found");
    }
}
