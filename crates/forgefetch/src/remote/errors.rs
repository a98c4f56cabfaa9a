use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when calling a forge API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Rate limit exceeded. The only retryable condition.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// API error reported by the platform.
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication required or failed.
    #[error("Authentication required")]
    AuthRequired,

    /// Resource not found (repository, path, etc.).
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FetchError {
    /// Create an API error.
    #[inline]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is a rate limit error (retryable).
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error is a server-side query timeout.
    ///
    /// Timeouts are remedied by reducing the tree query depth, not by
    /// waiting and re-asking the same question, so they are classified
    /// separately from rate limits.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::RateLimited { .. } => false,
            other => is_timeout_message(&other.to_string()),
        }
    }
}

/// Message fragments that indicate a server-side execution timeout.
///
/// The forge APIs expose no structured timeout kind for tree queries; the
/// error text is the only signal. All matching lives here so there is a
/// single place to update when the upstream wording changes.
const TIMEOUT_PHRASES: &[&str] = &[
    "timeout",
    "timed out",
    "something went wrong while executing your query",
    "504",
];

/// Check whether an error message reads as a query timeout.
pub fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TIMEOUT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include backtraces or multi-line details.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, FetchError>;
