//! API error types for the JIRA client.

use thiserror::Error;

/// Errors that can occur when interacting with the JIRA and Tempo APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication failed - the session was rejected.
    #[error("Authentication failed: check your username and password")]
    Unauthorized,

    /// Permission denied - user lacks access to the resource.
    #[error("Permission denied: you don't have access to this resource")]
    Forbidden,

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limited by the JIRA API.
    #[error("Rate limited: please wait before retrying")]
    RateLimited,

    /// JIRA server error.
    #[error("JIRA server error: {0}")]
    ServerError(String),

    /// Network or HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// HTTP verb outside the supported dispatch table.
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The server answered the login without a session.
    #[error("Wrong username or password: {0}")]
    InvalidCredentials(String),

    /// Login never produced a session within the retry budget.
    #[error("Cannot login: no valid session after {attempts} attempts")]
    LoginFailed {
        /// Number of login attempts made.
        attempts: u32,
    },

    /// Keyring error when storing/retrieving passwords.
    #[error("Keyring error: {0}")]
    Keyring(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from an HTTP status code.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound(context.to_string()),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(format!("HTTP {}: {}", status, context)),
            _ => ApiError::ServerError(format!("Unexpected HTTP {}: {}", status, context)),
        }
    }

    /// Check if this error is a temporary server or network condition.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited | ApiError::ServerError(_) | ApiError::Network(_)
        )
    }

    /// Check if a failed login attempt is worth another try.
    ///
    /// Transient failures and malformed sessions are retried. A response
    /// that carries no session at all is a rejection and is not.
    pub fn is_login_retryable(&self) -> bool {
        self.is_transient() || matches!(self, ApiError::InvalidResponse(_))
    }
}
