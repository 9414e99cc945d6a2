//! Centralized error types for jira-reports.
//!
//! This module provides a unified error hierarchy for the application with
//! user-friendly error messages. All error types use `thiserror` for
//! ergonomic error handling.

use thiserror::Error;

use crate::api::error::ApiError;
use crate::config::ConfigError;
use crate::mail::MailError;

/// The main application error type.
///
/// This enum aggregates all error types that can occur while building and
/// delivering a report, keeping the underlying error for the log file.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// API-related errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Mail delivery errors.
    #[error("{0}")]
    Mail(#[from] MailError),

    /// IO errors (file system, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with a message.
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }

    /// Get a user-friendly message for display.
    ///
    /// This returns a message suitable for the terminal, without technical
    /// jargon.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => match e {
                ConfigError::NoConfigDir => {
                    "Could not find configuration directory. Please check your system settings."
                        .to_string()
                }
                ConfigError::ReadError(_) => {
                    "Could not read configuration file. Please check the file exists and is readable.".to_string()
                }
                ConfigError::ParseError(_) => {
                    "Configuration file is invalid. Please check the file format.".to_string()
                }
                ConfigError::MissingSection(section) => {
                    format!("Configuration file has no [{}] section.", section)
                }
                ConfigError::MissingKey(key) => {
                    format!("Configuration key '{}' is not set.", key)
                }
                ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
                ConfigError::InvalidTemplate(msg) => format!("Query template error: {}", msg),
            },
            AppError::Api(e) => match e {
                ApiError::Unauthorized => {
                    "Authentication failed. Please check your username and password.".to_string()
                }
                ApiError::Forbidden => {
                    "Access denied. You don't have permission to access this resource.".to_string()
                }
                ApiError::NotFound(resource) => format!("'{}' was not found.", resource),
                ApiError::RateLimited => {
                    "Too many requests. Please wait a moment and try again.".to_string()
                }
                ApiError::ServerError(_) => {
                    "JIRA server error. Please try again later.".to_string()
                }
                ApiError::Network(_) => {
                    "Connection failed. Please check your network connection.".to_string()
                }
                ApiError::InvalidUrl(_) => "Invalid JIRA URL in configuration.".to_string(),
                ApiError::Keyring(_) => {
                    "Could not access secure storage for the password.".to_string()
                }
                ApiError::InvalidResponse(_) => {
                    "Unexpected response from JIRA. Please try again.".to_string()
                }
                ApiError::UnsupportedMethod(method) => {
                    format!("Request method '{}' is not supported.", method)
                }
                ApiError::InvalidCredentials(_) => {
                    "JIRA rejected the login. Please check your username and password.".to_string()
                }
                ApiError::LoginFailed { attempts } => {
                    format!("Could not log in to JIRA after {} attempts.", attempts)
                }
            },
            AppError::Mail(e) => format!("Report delivery failed: {}", e),
            AppError::Io(_) => "A file operation failed. Please check file permissions.".to_string(),
            AppError::Other(msg) => msg.clone(),
        }
    }

    /// Check if this error is critical.
    ///
    /// Critical errors abort a report before any data is produced: bad
    /// configuration or a session that cannot be opened.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::Api(ApiError::Unauthorized)
                | AppError::Api(ApiError::Forbidden)
                | AppError::Api(ApiError::InvalidCredentials(_))
                | AppError::Api(ApiError::LoginFailed { .. })
        )
    }

    /// Check if running the command again may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Api(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            AppError::Config(ConfigError::NoConfigDir) | AppError::Config(ConfigError::ReadError(_)) => {
                Some("Create the file or point JIRA_REPORTS_CONFIG at it.")
            }
            AppError::Config(ConfigError::MissingKey(key)) if key == "connection.password" => {
                Some("Run 'jira-reports store-password' to save the password in the keyring.")
            }
            AppError::Api(ApiError::Unauthorized)
            | AppError::Api(ApiError::InvalidCredentials(_))
            | AppError::Api(ApiError::LoginFailed { .. }) => {
                Some("Check the username and password in the [connection] section.")
            }
            AppError::Api(ApiError::RateLimited) => Some("Wait a few seconds and run the report again."),
            AppError::Api(ApiError::Network(_)) => {
                Some("Check your network connection and the JIRA base_url.")
            }
            _ => None,
        }
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_from_config_error() {
        let config_err = ConfigError::NoConfigDir;
        let app_err: AppError = config_err.into();
        assert!(matches!(
            app_err,
            AppError::Config(ConfigError::NoConfigDir)
        ));
    }

    #[test]
    fn test_app_error_from_api_error() {
        let api_err = ApiError::Unauthorized;
        let app_err: AppError = api_err.into();
        assert!(matches!(app_err, AppError::Api(ApiError::Unauthorized)));
    }

    #[test]
    fn test_app_error_from_mail_error() {
        let app_err: AppError = MailError::NoRecipients.into();
        assert!(matches!(app_err, AppError::Mail(MailError::NoRecipients)));
        assert!(app_err.user_message().contains("delivery failed"));
    }

    #[test]
    fn test_user_message_unauthorized() {
        let err = AppError::Api(ApiError::Unauthorized);
        let msg = err.user_message();
        assert!(msg.contains("Authentication failed"));
        assert!(msg.contains("username"));
    }

    #[test]
    fn test_user_message_login_failed() {
        let err = AppError::Api(ApiError::LoginFailed { attempts: 5 });
        assert!(err.user_message().contains("5 attempts"));
    }

    #[test]
    fn test_user_message_not_found() {
        let err = AppError::Api(ApiError::NotFound("PROJ-123".to_string()));
        let msg = err.user_message();
        assert!(msg.contains("PROJ-123"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_user_message_missing_key() {
        let err = AppError::Config(ConfigError::MissingKey("queries.subtasks".to_string()));
        assert!(err.user_message().contains("queries.subtasks"));
    }

    #[test]
    fn test_is_critical_login_failed() {
        let err = AppError::Api(ApiError::LoginFailed { attempts: 5 });
        assert!(err.is_critical());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_rejected_credentials_are_critical() {
        let err = AppError::Api(ApiError::InvalidCredentials("Login failed".to_string()));
        assert!(err.is_critical());
        assert!(err.user_message().contains("rejected the login"));
        assert!(err.suggested_action().is_some_and(|a| a.contains("[connection]")));
    }

    #[test]
    fn test_is_critical_config() {
        let err = AppError::Config(ConfigError::NoConfigDir);
        assert!(err.is_critical());
    }

    #[test]
    fn test_is_not_critical_rate_limited() {
        let err = AppError::Api(ApiError::RateLimited);
        assert!(!err.is_critical());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_suggested_action_missing_password() {
        let err = AppError::Config(ConfigError::MissingKey("connection.password".to_string()));
        let action = err.suggested_action();
        assert!(action.is_some_and(|a| a.contains("store-password")));
    }

    #[test]
    fn test_suggested_action_other_missing_key() {
        let err = AppError::Config(ConfigError::MissingKey("report.date_to".to_string()));
        assert!(err.suggested_action().is_none());
    }

    #[test]
    fn test_other_error() {
        let err = AppError::other("something went wrong");
        assert!(matches!(err, AppError::Other(_)));
        assert_eq!(err.user_message(), "something went wrong");
    }
}
