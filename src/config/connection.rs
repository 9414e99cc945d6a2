//! JIRA connection configuration.

use std::fmt;

use serde::Deserialize;

use super::{ConfigError, Result};
use crate::api::normalize_base_url;

/// The `[connection]` section as written in the file.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RawConnection {
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_url: Option<String>,
}

/// Connection details for a JIRA instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// The JIRA username.
    pub username: String,

    /// The JIRA password, from the config file or the OS keyring.
    pub password: String,

    /// The JIRA instance URL.
    ///
    /// Only scheme, host and port matter; the client always talks HTTPS to
    /// the `/rest/` root.
    pub base_url: String,
}

impl ConnectionConfig {
    /// Create a new connection config.
    pub fn new(username: String, password: String, base_url: String) -> Self {
        Self {
            username,
            password,
            base_url,
        }
    }

    /// Build from the raw section, looking up the password when it is absent.
    pub(super) fn from_raw(
        raw: RawConnection,
        password_lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<Self> {
        let username = raw
            .username
            .ok_or_else(|| ConfigError::MissingKey("connection.username".to_string()))?;
        let base_url = raw
            .base_url
            .ok_or_else(|| ConfigError::MissingKey("connection.base_url".to_string()))?;
        let password = match raw.password {
            Some(password) => password,
            None => password_lookup(&username)
                .ok_or_else(|| ConfigError::MissingKey("connection.password".to_string()))?,
        };

        let connection = Self::new(username, password, base_url);
        connection.validate()?;
        Ok(connection)
    }

    /// Validate this connection.
    ///
    /// Checks that:
    /// - The username is non-empty
    /// - The URL has an http(s) scheme and a host
    ///
    /// The password is sent as configured; JIRA decides whether it is valid.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(ConfigError::ValidationError(
                "connection username cannot be empty".to_string(),
            ));
        }

        if self.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "connection base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(ConfigError::ValidationError(
                "connection base_url must start with http:// or https://".to_string(),
            ));
        }

        normalize_base_url(&self.base_url)
            .map_err(|e| ConfigError::ValidationError(format!("connection base_url: {}", e)))?;

        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
