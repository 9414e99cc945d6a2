//! Configuration management for jira-reports.
//!
//! This module loads the TOML configuration file: the JIRA connection,
//! JQL query templates per report, the custom field mapping and the report
//! parameters. Required sections and keys are checked at load time so a bad
//! file fails before any request is made.

mod connection;
mod queries;
mod settings;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub use connection::ConnectionConfig;
pub use queries::{jql_list, render_template, CustomFields, QueryTemplates};
pub use settings::{ReportSettings, REPORT_DATE_FORMAT};

use connection::RawConnection;
use settings::RawReport;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "JIRA_REPORTS_CONFIG";

/// Errors raised while loading or using the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("Could not determine the configuration directory")]
    NoConfigDir,

    /// The config file could not be read.
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    /// The config file is not valid TOML.
    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    /// A required section is absent.
    #[error("Missing config section [{0}]")]
    MissingSection(String),

    /// A required key is absent.
    #[error("Missing config key '{0}'")]
    MissingKey(String),

    /// A value is present but invalid.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A JQL template cannot be rendered.
    #[error("Invalid query template: {0}")]
    InvalidTemplate(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// The file as written on disk.
#[derive(Debug, Deserialize)]
struct RawConfig {
    connection: Option<RawConnection>,
    queries: Option<BTreeMap<String, String>>,
    #[serde(default)]
    custom_fields: BTreeMap<String, String>,
    report: Option<RawReport>,
}

/// The validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// JIRA connection details.
    pub connection: ConnectionConfig,
    /// JQL templates keyed by report.
    pub queries: QueryTemplates,
    /// Custom field IDs keyed by human name.
    pub custom_fields: CustomFields,
    /// Report parameters.
    pub report: ReportSettings,
}

impl Config {
    /// Load the configuration from a file.
    ///
    /// A missing `connection.password` is looked up in the OS keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any
    /// required section or key is missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml_str(&contents, |username| {
            debug!("No password configured, trying the keyring");
            crate::api::get_password(username).ok()
        })
    }

    /// Parse and validate configuration text.
    ///
    /// `password_lookup` is consulted only when the file has no password.
    pub fn from_toml_str(
        contents: &str,
        password_lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let connection = raw
            .connection
            .ok_or_else(|| ConfigError::MissingSection("connection".to_string()))?;
        let queries = raw
            .queries
            .ok_or_else(|| ConfigError::MissingSection("queries".to_string()))?;
        let report = raw
            .report
            .ok_or_else(|| ConfigError::MissingSection("report".to_string()))?;

        Ok(Self {
            connection: ConnectionConfig::from_raw(connection, password_lookup)?,
            queries: QueryTemplates::new(queries),
            custom_fields: CustomFields::new(raw.custom_fields),
            report: ReportSettings::from_raw(report)?,
        })
    }
}

/// Read only `connection.username` from a config file.
///
/// Used to store a password before the file is otherwise loadable.
pub fn configured_username(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
    let raw: RawConfig =
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    raw.connection
        .ok_or_else(|| ConfigError::MissingSection("connection".to_string()))?
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::MissingKey("connection.username".to_string()))
}

/// Get the config file path.
///
/// Uses `$JIRA_REPORTS_CONFIG` when set, otherwise
/// `<config dir>/jira-reports/config.toml`.
///
/// # Errors
///
/// Returns `ConfigError::NoConfigDir` if no config directory exists on this
/// platform.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let base_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base_dir.join("jira-reports").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    const FULL_CONFIG: &str = r#"
[connection]
username = "jdoe"
password = "secret"
base_url = "https://jira.example.com/secure/Dashboard.jspa"

[queries]
sprint_tasks = 'project in {projects} AND sprint in {sprints}'
resolution_tasks = 'project in {projects} AND resolved >= "{date_from}"'

[custom_fields]
story_points = "customfield_10002"
t_shirt_size = "customfield_10100"

[report]
date_from = "2024/03/01"
date_to = "2024/03/31"
usernames = ["jdoe", "asmith"]
sprints = ["Sprint 12"]
projects = ["PROJ"]
"#;

    #[test]
    fn test_full_config_parses() {
        let config = assert_ok!(Config::from_toml_str(FULL_CONFIG, |_| None));

        assert_eq!(config.connection.username, "jdoe");
        assert_eq!(config.connection.password, "secret");
        assert_eq!(config.report.usernames, vec!["jdoe", "asmith"]);
        assert_eq!(config.custom_fields.story_points().unwrap(), "customfield_10002");
        assert!(config.queries.get("sprint_tasks").is_ok());
        assert!(config.report.issue_types.is_empty());
    }

    #[test]
    fn test_missing_connection_section() {
        let contents = FULL_CONFIG.replace("[connection]", "[server]");
        let err = assert_err!(Config::from_toml_str(&contents, |_| None));
        assert!(matches!(err, ConfigError::MissingSection(s) if s == "connection"));
    }

    #[test]
    fn test_missing_queries_section() {
        let contents = FULL_CONFIG.replace("[queries]", "[templates]");
        let err = assert_err!(Config::from_toml_str(&contents, |_| None));
        assert!(matches!(err, ConfigError::MissingSection(s) if s == "queries"));
    }

    #[test]
    fn test_missing_base_url() {
        let contents =
            FULL_CONFIG.replace("base_url = \"https://jira.example.com/secure/Dashboard.jspa\"", "");
        let err = assert_err!(Config::from_toml_str(&contents, |_| None));
        assert!(matches!(err, ConfigError::MissingKey(k) if k == "connection.base_url"));
    }

    #[test]
    fn test_custom_fields_section_is_optional() {
        let start = FULL_CONFIG.find("[custom_fields]").unwrap();
        let end = FULL_CONFIG.find("[report]").unwrap();
        let contents = format!("{}{}", &FULL_CONFIG[..start], &FULL_CONFIG[end..]);

        let config = assert_ok!(Config::from_toml_str(&contents, |_| None));
        assert!(config.custom_fields.story_points().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let err = assert_err!(Config::from_toml_str("[connection", |_| None));
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = assert_ok!(Config::load(file.path()));
        assert_eq!(config.connection.base_url, "https://jira.example.com/secure/Dashboard.jspa");
    }

    #[test]
    fn test_configured_username_without_password() {
        let contents = FULL_CONFIG.replace("password = \"secret\"", "");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();

        assert_eq!(assert_ok!(configured_username(file.path())), "jdoe");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = assert_err!(Config::load(&dir.path().join("missing.toml")));
        assert!(matches!(err, ConfigError::ReadError(_)));
    }

    #[test]
    #[serial]
    fn test_default_config_path_from_env() {
        std::env::set_var(CONFIG_PATH_ENV, "/tmp/custom-jira.toml");
        let path = default_config_path().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(path, PathBuf::from("/tmp/custom-jira.toml"));
    }

    #[test]
    #[serial]
    fn test_default_config_path_fallback() {
        std::env::remove_var(CONFIG_PATH_ENV);
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("jira-reports/config.toml"));
        }
    }
}
