//! JIRA API request and response types.
//!
//! These types model the JIRA REST API v2 session and search payloads.
//! Worklogs from the Tempo timesheets API are kept as raw JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;

/// API resources relative to the REST root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// `auth/1/session` - login and logout.
    Session,
    /// `api/2/search` - JQL search.
    Search,
    /// `tempo-timesheets/3/worklogs` - Tempo worklogs.
    Worklogs,
}

impl Resource {
    /// The relative path of this resource.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Session => "auth/1/session",
            Resource::Search => "api/2/search",
            Resource::Worklogs => "tempo-timesheets/3/worklogs",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// HTTP verbs supported by the session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// The reqwest method this verb dispatches to.
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(ApiError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// An authenticated JIRA session.
///
/// Returned by `POST /rest/auth/1/session` and sent back as a cookie.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// The cookie name (usually `JSESSIONID`).
    pub name: String,
    /// The cookie value.
    pub value: String,
}

impl SessionToken {
    /// Create a new session token.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Extract the session from a login response body.
    ///
    /// A body without `session` is a rejected login and yields
    /// `ApiError::InvalidCredentials` with JIRA's error messages, if any. An
    /// empty body or a `session` lacking `name`/`value` is an
    /// `ApiError::InvalidResponse`.
    pub fn from_login_response(body: Option<&Value>) -> Result<Self, ApiError> {
        let body =
            body.ok_or_else(|| ApiError::InvalidResponse("empty login response".to_string()))?;

        let Some(session) = body.get("session") else {
            let reason = error_messages(body)
                .unwrap_or_else(|| "login response has no session".to_string());
            return Err(ApiError::InvalidCredentials(reason));
        };

        serde_json::from_value(session.clone())
            .map_err(|e| ApiError::InvalidResponse(format!("malformed session: {}", e)))
    }

    /// Render as a `Cookie` header pair.
    pub fn cookie_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Collect JIRA `errorMessages` and `errors` from a response body.
pub fn error_messages(body: &Value) -> Option<String> {
    let mut messages: Vec<String> = body
        .get("errorMessages")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    if let Some(errors) = body.get("errors").and_then(Value::as_object) {
        messages.extend(errors.iter().map(|(k, v)| format!("{}: {}", k, v)));
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join(", "))
    }
}

/// One page of a JQL search.
///
/// Returned by `POST /rest/api/2/search`. Every field is required; a page
/// missing any of them is treated as malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// The index of the first result.
    pub start_at: u64,
    /// Maximum results per page, as granted by the server.
    pub max_results: u64,
    /// Total number of matching issues.
    pub total: u64,
    /// The issues on this page.
    pub issues: Vec<Issue>,
}

/// A JIRA issue as returned by search.
///
/// Only the fields requested in the search are present in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// The issue ID.
    #[serde(default)]
    pub id: String,
    /// The issue key (e.g., "PROJ-123").
    pub key: String,
    /// The requested issue fields.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Get a raw field value. JSON `null` is reported as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Get a string field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Get a numeric field.
    pub fn field_f64(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    /// Get a string nested one level down, e.g. `assignee.displayName`.
    pub fn nested_str(&self, name: &str, key: &str) -> Option<&str> {
        self.field(name)
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
    }
}

/// A Tempo worklog, kept exactly as the server returned it.
pub type Worklog = Value;
