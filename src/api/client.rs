//! JIRA session client implementation.
//!
//! This module provides the HTTP session shared by every API call: base URL
//! normalization, the generic request primitive and response decoding.
//! Login, search and worklog operations are layered on top in sibling modules.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::auth::Credentials;
use super::error::{ApiError, Result};
use super::types::{error_messages, HttpMethod, Resource, SessionToken};
use crate::config::ConnectionConfig;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fixed REST root every resource is resolved against.
pub const API_ROOT: &str = "/rest/";

/// Longest body excerpt kept in error messages.
const MAX_ERROR_BODY_LEN: usize = 200;

/// A single call to the JIRA REST API.
///
/// Carries the resource, verb, query parameters, JSON body, extra headers
/// and cookies of one request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    resource: String,
    method: HttpMethod,
    params: Vec<(String, String)>,
    data: Option<Value>,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    redact_data: bool,
}

impl ApiRequest {
    /// Create a request for a resource path relative to the REST root.
    pub fn new(resource: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            resource: resource.into(),
            method,
            params: Vec::new(),
            data: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            redact_data: false,
        }
    }

    /// Create a request for a well-known resource.
    pub fn to(resource: Resource, method: HttpMethod) -> Self {
        Self::new(resource.path(), method)
    }

    /// Add a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Set the JSON body.
    pub fn json(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Keep the body out of the logs (used for credentials).
    pub fn sensitive(mut self) -> Self {
        self.redact_data = true;
        self
    }

    /// The resource path.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The HTTP verb.
    pub fn method(&self) -> HttpMethod {
        self.method
    }
}

/// The JIRA API client.
///
/// Owns the HTTP session, the normalized API root, the credentials and the
/// session token of the current login scope. A client serves one caller at a
/// time: login and logout take `&mut self`. The token sits behind a mutex only
/// so an abandoned login scope can clear it from a shared borrow.
#[derive(Debug)]
pub struct JiraClient {
    /// The HTTP client.
    client: Client,
    /// The REST API root, always ending in `/rest/`.
    api_root: Url,
    /// Login credentials.
    pub(super) credentials: Credentials,
    /// Session of the active login scope.
    token: Mutex<Option<SessionToken>>,
}

impl JiraClient {
    /// Create a new JIRA client from the connection section of the config.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The base URL has no host
    /// - The HTTP client cannot be built
    #[instrument(skip(connection), fields(base_url = %connection.base_url))]
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        info!("Creating JIRA client");
        Self::with_credentials(
            &connection.base_url,
            &connection.username,
            &connection.password,
        )
    }

    /// Create a new JIRA client with explicit credentials.
    ///
    /// The base URL is normalized: the scheme is forced to HTTPS and any
    /// path is replaced with the REST root.
    pub fn with_credentials(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let api_root = normalize_base_url(base_url)?;
        Self::from_api_root(api_root, Credentials::new(username, password))
    }

    /// Create a client against an API root that is used verbatim.
    ///
    /// No scheme or path rewriting happens here; use this for test servers
    /// and proxies that do not speak HTTPS.
    pub fn from_api_root(api_root: Url, credentials: Credentials) -> Result<Self> {
        let client = Self::build_http_client()?;

        Ok(Self {
            client,
            api_root,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Build the HTTP client with appropriate settings.
    fn build_http_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ApiError::Network)
    }

    /// Get the REST API root.
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// Get the configured username.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<SessionToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session of the active login scope.
    pub(super) fn session(&self) -> Option<SessionToken> {
        self.token_slot().clone()
    }

    /// Swap the session, returning the previous one.
    pub(super) fn replace_session(&self, token: Option<SessionToken>) -> Option<SessionToken> {
        std::mem::replace(&mut *self.token_slot(), token)
    }

    /// Resolve a resource against the API root.
    fn resource_url(&self, resource: &str) -> Result<Url> {
        self.api_root
            .join(resource.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", resource, e)))
    }

    /// Build the `Cookie` header from the session token and request cookies.
    fn cookie_header(&self, cookies: &[(String, String)]) -> Option<String> {
        let token = self.session();
        let pairs: Vec<String> = token
            .iter()
            .map(SessionToken::cookie_pair)
            .chain(cookies.iter().map(|(k, v)| format!("{}={}", k, v)))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Perform one request and decode the JSON response.
    ///
    /// Exactly one network call is made; nothing is retried here.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(json))` for any response with a JSON body, including error
    ///   statuses whose body is JSON (callers inspect it)
    /// - `Ok(None)` for a successful response without a body
    ///
    /// # Errors
    ///
    /// Network failures, bodies that are not JSON, and error statuses without
    /// a JSON body.
    #[instrument(skip(self, request), fields(resource = %request.resource, method = %request.method))]
    pub async fn request(&self, request: ApiRequest) -> Result<Option<Value>> {
        let (url, builder) = self.prepare(&request)?;

        let response = builder.send().await?;
        let status = response.status();

        info!("Response {} from {}", status, url);
        debug!("Request parameters: {:?}", request.params);
        if request.redact_data {
            debug!("Request data: <redacted>");
        } else {
            debug!("Request data: {:?}", request.data);
        }
        debug!("Request headers: {:?}", request.headers);
        debug!(
            "Request cookies: {:?}",
            request.cookies.iter().map(|(k, _)| k).collect::<Vec<_>>()
        );

        let body = response.bytes().await?;
        parse_body(status, url.as_str(), &body)
    }

    /// Build the HTTP request without sending it.
    ///
    /// The builder owns everything it needs, so it can be sent from a
    /// spawned task after the client borrow has ended.
    pub(super) fn prepare(&self, request: &ApiRequest) -> Result<(Url, RequestBuilder)> {
        let url = self.resource_url(&request.resource)?;

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), url.clone())
            .header(header::ACCEPT, "application/json")
            .headers(request.headers.clone());

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }
        if let Some(cookie) = self.cookie_header(&request.cookies) {
            builder = builder.header(header::COOKIE, cookie);
        }

        Ok((url, builder))
    }
}

/// Decode a response body according to its status.
fn parse_body(status: StatusCode, url: &str, body: &[u8]) -> Result<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return if status.is_success() {
            Ok(None)
        } else {
            Err(ApiError::from_status(status, url))
        };
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(json) => {
            if !status.is_success() {
                warn!(
                    "HTTP {} from {}: {}",
                    status,
                    url,
                    error_messages(&json).unwrap_or_default()
                );
            }
            Ok(Some(json))
        }
        Err(e) if status.is_success() => Err(ApiError::InvalidResponse(format!(
            "Failed to parse response from {}: {}",
            url, e
        ))),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let excerpt: String = text.chars().take(MAX_ERROR_BODY_LEN).collect();
            debug!("Error response body: {}", text);
            Err(ApiError::from_status(
                status,
                &format!("{} ({})", url, excerpt.trim()),
            ))
        }
    }
}

/// Normalize the base URL into the REST API root.
///
/// The scheme is forced to HTTPS, host and port are kept, and any path,
/// query or fragment is replaced by [`API_ROOT`].
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw.trim())
        .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ApiError::InvalidUrl(format!("{}: missing host", raw)))?;

    if parsed.scheme() != "https" {
        warn!("Base URL {} does not use HTTPS, forcing https", raw);
    }

    let root = match parsed.port() {
        Some(port) => format!("https://{}:{}{}", host, port, API_ROOT),
        None => format!("https://{}{}", host, API_ROOT),
    };

    Url::parse(&root).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::mock_client;
    use serde_json::json;
    use wiremock::matchers::{header as header_is, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_base_url_forces_https_and_rest_root() {
        let url = normalize_base_url("http://jira.example.com/secure/Dashboard.jspa").unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com/rest/");
    }

    #[test]
    fn test_normalize_base_url_keeps_port() {
        let url = normalize_base_url("https://jira.example.com:8443/jira/").unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com:8443/rest/");
    }

    #[test]
    fn test_normalize_base_url_drops_query() {
        let url = normalize_base_url("https://jira.example.com/?foo=bar#frag").unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com/rest/");
    }

    #[test]
    fn test_normalize_base_url_rejects_missing_host() {
        assert!(matches!(
            normalize_base_url("jira.example.com"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            normalize_base_url("file:///tmp/jira"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_resource_url_joins_under_root() {
        let client =
            JiraClient::with_credentials("https://jira.example.com/ignored", "u", "p").unwrap();
        let url = client.resource_url(Resource::Search.path()).unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com/rest/api/2/search");

        let url = client.resource_url("/auth/1/session").unwrap();
        assert_eq!(url.as_str(), "https://jira.example.com/rest/auth/1/session");
    }

    #[test]
    fn test_client_debug_does_not_expose_password() {
        let client =
            JiraClient::with_credentials("https://jira.example.com", "jdoe", "hunter2").unwrap();
        let debug_output = format!("{:?}", client);
        assert!(!debug_output.contains("hunter2"));
    }

    #[test]
    fn test_parse_body_empty_success_is_none() {
        let parsed = parse_body(StatusCode::NO_CONTENT, "u", b"").unwrap();
        assert!(parsed.is_none());
        let parsed = parse_body(StatusCode::OK, "u", b"  \n").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_parse_body_invalid_json_is_error() {
        let err = parse_body(StatusCode::OK, "u", b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_body_error_status_with_json_is_passed_through() {
        let body = br#"{"errorMessages":["Login failed"]}"#;
        let parsed = parse_body(StatusCode::UNAUTHORIZED, "u", body).unwrap();
        assert_eq!(parsed, Some(json!({"errorMessages": ["Login failed"]})));
    }

    #[test]
    fn test_parse_body_error_status_without_json() {
        let err = parse_body(StatusCode::BAD_GATEWAY, "u", b"Bad Gateway").unwrap_err();
        match err {
            ApiError::ServerError(msg) => assert!(msg.contains("Bad Gateway")),
            other => panic!("Expected ServerError, got {:?}", other),
        }

        let err = parse_body(StatusCode::UNAUTHORIZED, "u", b"").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_request_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/tempo-timesheets/3/worklogs"))
            .and(query_param("username", "jdoe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let response = client
            .request(ApiRequest::to(Resource::Worklogs, HttpMethod::Get).param("username", "jdoe"))
            .await
            .unwrap();

        assert_eq!(response, Some(json!([{"id": 1}])));
    }

    #[tokio::test]
    async fn test_request_without_body_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/auth/1/session"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let response = client
            .request(ApiRequest::to(Resource::Session, HttpMethod::Delete))
            .await
            .unwrap();

        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_request_parse_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = mock_client(&server);
        let result = client
            .request(ApiRequest::to(Resource::Search, HttpMethod::Post).json(json!({})))
            .await;

        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_request_sends_headers_and_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/rest/api/2/search"))
            .and(header_is("x-atlassian-token", "no-check"))
            .and(header_is("cookie", "JSESSIONID=abc; tracker=1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = mock_client(&server);
        client.replace_session(Some(SessionToken::new("JSESSIONID", "abc")));

        let response = client
            .request(
                ApiRequest::new("api/2/search", HttpMethod::Put)
                    .header(
                        HeaderName::from_static("x-atlassian-token"),
                        HeaderValue::from_static("no-check"),
                    )
                    .cookie("tracker", "1"),
            )
            .await
            .unwrap();

        assert_eq!(response, Some(json!({"ok": true})));
    }
}
