//! Session authentication for the JIRA API.
//!
//! JIRA Server issues a session cookie from `POST /rest/auth/1/session`.
//! This module performs that login with a bounded number of attempts,
//! deletes the session on logout, and offers [`JiraClient::with_session`]
//! so every login is paired with a logout. Passwords can be kept in the
//! OS keyring instead of the config file.

use std::fmt;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::client::{ApiRequest, JiraClient};
use super::error::{ApiError, Result};
use super::types::{HttpMethod, Resource, SessionToken};

/// The keyring service name for stored passwords.
const KEYRING_SERVICE: &str = "jira-reports";

/// Total login attempts before giving up.
pub const MAX_LOGIN_TRIES: u32 = 5;

/// Login credentials for JIRA.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Get the username.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl JiraClient {
    /// Log in and return the active session.
    ///
    /// A cached session is returned without any network call. Otherwise up
    /// to [`MAX_LOGIN_TRIES`] login requests are made. Malformed sessions and
    /// transient failures are retried; a response without any session means
    /// the credentials were rejected and ends the login at once.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidCredentials` (or `Unauthorized`) when the
    /// server rejects the credentials, and `ApiError::LoginFailed` once every
    /// attempt has failed.
    #[instrument(skip(self), fields(username = %self.credentials.username()))]
    pub async fn login(&mut self) -> Result<SessionToken> {
        if let Some(token) = self.session() {
            debug!("Reusing active session");
            return Ok(token);
        }

        let mut tries = 0;
        loop {
            tries += 1;
            match self.attempt_login().await {
                Ok(token) => {
                    info!("Logged in after {} attempt(s)", tries);
                    self.replace_session(Some(token.clone()));
                    return Ok(token);
                }
                Err(e) if !e.is_login_retryable() => {
                    warn!("Login rejected: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("Login attempt failed: {}", e);
                    }
                    debug!("Cannot login. Retry {}/{}: {}", tries, MAX_LOGIN_TRIES, e);
                    if tries >= MAX_LOGIN_TRIES {
                        return Err(ApiError::LoginFailed { attempts: tries });
                    }
                }
            }
        }
    }

    /// Send one login request.
    async fn attempt_login(&self) -> Result<SessionToken> {
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });

        let response = self
            .request(
                ApiRequest::to(Resource::Session, HttpMethod::Post)
                    .json(body)
                    .sensitive(),
            )
            .await?;

        SessionToken::from_login_response(response.as_ref())
    }

    /// Log out of the active session.
    ///
    /// Does nothing when no session is held. The cached session is cleared
    /// even if the logout request fails.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        let Some(token) = self.replace_session(None) else {
            debug!("No active session, skipping logout");
            return Ok(());
        };

        self.request(
            ApiRequest::to(Resource::Session, HttpMethod::Delete).cookie(token.name, token.value),
        )
        .await?;

        info!("Logged out");
        Ok(())
    }

    /// Check whether a session is held.
    pub fn is_logged_in(&self) -> bool {
        self.session().is_some()
    }

    /// Run `body` inside a login scope.
    ///
    /// Logs in, runs the body with a shared borrow of the client and always
    /// logs out afterwards, whether the body succeeded or failed. The body's
    /// error takes precedence over a logout error. If the returned future is
    /// dropped before it completes (a timeout or `select!`), the session is
    /// cleared and a logout request is sent from a spawned task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::FutureExt;
    ///
    /// let keys = client
    ///     .with_session(move |jira| {
    ///         async move {
    ///             let search = jira.search(SearchQuery::new(jql), |issue| issue.key);
    ///             Ok(search.collect_all().await)
    ///         }
    ///         .boxed()
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_session<T, F>(&mut self, body: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c JiraClient) -> BoxFuture<'c, Result<T>>,
    {
        self.login().await?;

        let mut guard = AbandonedSession {
            client: &*self,
            armed: true,
        };
        let result = body(&*self).await;
        guard.armed = false;
        drop(guard);
        let logout = self.logout().await;

        match (result, logout) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), logout) => {
                if let Err(logout_err) = logout {
                    warn!("Logout after failed operation also failed: {}", logout_err);
                }
                Err(e)
            }
        }
    }
}

/// Logs out of a session whose scope was dropped mid-flight.
struct AbandonedSession<'c> {
    client: &'c JiraClient,
    armed: bool,
}

impl Drop for AbandonedSession<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(token) = self.client.replace_session(None) else {
            return;
        };
        warn!("Login scope dropped before completion; logging out in the background");

        let request =
            ApiRequest::to(Resource::Session, HttpMethod::Delete).cookie(token.name, token.value);
        let builder = match self.client.prepare(&request) {
            Ok((_, builder)) => builder,
            Err(e) => {
                warn!("Cannot build logout request: {}", e);
                return;
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match builder.send().await {
                        Ok(response) => debug!("Background logout: {}", response.status()),
                        Err(e) => warn!("Background logout failed: {}", e),
                    }
                });
            }
            Err(_) => warn!("No async runtime; session left to expire on the server"),
        }
    }
}

/// Store a password in the OS keyring.
///
/// # Errors
///
/// Returns an error if the password cannot be stored in the keyring.
pub fn store_password(username: &str, password: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)
        .map_err(|e| ApiError::Keyring(format!("failed to create keyring entry: {}", e)))?;

    entry
        .set_password(password)
        .map_err(|e| ApiError::Keyring(format!("failed to store password: {}", e)))?;

    Ok(())
}

/// Retrieve a password from the OS keyring.
///
/// # Errors
///
/// Returns an error if the password cannot be retrieved from the keyring.
pub fn get_password(username: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .get_password()
        .map_err(|e| ApiError::Keyring(format!("failed to retrieve password: {}", e)))
}

/// Delete a password from the OS keyring.
///
/// # Errors
///
/// Returns an error if the password cannot be deleted from the keyring.
pub fn delete_password(username: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)
        .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))?;

    entry
        .delete_password()
        .map_err(|e| ApiError::Keyring(format!("failed to delete password: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::FutureExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::testing::{mock_client, mount_login, mount_logout};

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("jdoe", "secret_password");
        let debug_output = format!("{:?}", credentials);
        assert!(debug_output.contains("jdoe"));
        assert!(!debug_output.contains("secret_password"));
    }

    #[tokio::test]
    async fn test_login_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/auth/1/session"))
            .and(body_partial_json(json!({"username": "jdoe", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": {"name": "JSESSIONID", "value": "abc"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let token = client.login().await.unwrap();

        assert_eq!(token, SessionToken::new("JSESSIONID", "abc"));
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_twice_uses_cached_session() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;

        let mut client = mock_client(&server);
        let first = client.login().await.unwrap();
        let second = client.login().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_without_login_makes_no_request() {
        let server = MockServer::start().await;
        mount_logout(&server, 0).await;

        let mut client = mock_client(&server);
        client.logout().await.unwrap();

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logout_sends_session_cookie_and_clears_token() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/rest/auth/1/session"))
            .and(wiremock::matchers::header(
                "cookie",
                "JSESSIONID=6E3487971234567896704A9EB4AE501F",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        client.login().await.unwrap();
        client.logout().await.unwrap();

        assert!(!client.is_logged_in());
        // A second logout is a no-op.
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_gives_up_after_max_tries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/auth/1/session"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"session": {"name": "JSESSIONID"}})),
            )
            .expect(u64::from(MAX_LOGIN_TRIES))
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let err = client.login().await.unwrap_err();

        assert!(matches!(err, ApiError::LoginFailed { attempts } if attempts == MAX_LOGIN_TRIES));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_rejected_login_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/auth/1/session"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errorMessages": ["Login failed"],
                "errors": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let err = client.login().await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidCredentials(ref msg) if msg.contains("Login failed")));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_unauthorized_without_body_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/auth/1/session"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let err = client.login().await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_login_retries_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/auth/1/session"))
            .respond_with(ResponseTemplate::new(503))
            .expect(u64::from(MAX_LOGIN_TRIES))
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let err = client.login().await.unwrap_err();

        assert!(matches!(err, ApiError::LoginFailed { .. }));
    }

    #[tokio::test]
    async fn test_login_succeeds_on_third_attempt() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("POST"))
            .and(path("/rest/auth/1/session"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                let current = attempts_clone.fetch_add(1, Ordering::SeqCst);
                if current < 2 {
                    ResponseTemplate::new(200).set_body_json(json!({"session": {"name": "JSESSIONID"}}))
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"session": {"name": "JSESSIONID", "value": "third"}}))
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let token = client.login().await.unwrap();

        assert_eq!(token.value, "third");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_session_logs_in_and_out() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        mount_logout(&server, 1).await;

        let mut client = mock_client(&server);
        let logged_in = client
            .with_session(|jira| async move { Ok(jira.is_logged_in()) }.boxed())
            .await
            .unwrap();

        assert!(logged_in);
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_with_session_logs_out_when_body_fails() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        mount_logout(&server, 1).await;

        let mut client = mock_client(&server);
        let result: Result<()> = client
            .with_session(|_jira| {
                async move { Err(ApiError::InvalidResponse("boom".to_string())) }.boxed()
            })
            .await;

        assert!(matches!(result, Err(ApiError::InvalidResponse(msg)) if msg == "boom"));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_with_session_skips_body_when_login_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        mount_logout(&server, 0).await;

        let mut client = mock_client(&server);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let result = client
            .with_session(move |_jira| {
                async move {
                    ran_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .await;

        assert!(matches!(result, Err(ApiError::InvalidCredentials(_))));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_scope_logs_out_in_background() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("DELETE"))
            .and(path("/rest/auth/1/session"))
            .and(wiremock::matchers::header(
                "cookie",
                "JSESSIONID=6E3487971234567896704A9EB4AE501F",
            ))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/api/2/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"startAt": 0, "maxResults": 1, "total": 0, "issues": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let mut client = mock_client(&server);
        let outcome = tokio::time::timeout(
            Duration::from_millis(100),
            client.with_session(|jira| {
                async move {
                    jira.request(
                        ApiRequest::to(Resource::Search, HttpMethod::Post).json(json!({"jql": ""})),
                    )
                    .await
                    .map(|_| ())
                }
                .boxed()
            }),
        )
        .await;

        assert!(outcome.is_err());
        assert!(!client.is_logged_in());

        let mut logged_out = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let requests = server.received_requests().await.unwrap();
            if requests.iter().any(|r| r.method.to_string() == "DELETE") {
                logged_out = true;
                break;
            }
        }
        assert!(logged_out);
    }
}
