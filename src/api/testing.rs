//! Mock-server helpers shared by the API tests.

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::auth::Credentials;
use super::client::JiraClient;

/// A client pointed at the mock server's `/rest/` root.
pub(crate) fn mock_client(server: &MockServer) -> JiraClient {
    let api_root = Url::parse(&format!("{}/rest/", server.uri())).unwrap();
    JiraClient::from_api_root(api_root, Credentials::new("jdoe", "secret")).unwrap()
}

/// Accept logins with a fixed `JSESSIONID` session.
pub(crate) async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/rest/auth/1/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": {"name": "JSESSIONID", "value": "6E3487971234567896704A9EB4AE501F"},
            "loginInfo": {"failedLoginCount": 0, "loginCount": 12}
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Accept logouts.
pub(crate) async fn mount_logout(server: &MockServer, expected_calls: u64) {
    Mock::given(method("DELETE"))
        .and(path("/rest/auth/1/session"))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected_calls)
        .mount(server)
        .await;
}
