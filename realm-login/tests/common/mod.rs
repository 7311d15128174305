//! Shared fixtures: a GitHub stand-in on wiremock and a login app wired to it

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::LOCATION;
use axum_test::{TestResponse, TestServer};
use realm_login::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BASE_URL: &str = "https://cms.example.org";

/// GitHub stand-in: authorize URL, token endpoint and `/user`
pub struct FakeGitHub {
    pub server: MockServer,
}

impl FakeGitHub {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Token endpoint answering with `gho_test`, expected `times` times
    pub async fn expect_token_exchanges(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_test",
                "token_type": "bearer",
                "scope": "read:user,user:email"
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Token endpoint rejecting the code
    pub async fn reject_codes(&self) {
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "bad_verification_code",
                "error_description": "The code passed is incorrect or expired."
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// `/user` for the bearer token `gho_test`
    pub async fn user(&self, login: &str, email: Option<&str>) {
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer gho_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4242,
                "login": login,
                "email": email,
            })))
            .mount(&self.server)
            .await;
    }

    /// `/user/emails` listing one primary verified address
    pub async fn private_email(&self, email: &str) {
        Mock::given(method("GET"))
            .and(path("/user/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "email": "old@example.com", "primary": false, "verified": true },
                { "email": email, "primary": true, "verified": true }
            ])))
            .mount(&self.server)
            .await;
    }
}

/// Configuration with an enabled backend client, an enabled frontend client
/// and a disabled frontend client, all pointing at `provider_uri`
pub fn config(provider_uri: &str, csrf_check: bool) -> LoginConfig {
    let client = |name: &str, realm: &str, enabled: bool| {
        format!(
            r#"
            [[clients]]
            name = "{name}"
            provider = "github"
            realm = "{realm}"
            enable_login = {enabled}
            client_id = "client-id"
            client_secret = "client-secret"
            auth_url = "{provider_uri}/login/oauth/authorize"
            token_url = "{provider_uri}/login/oauth/access_token"
            resource_owner_url = "{provider_uri}/user"
            "#
        )
    };

    let toml = format!(
        r#"
        [login]
        public_base_url = "{BASE_URL}"
        signing_secret = "integration-secret"
        enable_csrf_token_check = {csrf_check}
        backend_home = "/contao"
        frontend_home = "/"

        [session]
        secure_cookies = false
        {}
        {}
        {}
        "#,
        client("github_backend", "backend", true),
        client("github_frontend", "frontend", true),
        client("gitlab_frontend", "frontend", false),
    );

    LoginConfig::from_toml_str(&toml).expect("valid test configuration")
}

pub fn users() -> InMemoryUserStore {
    InMemoryUserStore::with_users([
        LocalUser::new(1, "jane", Realm::Backend).with_email("jane@example.com"),
        LocalUser::new(2, "max", Realm::Frontend).with_email("max@example.com"),
    ])
}

pub fn app(config: &LoginConfig, users: InMemoryUserStore) -> (TestServer, AppState) {
    let (server, state, _) = app_with_sessions(config, users);
    (server, state)
}

/// Like [`app`], also handing out the session store
pub fn app_with_sessions(
    config: &LoginConfig,
    users: InMemoryUserStore,
) -> (TestServer, AppState, Arc<MemorySessionStore>) {
    let sessions = Arc::new(MemorySessionStore::new());
    let state = AppState::with_user_store(config, Arc::new(users))
        .expect("state")
        .with_session_store(sessions.clone());
    let server = TestServer::builder()
        .save_cookies()
        .build(router(state.clone()))
        .expect("test server");
    (server, state, sessions)
}

/// Session id carried by the response's session cookie
pub fn session_id(response: &TestResponse) -> SessionId {
    response
        .cookie("realm_login_session")
        .value()
        .parse()
        .expect("session id cookie")
}

/// Path and query of an absolute URL on the public host
pub fn relative(url: &str) -> String {
    url.strip_prefix(BASE_URL).unwrap_or(url).to_string()
}

pub fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("redirect location")
        .to_string()
}

pub fn query_param(url: &str, key: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
