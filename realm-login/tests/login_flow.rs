//! End-to-end login flows through the HTTP endpoints

mod common;

use axum::http::{header::SET_COOKIE, StatusCode};
use common::{
    app, app_with_sessions, config, location, query_param, relative, session_id, users, FakeGitHub,
    BASE_URL,
};
use realm_login::oauth2::handlers::ClientList;
use realm_login::oauth2::signing::encode_failure_path;
use realm_login::prelude::*;

fn params(target: &str, always: bool) -> LoginUrlParams {
    LoginUrlParams {
        target_path: Some(target.to_string()),
        always_use_target_path: always,
        failure_path: None,
    }
}

#[tokio::test]
async fn backend_login_redirects_to_stored_target() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(1).await;
    github.user("jane-gh", Some("jane@example.com")).await;

    let (server, state) = app(&config(&github.uri(), false), users());

    let start_url = state
        .login_url("github_backend", &params("/contao/main", true))
        .unwrap()
        .unwrap();

    let response = server.get(&relative(&start_url)).await;
    response.assert_status(StatusCode::SEE_OTHER);

    let authorize = location(&response);
    assert!(authorize.starts_with(&format!("{}/login/oauth/authorize", github.uri())));
    assert_eq!(query_param(&authorize, "client_id").as_deref(), Some("client-id"));
    assert_eq!(
        query_param(&authorize, "redirect_uri").as_deref(),
        Some(format!("{BASE_URL}/_oauth2_login/github_backend/backend").as_str())
    );
    let oauth_state = query_param(&authorize, "state").expect("state in authorization URL");

    let response = server
        .get("/_oauth2_login/github_backend/backend")
        .add_query_param("code", "valid-code")
        .add_query_param("state", &oauth_state)
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/contao/main");

    // The state is single use.
    let replay = server
        .get("/_oauth2_login/github_backend/backend")
        .add_query_param("code", "valid-code")
        .add_query_param("state", &oauth_state)
        .await;
    replay.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&replay), "/contao");
}

#[tokio::test]
async fn private_github_email_is_looked_up() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(1).await;
    github.user("max-gh", None).await;
    github.private_email("max@example.com").await;

    let (server, state) = app(&config(&github.uri(), false), users());
    let start_url = state
        .login_url("github_frontend", &params("/members", false))
        .unwrap()
        .unwrap();

    let authorize = location(&server.get(&relative(&start_url)).await);
    let oauth_state = query_param(&authorize, "state").unwrap();

    let response = server
        .get("/_oauth2_login/github_frontend/frontend")
        .add_query_param("code", "valid-code")
        .add_query_param("state", &oauth_state)
        .await;

    assert_eq!(location(&response), "/members");
}

#[tokio::test]
async fn disabled_client_never_reaches_provider() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(0).await;

    let (server, state) = app(&config(&github.uri(), false), users());

    // Disabled clients get no login URL; sign one by hand.
    assert!(state
        .login_url("gitlab_frontend", &LoginUrlParams::default())
        .unwrap()
        .is_none());
    let start_url = state
        .signer()
        .login_url(
            BASE_URL,
            "gitlab_frontend",
            Realm::Frontend,
            &LoginUrlParams {
                failure_path: Some("/login-failed".to_string()),
                ..LoginUrlParams::default()
            },
        )
        .unwrap();

    let response = server.get(&relative(&start_url)).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login-failed");

    let list: ClientList = server.get("/_oauth2_clients/frontend").await.json();
    assert_eq!(list.error.as_deref(), Some("This login option is not activated."));
}

#[tokio::test]
async fn unsigned_start_is_rejected() {
    let github = FakeGitHub::start().await;
    let (server, _) = app(&config(&github.uri(), false), users());

    let response = server
        .get("/_start_oauth2_login/github_backend/backend")
        .add_query_param("_target_path", "aHR0cHM6Ly9ldmlsLmV4YW1wbGUuY29t")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "The login link is invalid or has expired.");
}

#[tokio::test]
async fn request_token_is_required_when_enabled() {
    let github = FakeGitHub::start().await;
    let (server, state) = app(&config(&github.uri(), true), users());

    let start_url = relative(
        &state
            .login_url("github_backend", &LoginUrlParams::default())
            .unwrap()
            .unwrap(),
    );

    server
        .get(&start_url)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let list: ClientList = server.get("/_oauth2_clients/backend").await.json();
    assert_eq!(list.clients.len(), 1);
    assert_eq!(list.clients[0].label, "Log in with GitHub");

    let response = server
        .get(&format!("{start_url}&REQUEST_TOKEN={}", list.request_token))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&github.uri()));
}

#[tokio::test]
async fn mismatched_state_skips_token_exchange() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(0).await;

    let (server, state) = app(&config(&github.uri(), false), users());
    let start_url = state
        .login_url("github_backend", &params("/contao/main", true))
        .unwrap()
        .unwrap();
    server.get(&relative(&start_url)).await;

    let response = server
        .get("/_oauth2_login/github_backend/backend")
        .add_query_param("code", "valid-code")
        .add_query_param("state", "forged")
        .await;

    // The stored target still applies to the failure redirect.
    assert_eq!(location(&response), "/contao/main");

    let list: ClientList = server.get("/_oauth2_clients/backend").await.json();
    assert_eq!(
        list.error.as_deref(),
        Some("Invalid OAuth2 state. Please start the login again.")
    );
}

#[tokio::test]
async fn cancelled_login_is_reported_as_missing_code() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(0).await;

    let (server, state) = app(&config(&github.uri(), false), users());
    let start_url = state
        .login_url("github_backend", &LoginUrlParams::default())
        .unwrap()
        .unwrap();
    let authorize = location(&server.get(&relative(&start_url)).await);

    let response = server
        .get("/_oauth2_login/github_backend/backend")
        .add_query_param("error", "access_denied")
        .add_query_param("state", query_param(&authorize, "state").unwrap())
        .await;

    assert_eq!(location(&response), "/contao");
    let list: ClientList = server.get("/_oauth2_clients/backend").await.json();
    assert_eq!(
        list.error.as_deref(),
        Some("The login was cancelled or no authorization code was returned.")
    );
}

#[tokio::test]
async fn unknown_member_goes_to_failure_path() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(1).await;
    github.user("stranger", Some("stranger@example.com")).await;

    let (server, state) = app(&config(&github.uri(), false), users());
    let start_url = state
        .login_url(
            "github_frontend",
            &LoginUrlParams {
                target_path: Some("/members".to_string()),
                always_use_target_path: false,
                failure_path: Some("/login-failed".to_string()),
            },
        )
        .unwrap()
        .unwrap();
    assert!(start_url.contains(&format!(
        "_failure_path={}",
        encode_failure_path("/login-failed").replace('=', "%3D")
    )));

    let authorize = location(&server.get(&relative(&start_url)).await);
    let response = server
        .get("/_oauth2_login/github_frontend/frontend")
        .add_query_param("code", "valid-code")
        .add_query_param("state", query_param(&authorize, "state").unwrap())
        .await;

    assert_eq!(location(&response), "/login-failed");

    let list: ClientList = server.get("/_oauth2_clients/frontend").await.json();
    assert_eq!(
        list.error.as_deref(),
        Some("No user with the email address \"stranger@example.com\" was found in the database.")
    );

    // The error is shown once.
    let list: ClientList = server.get("/_oauth2_clients/frontend").await.json();
    assert!(list.error.is_none());
}

#[tokio::test]
async fn rejected_code_hides_provider_details() {
    let github = FakeGitHub::start().await;
    github.reject_codes().await;

    let (server, state) = app(&config(&github.uri(), false), users());
    let start_url = state
        .login_url("github_backend", &LoginUrlParams::default())
        .unwrap()
        .unwrap();
    let authorize = location(&server.get(&relative(&start_url)).await);

    let response = server
        .get("/_oauth2_login/github_backend/backend")
        .add_query_param("code", "expired-code")
        .add_query_param("state", query_param(&authorize, "state").unwrap())
        .await;
    assert_eq!(location(&response), "/contao");

    let list: ClientList = server.get("/_oauth2_clients/backend").await.json();
    let error = list.error.unwrap();
    assert!(error.starts_with("GitHub user not accessible by integration."));
    assert!(!error.contains("bad_verification_code"));
}

#[tokio::test]
async fn client_list_is_per_realm() {
    let github = FakeGitHub::start().await;
    let (server, _) = app(&config(&github.uri(), false), users());

    let backend: ClientList = server.get("/_oauth2_clients/backend").await.json();
    let frontend: ClientList = server.get("/_oauth2_clients/frontend").await.json();

    let names = |list: &ClientList| list.clients.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&backend), ["github_backend"]);
    assert_eq!(names(&frontend), ["github_frontend"]);
    assert_eq!(backend.or, "or");

    server
        .get("/_oauth2_clients/admin")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_moves_session_to_new_id() {
    let github = FakeGitHub::start().await;
    github.expect_token_exchanges(1).await;
    github.user("jane-gh", Some("jane@example.com")).await;

    let (server, state, sessions) = app_with_sessions(&config(&github.uri(), false), users());
    let start_url = state
        .login_url("github_backend", &params("/contao/main", true))
        .unwrap()
        .unwrap();

    let response = server.get(&relative(&start_url)).await;
    let anonymous = session_id(&response);
    let oauth_state = query_param(&location(&response), "state").unwrap();

    let response = server
        .get("/_oauth2_login/github_backend/backend")
        .add_query_param("code", "valid-code")
        .add_query_param("state", &oauth_state)
        .await;
    assert_eq!(location(&response), "/contao/main");

    let authenticated = session_id(&response);
    assert_ne!(authenticated, anonymous);
    assert!(sessions.load(&anonymous).await.unwrap().is_none());

    let data = sessions.load(&authenticated).await.unwrap().unwrap();
    assert_eq!(
        data.user(Realm::Backend).map(|user| user.username.as_str()),
        Some("jane")
    );
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn anonymous_client_lists_store_no_sessions() {
    let github = FakeGitHub::start().await;
    let (_, state, sessions) = app_with_sessions(&config(&github.uri(), false), users());

    // A fresh server per request: no cookie is ever sent back.
    for _ in 0..100 {
        let server = axum_test::TestServer::new(router(state.clone())).unwrap();
        let response = server.get("/_oauth2_clients/backend").await;
        response.assert_status_ok();
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    assert!(sessions.is_empty());
}
