//! OAuth2 login endpoints
//!
//! - `GET|POST /_start_oauth2_login/{client}/{realm}`: verify the signed
//!   start URL, store the flow state and redirect to the provider
//! - `GET /_oauth2_login/{client}/{realm}`: provider callback, always ends in
//!   a redirect
//! - `GET /_oauth2_clients/{realm}`: enabled clients of a realm with their
//!   signed start URLs, for rendering login buttons

use axum::{
    extract::{OriginalUri, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::LoginError;
use crate::oauth2::authenticator::{AuthOutcome, CallbackParams, StartParams};
use crate::oauth2::flow_state::FlowState;
use crate::oauth2::signing::LoginUrlParams;
use crate::oauth2::types::{ProviderKind, Realm};
use crate::session::{RenewSession, Session, SessionData, SessionLayer};
use crate::state::AppState;

/// Name of the request token parameter
pub const REQUEST_TOKEN_PARAM: &str = "REQUEST_TOKEN";

/// Query parameters of the start endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartQuery {
    /// Base64-encoded post-login target
    #[serde(rename = "_target_path")]
    pub target_path: Option<String>,
    /// `1` to prefer the target over the security layer's own
    #[serde(rename = "_always_use_target_path")]
    pub always_use_target_path: Option<String>,
    /// Base64-encoded failure redirect (frontend only)
    #[serde(rename = "_failure_path")]
    pub failure_path: Option<String>,
    /// Session request token
    #[serde(rename = "REQUEST_TOKEN")]
    pub request_token: Option<String>,
}

impl StartQuery {
    fn start_params(&self) -> StartParams {
        StartParams {
            target_path: self.target_path.clone(),
            always_use_target_path: self
                .always_use_target_path
                .as_deref()
                .is_some_and(|v| matches!(v, "1" | "true" | "on")),
            failure_path: self.failure_path.clone(),
        }
    }
}

/// Form body of a POSTed start request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartForm {
    /// Session request token
    #[serde(rename = "REQUEST_TOKEN")]
    pub request_token: Option<String>,
}

/// Query parameters of the client listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientsQuery {
    /// Plain post-login target to embed in the start URLs
    pub target_path: Option<String>,
    /// Plain failure path to embed in the start URLs
    pub failure_path: Option<String>,
    /// Prefer the embedded target after login
    #[serde(default)]
    pub always_use_target_path: bool,
}

/// One login button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientButton {
    /// Client name
    pub name: String,
    /// Provider type
    pub provider: ProviderKind,
    /// Button label
    pub label: String,
    /// Signed start URL
    pub url: String,
}

/// Login buttons of a realm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientList {
    /// Realm
    pub realm: Realm,
    /// Separator text between the login form and the buttons
    pub or: String,
    /// Request token to submit with POSTed start requests
    pub request_token: String,
    /// Message of the last failed login, shown once
    pub error: Option<String>,
    /// Enabled clients in registration order
    pub clients: Vec<ClientButton>,
}

/// Build the login router
pub fn router(state: AppState) -> Router {
    let session_layer = SessionLayer::new(state.sessions(), state.session_config().clone());

    Router::new()
        .route(
            "/_start_oauth2_login/{client}/{realm}",
            get(start_login).post(start_login_form),
        )
        .route("/_oauth2_login/{client}/{realm}", get(handle_callback))
        .route("/_oauth2_clients/{realm}", get(list_clients))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start a login from a signed link
///
/// # Errors
///
/// Returns error if the realm is unknown, the signature is invalid or the
/// request token check fails
pub async fn start_login(
    State(state): State<AppState>,
    Path((client_name, realm)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<StartQuery>,
    Session(_, data): Session,
) -> Result<Response, LoginError> {
    let uri = uri.path_and_query().map_or_else(|| uri.path().to_string(), ToString::to_string);
    start(&state, &client_name, &realm, &uri, &query, data)
}

/// Start a login from a form posted to a signed URL
///
/// # Errors
///
/// Same as [`start_login`]
pub async fn start_login_form(
    State(state): State<AppState>,
    Path((client_name, realm)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    Query(mut query): Query<StartQuery>,
    Session(_, data): Session,
    Form(form): Form<StartForm>,
) -> Result<Response, LoginError> {
    if form.request_token.is_some() {
        query.request_token = form.request_token;
    }
    let uri = uri.path_and_query().map_or_else(|| uri.path().to_string(), ToString::to_string);
    start(&state, &client_name, &realm, &uri, &query, data)
}

fn start(
    state: &AppState,
    client_name: &str,
    realm: &str,
    uri: &str,
    query: &StartQuery,
    mut data: SessionData,
) -> Result<Response, LoginError> {
    let realm = parse_realm(realm)?;
    let authenticator = state.authenticator();
    let translator = authenticator.translator();

    if !state.signer().check_excluding(uri, &[REQUEST_TOKEN_PARAM]) {
        tracing::warn!(client = client_name, realm = %realm, "Rejected start URL with invalid signature");
        return Err(LoginError::InvalidSignature(
            translator.invalid_signature().to_string(),
        ));
    }

    if state.settings().enable_csrf_token_check
        && !query
            .request_token
            .as_deref()
            .is_some_and(|token| data.check_request_token(token))
    {
        tracing::warn!(client = client_name, realm = %realm, "Rejected start request with invalid request token");
        return Err(LoginError::InvalidRequestToken(
            translator.invalid_request_token().to_string(),
        ));
    }

    let params = query.start_params();

    match authenticator.start(&mut data.flow, client_name, realm, params.clone()) {
        Ok(redirect) => Ok((Extension(data), Redirect::to(&redirect.url)).into_response()),
        Err(failure) => {
            // Failure redirect goes to the caller's paths, not a stale slot.
            data.flow.set(
                realm,
                FlowState {
                    target_path: params.target_path,
                    always_use_target_path: params.always_use_target_path,
                    failure_path: params.failure_path,
                    ..FlowState::default()
                },
            );
            let target = authenticator.on_failure(&mut data.flow, realm);
            data.record_failure(failure);
            Ok((Extension(data), Redirect::to(&target)).into_response())
        }
    }
}

/// Provider callback
///
/// # Errors
///
/// Returns error only for an unknown realm; authentication failures redirect
pub async fn handle_callback(
    State(state): State<AppState>,
    Path((client_name, realm)): Path<(String, String)>,
    Query(params): Query<CallbackParams>,
    Session(_, mut data): Session,
) -> Result<Response, LoginError> {
    let realm = parse_realm(&realm)?;
    let authenticator = state.authenticator();

    match authenticator
        .handle_callback(&mut data.flow, &client_name, realm, &params)
        .await
    {
        AuthOutcome::Success(user) => {
            let target = authenticator.on_success(&mut data.flow, &user, None);
            data.set_user(user);
            // The authenticated session must not keep the id issued before login.
            Ok((Extension(data), Extension(RenewSession), Redirect::to(&target)).into_response())
        }
        AuthOutcome::Failure(failure) => {
            let target = authenticator.on_failure(&mut data.flow, realm);
            data.record_failure(failure);
            Ok((Extension(data), Redirect::to(&target)).into_response())
        }
    }
}

/// Enabled clients of a realm
///
/// Consumes the last login error of the session.
///
/// # Errors
///
/// Returns error if the realm is unknown or a start URL cannot be signed
pub async fn list_clients(
    State(state): State<AppState>,
    Path(realm): Path<String>,
    Query(query): Query<ClientsQuery>,
    Session(_, mut data): Session,
) -> Result<Response, LoginError> {
    let realm = parse_realm(&realm)?;
    let translator = state.authenticator().translator();

    let params = LoginUrlParams {
        target_path: query.target_path,
        always_use_target_path: query.always_use_target_path,
        failure_path: query.failure_path.filter(|_| realm == Realm::Frontend),
    };

    let mut clients = Vec::new();
    for factory in state.authenticator().registry().list_by_realm(realm) {
        let Some(url) = state.login_url(factory.name(), &params)? else {
            continue;
        };
        clients.push(ClientButton {
            name: factory.name().to_string(),
            provider: factory.provider_type(),
            label: translator.button_label(factory.provider_type()),
            url,
        });
    }

    let error = data.take_last_error().map(|failure| failure.message);
    // The handed-out request token has to survive until the start request.
    let keep_session = error.is_some() || state.settings().enable_csrf_token_check;

    let list = ClientList {
        realm,
        or: translator.or().to_string(),
        request_token: data.request_token.clone(),
        error,
        clients,
    };

    if keep_session {
        Ok((Extension(data), Json(list)).into_response())
    } else {
        Ok(Json(list).into_response())
    }
}

fn parse_realm(realm: &str) -> Result<Realm, LoginError> {
    realm
        .parse()
        .map_err(|_| LoginError::BadRequest(format!("Unknown realm: {realm}")))
}
