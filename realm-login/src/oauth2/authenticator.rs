//! Login state machine
//!
//! `Idle -> AwaitingCallback -> (Success | Failed)`. The machine lives in the
//! realm's [`FlowState`] slot, not in memory: `start` fills the slot, the
//! callback reads it, and `on_success` / `on_failure` empty it.
//!
//! Validation failures are plain values ([`AuthFailure`]) so the callback can
//! short-circuit without unwinding. Network and store errors are mapped to a
//! failure kind at this boundary and logged; provider error bodies never reach
//! the browser.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::oauth2::events::{TokenAcquired, TokenEvents, TokenListener};
use crate::oauth2::factory::ClientFactory;
use crate::oauth2::flow_state::{FlowState, FlowStateBag};
use crate::oauth2::matcher::{UserMatcher, UserMatchers};
use crate::oauth2::messages::Translator;
use crate::oauth2::registry::ClientFactoryRegistry;
use crate::oauth2::target::TargetResolver;
use crate::oauth2::types::{OAuthError, ProviderKind, Realm};

/// Why a login attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Unknown, disabled, or other-realm client
    ClientNotActivated,
    /// The callback carried no authorization code
    NoAuthCode,
    /// The callback state is missing or does not match the stored one
    InvalidState,
    /// Token exchange or resource owner lookup failed
    IdentityProviderError,
    /// No active local user matches the resource owner
    UserNotFound {
        /// Realm that was searched
        realm: Realm,
    },
    /// Anything else
    Unexpected,
}

impl FailureKind {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ClientNotActivated => "client_not_activated",
            Self::NoAuthCode => "no_auth_code",
            Self::InvalidState => "invalid_state",
            Self::IdentityProviderError => "identity_provider_error",
            Self::UserNotFound {
                realm: Realm::Backend,
            } => "backend_user_not_found",
            Self::UserNotFound {
                realm: Realm::Frontend,
            } => "frontend_user_not_found",
            Self::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failed login attempt with its user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailure {
    /// Failure kind
    pub kind: FailureKind,
    /// Localized message, safe to show to the user
    pub message: String,
}

/// Local user resolved by a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Local user id
    pub id: i64,
    /// Local username
    pub username: String,
    /// Realm the user logged into
    pub realm: Realm,
    /// Client used for the login
    pub client_name: String,
    /// Base64-encoded target stored at start
    pub target_path: Option<String>,
    /// Whether the stored target wins over the security layer's target
    pub always_use_target_path: bool,
}

/// Terminal result of one callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The user was authenticated
    Success(AuthenticatedUser),
    /// The attempt failed
    Failure(AuthFailure),
}

impl AuthOutcome {
    /// Failure kind, if any
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }
}

/// Caller-supplied options of the start step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParams {
    /// Base64-encoded post-login target
    pub target_path: Option<String>,
    /// Prefer the stored target after success
    pub always_use_target_path: bool,
    /// Base64-encoded failure redirect for frontend members
    pub failure_path: Option<String>,
}

/// Query parameters of the provider callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Returned CSRF state
    pub state: Option<String>,
    /// Provider error code (e.g. `access_denied`)
    pub error: Option<String>,
    /// Provider error description
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parameters forwarded to token listeners; the code is left out
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        [
            ("state", &self.state),
            ("error", &self.error),
            ("error_description", &self.error_description),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
    }
}

/// Redirect to the provider's authorization endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRedirect {
    /// Authorization URL including state
    pub url: String,
}

/// The authentication state machine
#[derive(Clone)]
pub struct Authenticator {
    registry: Arc<ClientFactoryRegistry>,
    matchers: UserMatchers,
    events: TokenEvents,
    targets: TargetResolver,
    translator: Translator,
    timeout: Duration,
}

impl Authenticator {
    /// Create an authenticator without matchers or listeners
    pub fn new(
        registry: Arc<ClientFactoryRegistry>,
        targets: TargetResolver,
        translator: Translator,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            matchers: UserMatchers::new(),
            events: TokenEvents::new(),
            targets,
            translator,
            timeout,
        }
    }

    /// Add a user matcher; matchers are tried in insertion order
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn UserMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Add a token listener
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn TokenListener>) -> Self {
        self.events.subscribe(listener);
        self
    }

    /// Client registry
    #[must_use]
    pub fn registry(&self) -> &ClientFactoryRegistry {
        &self.registry
    }

    /// Message catalog
    #[must_use]
    pub const fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Target resolver
    #[must_use]
    pub const fn targets(&self) -> &TargetResolver {
        &self.targets
    }

    /// Begin a login: store fresh flow state and return the provider redirect
    ///
    /// No provider call is made; the authorization URL is built locally.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotActivated` for unknown, disabled or other-realm
    /// clients, and `Unexpected` if the provider client cannot be built.
    pub fn start(
        &self,
        bag: &mut FlowStateBag,
        client_name: &str,
        realm: Realm,
        params: StartParams,
    ) -> Result<AuthorizationRedirect, AuthFailure> {
        let factory = self.active_factory(client_name, realm)?;

        let client = factory.create_client().map_err(|e| {
            tracing::error!(
                client = client_name,
                provider = %factory.provider_type(),
                error = %e,
                "Failed to build OAuth2 client"
            );
            self.failure(FailureKind::Unexpected, factory.as_ref(), None)
        })?;

        let request = client.authorization_request();

        let target_path = params
            .target_path
            .filter(|target| !target.trim().is_empty())
            .unwrap_or_else(|| self.targets.default_encoded(realm));

        bag.set(
            realm,
            FlowState {
                expected_state: Some(request.state),
                target_path: Some(target_path),
                always_use_target_path: params.always_use_target_path,
                failure_path: params.failure_path.filter(|path| !path.is_empty()),
                pkce_verifier: request.pkce_verifier,
            },
        );

        tracing::debug!(client = client_name, realm = %realm, "Redirecting to identity provider");

        Ok(AuthorizationRedirect { url: request.url })
    }

    /// Process the provider callback
    ///
    /// On success the realm's flow state is cleared. On failure it is kept so
    /// [`Self::on_failure`] can read the failure target.
    pub async fn handle_callback(
        &self,
        bag: &mut FlowStateBag,
        client_name: &str,
        realm: Realm,
        params: &CallbackParams,
    ) -> AuthOutcome {
        match self.authenticate(bag.get(realm), client_name, realm, params).await {
            Ok(user) => {
                bag.clear(realm);
                tracing::info!(
                    client = client_name,
                    realm = %realm,
                    user_id = user.id,
                    username = %user.username,
                    "OAuth2 login succeeded"
                );
                AuthOutcome::Success(user)
            }
            Err(failure) => AuthOutcome::Failure(failure),
        }
    }

    /// Redirect target after a failure; always empties the realm's flow state
    pub fn on_failure(&self, bag: &mut FlowStateBag, realm: Realm) -> String {
        let target = self.targets.failure_target(bag.get(realm), realm);
        bag.clear(realm);
        target
    }

    /// Redirect target after success; always empties the realm's flow state
    ///
    /// The target stored at start travels on the [`AuthenticatedUser`] since
    /// the callback already cleared the slot.
    pub fn on_success(
        &self,
        bag: &mut FlowStateBag,
        user: &AuthenticatedUser,
        security_target: Option<&str>,
    ) -> String {
        bag.clear(user.realm);
        let state = FlowState {
            target_path: user.target_path.clone(),
            always_use_target_path: user.always_use_target_path,
            ..FlowState::default()
        };
        self.targets.success_target(&state, user.realm, security_target)
    }

    async fn authenticate(
        &self,
        state: &FlowState,
        client_name: &str,
        realm: Realm,
        params: &CallbackParams,
    ) -> Result<AuthenticatedUser, AuthFailure> {
        let factory = self.active_factory(client_name, realm)?;
        let factory = factory.as_ref();
        let provider = factory.provider_type();

        let Some(code) = params.code.as_deref().filter(|code| !code.is_empty()) else {
            tracing::warn!(
                client = client_name,
                provider = %provider,
                error = params.error.as_deref().unwrap_or_default(),
                error_description = params.error_description.as_deref().unwrap_or_default(),
                "OAuth2 callback without authorization code"
            );
            return Err(self.failure(FailureKind::NoAuthCode, factory, None));
        };

        let returned = params.state.as_deref().unwrap_or_default();
        let expected = state.expected_state.as_deref().unwrap_or_default();
        if returned.is_empty() || expected.is_empty() || returned != expected {
            tracing::warn!(client = client_name, provider = %provider, "Invalid OAuth2 state");
            return Err(self.failure(FailureKind::InvalidState, factory, None));
        }

        let client = factory
            .create_client()
            .map_err(|e| self.unexpected(factory, &e))?;

        let token = self
            .provider_call(
                factory,
                client.exchange_code(code, state.pkce_verifier.as_deref()),
            )
            .await?;

        let event = TokenAcquired {
            client_name: client_name.to_string(),
            provider,
            realm,
            token: token.clone(),
            request: params.to_pairs(),
        };
        self.events
            .emit(&event)
            .await
            .map_err(|e| self.unexpected(factory, e.as_ref()))?;

        let owner = self
            .provider_call(factory, client.fetch_resource_owner(&token))
            .await?;

        let resolved = match self.matchers.find(client_name) {
            Some(matcher) => matcher.resolve(&owner, realm).await,
            None => factory.resolve_user(&owner, realm).await,
        }
        .map_err(|e| self.unexpected(factory, &e))?;

        let Some(user) = resolved else {
            let identifier = owner.identifier(factory.identifier_field());
            tracing::info!(
                client = client_name,
                realm = %realm,
                identifier_field = factory.identifier_field(),
                "No active local user matches the resource owner"
            );
            return Err(self.failure(
                FailureKind::UserNotFound { realm },
                factory,
                identifier.as_deref(),
            ));
        };

        Ok(AuthenticatedUser {
            id: user.id,
            username: user.username,
            realm,
            client_name: client_name.to_string(),
            target_path: state.target_path.clone(),
            always_use_target_path: state.always_use_target_path,
        })
    }

    fn active_factory(
        &self,
        client_name: &str,
        realm: Realm,
    ) -> Result<Arc<dyn ClientFactory>, AuthFailure> {
        let not_activated = |reason: &str| {
            tracing::warn!(client = client_name, realm = %realm, reason, "OAuth2 client not activated");
            AuthFailure {
                kind: FailureKind::ClientNotActivated,
                message: self.translator.failure(
                    &FailureKind::ClientNotActivated,
                    ProviderKind::Generic,
                    "",
                    None,
                ),
            }
        };

        let factory = self
            .registry
            .get(client_name)
            .map_err(|_| not_activated("unknown client"))?;

        if !factory.is_enabled() {
            return Err(not_activated("disabled"));
        }
        if factory.realm() != realm {
            return Err(not_activated("realm mismatch"));
        }

        Ok(factory)
    }

    async fn provider_call<T>(
        &self,
        factory: &dyn ClientFactory,
        call: impl Future<Output = Result<T, OAuthError>>,
    ) -> Result<T, AuthFailure> {
        let error = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => OAuthError::Timeout(self.timeout),
        };

        tracing::warn!(
            client = factory.name(),
            provider = %factory.provider_type(),
            error = %error,
            "Identity provider error"
        );
        Err(self.failure(FailureKind::IdentityProviderError, factory, None))
    }

    fn unexpected(&self, factory: &dyn ClientFactory, error: &dyn std::error::Error) -> AuthFailure {
        tracing::error!(
            client = factory.name(),
            provider = %factory.provider_type(),
            error = %error,
            "Unexpected OAuth2 login error"
        );
        self.failure(FailureKind::Unexpected, factory, None)
    }

    fn failure(
        &self,
        kind: FailureKind,
        factory: &dyn ClientFactory,
        identifier: Option<&str>,
    ) -> AuthFailure {
        AuthFailure {
            kind,
            message: self.translator.failure(
                &kind,
                factory.provider_type(),
                factory.identifier_field(),
                identifier,
            ),
        }
    }
}
