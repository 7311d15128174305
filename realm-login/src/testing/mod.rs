//! Test doubles for the login flow
//!
//! - [`StubClient`] - provider client with call counters and canned responses
//! - [`StubFactory`] - factory handing out one shared `StubClient`
//! - [`RecordingListener`] - token listener that records events

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::oauth2::client::ProviderClient;
use crate::oauth2::events::{ListenerError, TokenAcquired, TokenListener};
use crate::oauth2::factory::ClientFactory;
use crate::oauth2::matcher::resolve_active_user;
use crate::oauth2::types::{
    AuthorizationRequest, OAuthError, OAuthToken, ProviderKind, Realm, ResourceOwner,
};
use crate::users::{InMemoryUserStore, LocalUser, UserStoreError};

/// Provider client returning canned responses
#[derive(Default)]
pub struct StubClient {
    exchanges: AtomicUsize,
    owner_fetches: AtomicUsize,
    last_code: Mutex<Option<String>>,
    owner: ResourceOwner,
    exchange_error: Option<String>,
    exchange_delay: Option<Duration>,
}

impl StubClient {
    /// Number of token exchanges attempted
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Number of resource owner fetches attempted
    pub fn owner_fetches(&self) -> usize {
        self.owner_fetches.load(Ordering::SeqCst)
    }

    /// Code passed to the last exchange
    pub fn last_code(&self) -> Option<String> {
        self.last_code.lock().clone()
    }
}

#[async_trait]
impl ProviderClient for StubClient {
    fn authorization_request(&self) -> AuthorizationRequest {
        let state = uuid::Uuid::new_v4().simple().to_string();
        AuthorizationRequest {
            url: format!("https://provider.test/authorize?client_id=stub&state={state}"),
            state,
            pkce_verifier: None,
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        _pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, OAuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        *self.last_code.lock() = Some(code.to_string());

        if let Some(delay) = self.exchange_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.exchange_error {
            Some(message) => Err(OAuthError::TokenExchangeFailed(message.clone())),
            None => Ok(OAuthToken::bearer(format!("token-for-{code}"))),
        }
    }

    async fn fetch_resource_owner(&self, _token: &OAuthToken) -> Result<ResourceOwner, OAuthError> {
        self.owner_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.owner.clone())
    }
}

/// Client factory backed by a [`StubClient`] and an in-memory user store
pub struct StubFactory {
    name: String,
    realm: Realm,
    enabled: bool,
    identifier_field: String,
    client: Arc<StubClient>,
    users: InMemoryUserStore,
    created: AtomicUsize,
}

impl StubFactory {
    /// Enabled factory with an empty resource owner and no users
    pub fn new(name: impl Into<String>, realm: Realm) -> Self {
        Self {
            name: name.into(),
            realm,
            enabled: true,
            identifier_field: "email".to_string(),
            client: Arc::new(StubClient::default()),
            users: InMemoryUserStore::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Disable the client
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Resource owner returned by the provider
    #[must_use]
    pub fn with_owner(mut self, payload: serde_json::Value) -> Self {
        self.client_mut().owner = ResourceOwner::from_value(payload);
        self
    }

    /// Add a local user
    #[must_use]
    pub fn with_user(self, user: LocalUser) -> Self {
        self.users.insert(user);
        self
    }

    /// Make every token exchange fail with `message`
    #[must_use]
    pub fn failing_exchange(mut self, message: &str) -> Self {
        self.client_mut().exchange_error = Some(message.to_string());
        self
    }

    /// Delay every token exchange
    #[must_use]
    pub fn slow_exchange(mut self, delay: Duration) -> Self {
        self.client_mut().exchange_delay = Some(delay);
        self
    }

    /// The shared stub client
    pub fn client(&self) -> Arc<StubClient> {
        Arc::clone(&self.client)
    }

    /// Number of `create_client` calls
    pub fn clients_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn client_mut(&mut self) -> &mut StubClient {
        Arc::get_mut(&mut self.client).expect("stub client is configured before it is shared")
    }
}

#[async_trait]
impl ClientFactory for StubFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn provider_type(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    fn realm(&self) -> Realm {
        self.realm
    }

    fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    fn create_client(&self) -> Result<Arc<dyn ProviderClient>, OAuthError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }

    async fn resolve_user(
        &self,
        owner: &ResourceOwner,
        realm: Realm,
    ) -> Result<Option<LocalUser>, UserStoreError> {
        resolve_active_user(&self.users, owner, realm, &self.identifier_field).await
    }
}

/// Token listener recording every event
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<TokenAcquired>>,
    fail: bool,
}

impl RecordingListener {
    /// Listener that records the event, then fails
    pub fn failing() -> Self {
        Self {
            events: Mutex::default(),
            fail: true,
        }
    }

    /// Recorded events
    pub fn events(&self) -> Vec<TokenAcquired> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl TokenListener for RecordingListener {
    async fn on_token_acquired(&self, event: &TokenAcquired) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        if self.fail {
            return Err("provisioning failed".into());
        }
        Ok(())
    }
}
