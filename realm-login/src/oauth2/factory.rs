//! Client factories
//!
//! One factory per configured client name. A factory owns the client's
//! configuration, builds a fresh provider client on demand and knows how to
//! turn a resource owner into a local user of its realm.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ClientConfig, LoginSettings};
use crate::oauth2::client::ProviderClient;
use crate::oauth2::http::HttpClient;
use crate::oauth2::matcher::resolve_active_user;
use crate::oauth2::providers::build_provider;
use crate::oauth2::types::{OAuthError, ProviderKind, Realm, ResourceOwner};
use crate::users::{LocalUser, UserStore, UserStoreError};

/// Per-client configuration and client construction
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Unique client name, e.g. `github_backend`
    fn name(&self) -> &str;

    /// Whether the client may be used
    fn is_enabled(&self) -> bool;

    /// Provider type
    fn provider_type(&self) -> ProviderKind;

    /// Realm the client logs users into
    fn realm(&self) -> Realm;

    /// Resource owner field matched against local users
    fn identifier_field(&self) -> &str;

    /// Build a provider client
    ///
    /// # Errors
    ///
    /// Returns an error if the provider endpoints are invalid
    fn create_client(&self) -> Result<Arc<dyn ProviderClient>, OAuthError>;

    /// Resolve a resource owner to an active local user of `realm`
    ///
    /// # Errors
    ///
    /// Returns an error if the user store fails
    async fn resolve_user(
        &self,
        owner: &ResourceOwner,
        realm: Realm,
    ) -> Result<Option<LocalUser>, UserStoreError>;
}

/// Factory built from a `[[clients]]` configuration entry
pub struct ConfiguredClientFactory {
    config: ClientConfig,
    settings: Arc<LoginSettings>,
    http: HttpClient,
    users: Arc<dyn UserStore>,
}

impl ConfiguredClientFactory {
    /// Create a factory
    pub fn new(
        config: ClientConfig,
        settings: Arc<LoginSettings>,
        http: HttpClient,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            config,
            settings,
            http,
            users,
        }
    }

    /// Client configuration
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl ClientFactory for ConfiguredClientFactory {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_enabled(&self) -> bool {
        self.config.enable_login
    }

    fn provider_type(&self) -> ProviderKind {
        self.config.provider
    }

    fn realm(&self) -> Realm {
        self.config.realm
    }

    fn identifier_field(&self) -> &str {
        &self.config.identifier_field
    }

    fn create_client(&self) -> Result<Arc<dyn ProviderClient>, OAuthError> {
        build_provider(&self.config, &self.settings, self.http.clone())
    }

    async fn resolve_user(
        &self,
        owner: &ResourceOwner,
        realm: Realm,
    ) -> Result<Option<LocalUser>, UserStoreError> {
        resolve_active_user(
            self.users.as_ref(),
            owner,
            realm,
            &self.config.identifier_field,
        )
        .await
    }
}
