//! Generic OAuth2 provider
//!
//! For identity providers without a dedicated implementation. All three
//! endpoints come from the client configuration and the resource owner
//! payload is used exactly as returned.

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::oauth2::client::ProviderClient;
use crate::oauth2::http::HttpClient;
use crate::oauth2::providers::base::BaseOAuthProvider;
use crate::oauth2::types::{AuthorizationRequest, OAuthError, OAuthToken, ResourceOwner};

/// Provider with explicitly configured endpoints
pub struct GenericProvider {
    base: BaseOAuthProvider,
}

impl GenericProvider {
    /// Create a new generic provider
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint is missing or invalid
    pub fn new(
        config: &ClientConfig,
        redirect_uri: String,
        http: HttpClient,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            base: BaseOAuthProvider::new(config, None, redirect_uri, http)?,
        })
    }
}

#[async_trait]
impl ProviderClient for GenericProvider {
    fn authorization_request(&self) -> AuthorizationRequest {
        self.base.authorization_request()
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, OAuthError> {
        self.base.exchange_code(code, pkce_verifier).await
    }

    async fn fetch_resource_owner(&self, token: &OAuthToken) -> Result<ResourceOwner, OAuthError> {
        self.base.fetch_resource_owner(token).await
    }
}
