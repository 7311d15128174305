//! Google OAuth2 provider implementation

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::oauth2::client::ProviderClient;
use crate::oauth2::http::HttpClient;
use crate::oauth2::providers::base::{BaseOAuthProvider, ProviderDefaults};
use crate::oauth2::types::{AuthorizationRequest, OAuthError, OAuthToken, ResourceOwner};

/// Google endpoints and default scopes
pub const GOOGLE_DEFAULTS: ProviderDefaults = ProviderDefaults {
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    resource_owner_url: "https://www.googleapis.com/oauth2/v2/userinfo",
    scopes: &["openid", "email", "profile"],
};

/// Google OAuth2 provider
pub struct GoogleProvider {
    base: BaseOAuthProvider,
}

impl GoogleProvider {
    /// Create a new Google OAuth2 provider
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(
        config: &ClientConfig,
        redirect_uri: String,
        http: HttpClient,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            base: BaseOAuthProvider::new(config, Some(GOOGLE_DEFAULTS), redirect_uri, http)?,
        })
    }
}

#[async_trait]
impl ProviderClient for GoogleProvider {
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
        let mut owner = self.base.fetch_resource_owner(token).await?;

        // Unverified addresses must never match a local account.
        if owner.get("verified_email") == Some(&serde_json::Value::Bool(false)) {
            owner.insert("email", serde_json::Value::Null);
        }

        Ok(owner)
    }
}
