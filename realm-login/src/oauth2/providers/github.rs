//! GitHub OAuth2 provider implementation
//!
//! GitHub only returns the public email on `/user`. When the user keeps their
//! address private, the primary verified address is looked up on
//! `/user/emails` and merged into the resource owner payload.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::oauth2::client::ProviderClient;
use crate::oauth2::http::HttpClient;
use crate::oauth2::providers::base::{BaseOAuthProvider, ProviderDefaults};
use crate::oauth2::types::{AuthorizationRequest, OAuthError, OAuthToken, ResourceOwner};

/// GitHub endpoints and default scopes
pub const GITHUB_DEFAULTS: ProviderDefaults = ProviderDefaults {
    auth_url: "https://github.com/login/oauth/authorize",
    token_url: "https://github.com/login/oauth/access_token",
    resource_owner_url: "https://api.github.com/user",
    scopes: &["read:user", "user:email"],
};

/// GitHub OAuth2 provider
pub struct GitHubProvider {
    base: BaseOAuthProvider,
}

impl GitHubProvider {
    /// Create a new GitHub OAuth2 provider
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
            base: BaseOAuthProvider::new(config, Some(GITHUB_DEFAULTS), redirect_uri, http)?,
        })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.base.resource_owner_url().trim_end_matches('/'))
    }

    async fn primary_email(&self, token: &OAuthToken) -> Option<String> {
        let value = match self.base.fetch_json(&self.emails_url(), token).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "GitHub email lookup failed");
                return None;
            }
        };

        let emails: Vec<GitHubEmail> = serde_json::from_value(value).ok()?;

        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
    }
}

#[async_trait]
impl ProviderClient for GitHubProvider {
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

        if owner.identifier("email").is_none() {
            if let Some(email) = self.primary_email(token).await {
                owner.insert("email", serde_json::Value::String(email));
            }
        }

        Ok(owner)
    }
}

/// GitHub email response
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    verified: bool,
    primary: bool,
}
