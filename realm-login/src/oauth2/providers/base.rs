//! Base OAuth2 provider implementation with shared logic
//!
//! `BaseOAuthProvider` holds the configured `oauth2` client plus the resource
//! owner endpoint. GitHub, Google and generic providers wrap it and add their
//! provider-specific resource owner handling.

use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};

use crate::config::ClientConfig;
use crate::oauth2::http::{execute, HttpClient, HttpClientError};
use crate::oauth2::types::{
    AuthorizationRequest, ConfiguredClient, OAuthError, OAuthToken, ResourceOwner,
};

/// Endpoints and default scopes of a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderDefaults {
    /// Authorization endpoint
    pub auth_url: &'static str,
    /// Token endpoint
    pub token_url: &'static str,
    /// Resource owner endpoint
    pub resource_owner_url: &'static str,
    /// Scopes requested when the client configures none
    pub scopes: &'static [&'static str],
}

/// Base OAuth2 provider containing shared logic for all providers
pub struct BaseOAuthProvider {
    client: ConfiguredClient,
    http: HttpClient,
    resource_owner_url: String,
    scopes: Vec<String>,
    use_pkce: bool,
}

impl BaseOAuthProvider {
    /// Create a provider from a client configuration
    ///
    /// Endpoints configured on the client override the provider defaults.
    /// With `defaults` set to `None` every endpoint must be configured.
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint is missing or any URL is invalid
    pub fn new(
        config: &ClientConfig,
        defaults: Option<ProviderDefaults>,
        redirect_uri: String,
        http: HttpClient,
    ) -> Result<Self, OAuthError> {
        let endpoint = |configured: &Option<String>, fallback: Option<&str>, kind: &'static str| {
            configured
                .clone()
                .or_else(|| fallback.map(str::to_string))
                .ok_or_else(|| OAuthError::InvalidEndpoint {
                    kind,
                    message: "not configured".to_string(),
                })
        };

        let auth_url = endpoint(&config.auth_url, defaults.map(|d| d.auth_url), "auth")?;
        let token_url = endpoint(&config.token_url, defaults.map(|d| d.token_url), "token")?;
        let resource_owner_url = endpoint(
            &config.resource_owner_url,
            defaults.map(|d| d.resource_owner_url),
            "resource owner",
        )?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(auth_url).map_err(|e| OAuthError::InvalidEndpoint {
                kind: "auth",
                message: e.to_string(),
            })?)
            .set_token_uri(TokenUrl::new(token_url).map_err(|e| OAuthError::InvalidEndpoint {
                kind: "token",
                message: e.to_string(),
            })?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri).map_err(|e| {
                OAuthError::InvalidEndpoint {
                    kind: "redirect",
                    message: e.to_string(),
                }
            })?);

        let scopes = if config.scopes.is_empty() {
            defaults
                .map(|d| d.scopes.iter().map(|s| (*s).to_string()).collect())
                .unwrap_or_default()
        } else {
            config.scopes.clone()
        };

        Ok(Self {
            client,
            http,
            resource_owner_url,
            scopes,
            use_pkce: config.use_pkce,
        })
    }

    /// Generate the authorization URL with a random state and optional PKCE challenge
    #[must_use]
    pub fn authorization_request(&self) -> AuthorizationRequest {
        let mut builder = self.client.authorize_url(CsrfToken::new_random);

        for scope in &self.scopes {
            builder = builder.add_scope(Scope::new(scope.clone()));
        }

        let mut pkce_verifier = None;
        if self.use_pkce {
            let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
            builder = builder.set_pkce_challenge(challenge);
            pkce_verifier = Some(verifier.secret().clone());
        }

        let (url, state) = builder.url();

        AuthorizationRequest {
            url: url.to_string(),
            state: state.secret().clone(),
            pkce_verifier,
        }
    }

    /// Exchange authorization code for access token
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Timeout` if the token endpoint does not answer in
    /// time, `OAuthError::TokenExchangeFailed` otherwise
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, OAuthError> {
        let transport =
            |request: oauth2::HttpRequest| execute(self.http.reqwest().clone(), request);

        let mut request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()));
        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_string()));
        }

        let token_response = request
            .request_async(&transport)
            .await
            .map_err(|e| match e {
                RequestTokenError::Request(HttpClientError::Request(err)) if err.is_timeout() => {
                    OAuthError::Timeout(self.http.timeout())
                }
                other => OAuthError::TokenExchangeFailed(other.to_string()),
            })?;

        Ok(OAuthToken {
            access_token: token_response.access_token().secret().clone(),
            refresh_token: token_response
                .refresh_token()
                .map(|t| t.secret().clone()),
            token_type: "Bearer".to_string(),
            expires_at: token_response
                .expires_in()
                .map(|duration| std::time::SystemTime::now() + duration),
            scopes: token_response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect()),
        })
    }

    /// Fetch the resource owner JSON from the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP request fails or returns non-success status
    pub async fn fetch_resource_owner(
        &self,
        token: &OAuthToken,
    ) -> Result<ResourceOwner, OAuthError> {
        self.fetch_json(&self.resource_owner_url, token)
            .await
            .map(ResourceOwner::from_value)
    }

    /// Fetch any JSON document with the token's bearer credentials
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP request fails or returns non-success status
    pub async fn fetch_json(
        &self,
        url: &str,
        token: &OAuthToken,
    ) -> Result<serde_json::Value, OAuthError> {
        self.http.get_json(url, &token.access_token).await
    }

    /// Resource owner endpoint
    #[must_use]
    pub fn resource_owner_url(&self) -> &str {
        &self.resource_owner_url
    }

    /// Scopes requested during authorization
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}
