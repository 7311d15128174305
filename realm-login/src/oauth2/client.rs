//! Provider client abstraction
//!
//! A `ProviderClient` performs the three provider round trips of the
//! authorization-code grant. Implementations live in [`crate::oauth2::providers`];
//! tests substitute stubs.

use async_trait::async_trait;

use crate::oauth2::types::{AuthorizationRequest, OAuthError, OAuthToken, ResourceOwner};

/// OAuth2 client bound to one configured provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Build the authorization redirect, including a fresh random state
    fn authorization_request(&self) -> AuthorizationRequest;

    /// Exchange an authorization code for an access token
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the code or cannot be reached
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<OAuthToken, OAuthError>;

    /// Fetch the resource owner described by the token
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the token or cannot be reached
    async fn fetch_resource_owner(&self, token: &OAuthToken) -> Result<ResourceOwner, OAuthError>;
}
