//! OAuth2 provider implementations
//!
//! This module contains implementations for the supported providers:
//! - GitHub OAuth2
//! - Google OAuth2
//! - Generic OAuth2 with configured endpoints
//!
//! All providers use a shared `BaseOAuthProvider` to eliminate code duplication.

pub mod base;
pub mod generic;
pub mod github;
pub mod google;

pub use base::{BaseOAuthProvider, ProviderDefaults};
pub use generic::GenericProvider;
pub use github::GitHubProvider;
pub use google::GoogleProvider;

use std::sync::Arc;

use crate::config::{ClientConfig, LoginSettings};
use crate::oauth2::client::ProviderClient;
use crate::oauth2::http::HttpClient;
use crate::oauth2::types::{OAuthError, ProviderKind};

/// Build the provider client for a configured client
///
/// # Errors
///
/// Returns error if the client's endpoints are missing or invalid
pub fn build_provider(
    config: &ClientConfig,
    settings: &LoginSettings,
    http: HttpClient,
) -> Result<Arc<dyn ProviderClient>, OAuthError> {
    let redirect_uri = config.redirect_uri(settings);

    Ok(match config.provider {
        ProviderKind::GitHub => Arc::new(GitHubProvider::new(config, redirect_uri, http)?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(config, redirect_uri, http)?),
        ProviderKind::Generic => Arc::new(GenericProvider::new(config, redirect_uri, http)?),
    })
}
