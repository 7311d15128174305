//! Core OAuth2 types
//!
//! This module defines the foundational types shared by the login flow:
//! realms, provider kinds, tokens, resource owner payloads, and provider errors.

use oauth2::basic::BasicClient;
use oauth2::{EndpointNotSet, EndpointSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Type alias for a configured OAuth2 client with auth and token endpoints set
///
/// The type parameters indicate which endpoints are configured:
/// - `EndpointSet` for `HasAuthUrl` - Authorization endpoint is configured
/// - `EndpointNotSet` for `HasDeviceAuthUrl` - Device auth not used
/// - `EndpointNotSet` for `HasIntrospectionUrl` - Token introspection not used
/// - `EndpointNotSet` for `HasRevocationUrl` - Token revocation not used
/// - `EndpointSet` for `HasTokenUrl` - Token exchange endpoint is configured
pub type ConfiguredClient = BasicClient<
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// Login audience
///
/// Each realm has its own user store, its own session scope and its own
/// default landing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Realm {
    /// Administrative users
    Backend,
    /// Public-facing members
    Frontend,
}

impl Realm {
    /// Both realms, in a stable order
    pub const ALL: [Self; 2] = [Self::Backend, Self::Frontend];

    /// Get the realm as a string (lowercase)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Realm {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "frontend" => Ok(Self::Frontend),
            _ => Err(OAuthError::UnknownRealm(s.to_string())),
        }
    }
}

/// OAuth2 provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// GitHub OAuth2
    GitHub,
    /// Google OAuth2
    Google,
    /// Any OAuth2 provider with explicitly configured endpoints
    Generic,
}

impl ProviderKind {
    /// Get the provider as a string (lowercase)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Google => "google",
            Self::Generic => "generic",
        }
    }

    /// Human readable provider name, used for button labels
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::Google => "Google",
            Self::Generic => "OAuth2",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "google" => Ok(Self::Google),
            "generic" => Ok(Self::Generic),
            _ => Err(OAuthError::UnknownProvider(s.to_string())),
        }
    }
}

/// Authorization redirect produced by a provider client
///
/// `state` is the CSRF token embedded in `url`; it must be stored in the
/// realm's flow state and compared against the callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Full provider authorization URL
    pub url: String,
    /// CSRF state value embedded in the URL
    pub state: String,
    /// PKCE verifier, when PKCE is enabled for the client
    pub pkce_verifier: Option<String>,
}

/// OAuth2 access token
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Access token
    pub access_token: String,
    /// Refresh token (if provided)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// When the token expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<SystemTime>,
    /// OAuth2 scopes granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

impl OAuthToken {
    /// Create a bearer token without expiry or scopes
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: None,
            scopes: None,
        }
    }

    /// Check if the access token has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires| SystemTime::now() > expires)
    }
}

// Tokens are secrets; keep them out of logs.
impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Resource owner payload returned by a provider
///
/// Opaque key/value mapping describing the authenticated external identity.
/// Only the configured identifier field is ever read by the login flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceOwner(serde_json::Map<String, serde_json::Value>);

impl ResourceOwner {
    /// Wrap a raw JSON object
    #[must_use]
    pub const fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }

    /// Build a payload from a JSON value; non-objects yield an empty payload
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Read a field as a string, exactly as the provider sent it
    ///
    /// Blank strings count as missing. Numbers are rendered as strings so numeric provider ids can be used as
    /// identifiers. Nulls, empty strings, arrays and objects yield `None`.
    #[must_use]
    pub fn identifier(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Raw access to a field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    /// Set or replace a field
    pub fn insert(&mut self, field: impl Into<String>, value: serde_json::Value) {
        self.0.insert(field.into(), value);
    }

    /// Borrow the underlying map
    #[must_use]
    pub const fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

/// OAuth2 provider errors
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Unknown provider
    #[error("Unknown OAuth2 provider: {0}")]
    UnknownProvider(String),

    /// Unknown realm
    #[error("Unknown realm: {0}")]
    UnknownRealm(String),

    /// An endpoint URL could not be parsed
    #[error("Invalid {kind} URL: {message}")]
    InvalidEndpoint {
        /// Which endpoint
        kind: &'static str,
        /// Parser message
        message: String,
    },

    /// Authorization code exchange failed
    #[error("Failed to exchange authorization code for token: {0}")]
    TokenExchangeFailed(String),

    /// Failed to fetch the resource owner
    #[error("Failed to fetch resource owner: {0}")]
    ResourceOwnerFailed(String),

    /// The provider did not answer in time
    #[error("Identity provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Generic OAuth2 error
    #[error("OAuth2 error: {0}")]
    Generic(String),
}
