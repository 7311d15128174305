//! Token-acquired notifications
//!
//! Listeners run after a successful token exchange and before the local user
//! is resolved, so they can provision a local account just in time.

use std::sync::Arc;

use async_trait::async_trait;

use crate::oauth2::types::{OAuthToken, ProviderKind, Realm};

/// Error type returned by listeners
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Event emitted once per successful token exchange
#[derive(Debug, Clone)]
pub struct TokenAcquired {
    /// Client that performed the exchange
    pub client_name: String,
    /// Provider type of the client
    pub provider: ProviderKind,
    /// Realm of the login attempt
    pub realm: Realm,
    /// The acquired token
    pub token: OAuthToken,
    /// Query parameters of the callback request
    pub request: Vec<(String, String)>,
}

/// Observer of acquired tokens
#[async_trait]
pub trait TokenListener: Send + Sync {
    /// Handle a token
    ///
    /// # Errors
    ///
    /// A listener error aborts the login with an unexpected failure
    async fn on_token_acquired(&self, event: &TokenAcquired) -> Result<(), ListenerError>;
}

/// Ordered listener list
#[derive(Default, Clone)]
pub struct TokenEvents {
    listeners: Vec<Arc<dyn TokenListener>>,
}

impl TokenEvents {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&mut self, listener: Arc<dyn TokenListener>) {
        self.listeners.push(listener);
    }

    /// Notify every listener in registration order, stopping at the first error
    ///
    /// # Errors
    ///
    /// Returns the first listener error
    pub async fn emit(&self, event: &TokenAcquired) -> Result<(), ListenerError> {
        for listener in &self.listeners {
            listener.on_token_acquired(event).await?;
        }
        Ok(())
    }

    /// Number of listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
