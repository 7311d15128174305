//! Per-realm flow state
//!
//! Transient data bridging the start redirect and the provider callback. One
//! slot exists per realm so a backend and a frontend login can be in flight in
//! the same browser session. A slot must not outlive one login attempt.

use serde::{Deserialize, Serialize};

use crate::oauth2::types::Realm;

/// Transient state of one login attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    /// CSRF state generated for the authorization URL
    pub expected_state: Option<String>,
    /// Base64-encoded post-login target
    pub target_path: Option<String>,
    /// Prefer the stored target over the one supplied by the security layer
    pub always_use_target_path: bool,
    /// Base64-encoded redirect for frontend members when the login fails
    pub failure_path: Option<String>,
    /// PKCE verifier matching the challenge sent with the authorization URL
    pub pkce_verifier: Option<String>,
}

impl FlowState {
    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Flow state slots of one session, keyed by realm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStateBag {
    backend: FlowState,
    frontend: FlowState,
}

impl FlowStateBag {
    /// Create an empty bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a realm's slot
    #[must_use]
    pub const fn get(&self, realm: Realm) -> &FlowState {
        match realm {
            Realm::Backend => &self.backend,
            Realm::Frontend => &self.frontend,
        }
    }

    /// Mutate a realm's slot
    pub fn get_mut(&mut self, realm: Realm) -> &mut FlowState {
        match realm {
            Realm::Backend => &mut self.backend,
            Realm::Frontend => &mut self.frontend,
        }
    }

    /// Replace a realm's slot
    pub fn set(&mut self, realm: Realm, state: FlowState) {
        *self.get_mut(realm) = state;
    }

    /// Remove and return a realm's slot
    pub fn take(&mut self, realm: Realm) -> FlowState {
        std::mem::take(self.get_mut(realm))
    }

    /// Empty a realm's slot
    pub fn clear(&mut self, realm: Realm) {
        self.set(realm, FlowState::default());
    }

    /// Whether a realm's slot is empty
    #[must_use]
    pub fn is_empty(&self, realm: Realm) -> bool {
        self.get(realm).is_empty()
    }
}
