//! Browser sessions
//!
//! The login flow keeps its per-realm flow state, the authenticated users and
//! the last failure in a cookie-addressed session. Storage is behind
//! [`SessionStore`]; [`MemorySessionStore`] keeps everything in process.

pub mod extractor;
pub mod middleware;

pub use extractor::Session;
pub use middleware::{RenewSession, SameSite, SessionConfig, SessionLayer, SessionMiddleware};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::oauth2::authenticator::{AuthFailure, AuthenticatedUser};
use crate::oauth2::flow_state::FlowStateBag;
use crate::oauth2::types::Realm;

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Cookie value is not a session id
    #[error("Invalid session id")]
    InvalidSessionId,

    /// Backend storage failed
    #[error("Session storage error: {0}")]
    Storage(String),
}

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a random session id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Session id as string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(|_| Self(s.to_string()))
            .map_err(|_| SessionError::InvalidSessionId)
    }
}

/// Flash message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    /// Informational
    Info,
    /// Error
    Error,
}

/// One-time message for the next page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    /// Severity
    pub level: FlashLevel,
    /// Text
    pub message: String,
}

impl FlashMessage {
    /// Error flash
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    /// Informational flash
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }
}

/// Data stored per session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session expires
    pub expires_at: DateTime<Utc>,
    /// Login flow state per realm
    pub flow: FlowStateBag,
    /// Authenticated backend user
    pub backend_user: Option<AuthenticatedUser>,
    /// Authenticated frontend member
    pub frontend_user: Option<AuthenticatedUser>,
    /// Last failed login, for the login form to display
    pub last_error: Option<AuthFailure>,
    /// Flash messages queued for the next request
    pub flash_messages: Vec<FlashMessage>,
    /// Token required by the start endpoint when the CSRF check is on
    pub request_token: String,
}

impl SessionData {
    /// Create a session expiring after `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            expires_at: now + ttl,
            flow: FlowStateBag::new(),
            backend_user: None,
            frontend_user: None,
            last_error: None,
            flash_messages: Vec::new(),
            request_token: generate_request_token(),
        }
    }

    /// Whether the session is past its expiry
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Restart the lifetime and issue a new request token
    ///
    /// Used when the session moves to a new id after a login.
    pub fn renew(&mut self, ttl: Duration) {
        let now = Utc::now();
        self.created_at = now;
        self.expires_at = now + ttl;
        self.request_token = generate_request_token();
    }

    /// Authenticated user of a realm
    #[must_use]
    pub const fn user(&self, realm: Realm) -> Option<&AuthenticatedUser> {
        match realm {
            Realm::Backend => self.backend_user.as_ref(),
            Realm::Frontend => self.frontend_user.as_ref(),
        }
    }

    /// Record a successful login; clears the last error
    pub fn set_user(&mut self, user: AuthenticatedUser) {
        self.last_error = None;
        match user.realm {
            Realm::Backend => self.backend_user = Some(user),
            Realm::Frontend => self.frontend_user = Some(user),
        }
    }

    /// Record a failed login and queue its message
    pub fn record_failure(&mut self, failure: AuthFailure) {
        self.flash_messages.push(FlashMessage::error(failure.message.clone()));
        self.last_error = Some(failure);
    }

    /// Take the last error, leaving none
    pub fn take_last_error(&mut self) -> Option<AuthFailure> {
        self.last_error.take()
    }

    /// Whether `token` equals this session's request token
    #[must_use]
    pub fn check_request_token(&self, token: &str) -> bool {
        !token.is_empty() && token == self.request_token
    }
}

impl Default for SessionData {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

fn generate_request_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session; expired sessions are reported as missing
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError>;

    /// Insert or replace a session
    async fn save(&self, id: &SessionId, data: SessionData) -> Result<(), SessionError>;

    /// Delete a session
    async fn remove(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Delete every expired session, returning how many were removed
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

/// In-process session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionData>, SessionError> {
        let data = self.sessions.read().get(id).cloned();
        match data {
            Some(data) if data.is_expired() => {
                self.sessions.write().remove(id);
                Ok(None)
            }
            data => Ok(data),
        }
    }

    async fn save(&self, id: &SessionId, data: SessionData) -> Result<(), SessionError> {
        self.sessions.write().insert(id.clone(), data);
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions.write().remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, data| !data.is_expired());
        Ok(before - sessions.len())
    }
}
