//! Local user stores
//!
//! The login flow only needs one capability from the application's user
//! database: find a single user of a realm by an identifier field. Backend
//! users and frontend members live in separate tables (or separate in-memory
//! lists) so a backend identity can never log into the frontend and vice versa.

mod memory;
mod sql;

pub use memory::InMemoryUserStore;
pub use sql::SqlUserStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::oauth2::types::Realm;

/// Local account of either realm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    /// Primary key
    pub id: i64,
    /// Login name
    pub username: String,
    /// Email address
    pub email: Option<String>,
    /// Realm the account belongs to
    pub realm: Realm,
    /// Account is disabled
    pub disabled: bool,
    /// Frontend members need this flag to log in; ignored for backend users
    pub login_allowed: bool,
    /// Account is inactive before this instant
    pub start: Option<DateTime<Utc>>,
    /// Account is inactive after this instant
    pub stop: Option<DateTime<Utc>>,
    /// Additional identifier fields (in-memory store only)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl LocalUser {
    /// Create an active user
    #[must_use]
    pub fn new(id: i64, username: impl Into<String>, realm: Realm) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            realm,
            disabled: false,
            login_allowed: true,
            start: None,
            stop: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the email address
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Value of an identifier field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.to_string()),
            "username" => Some(self.username.clone()),
            "email" => self.email.clone(),
            other => self.attributes.get(other).cloned(),
        }
    }

    /// Whether the account may log in at `now`
    ///
    /// Disabled accounts, accounts whose `start` lies in the future and
    /// accounts whose `stop` lies in the past are inactive. Frontend members
    /// additionally need `login_allowed`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.disabled {
            return false;
        }
        if self.realm == Realm::Frontend && !self.login_allowed {
            return false;
        }
        if self.start.is_some_and(|start| start > now) {
            return false;
        }
        !self.stop.is_some_and(|stop| stop < now)
    }
}

/// User store errors
#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The identifier field cannot be used for lookups
    #[error("Invalid identifier field: {0}")]
    InvalidField(String),
}

/// Lookup of local users by identifier field
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find one user of `realm` whose `field` equals `value` exactly
    ///
    /// Activity checks are not applied here; callers decide what an inactive
    /// user means.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried
    async fn find_one_by(
        &self,
        realm: Realm,
        field: &str,
        value: &str,
    ) -> Result<Option<LocalUser>, UserStoreError>;
}
