//! Resolution of resource owners to local users
//!
//! A matcher reads one identifier field from the provider payload and looks
//! the value up in the realm's user store. Inactive accounts are treated
//! exactly like missing ones so the outcome does not reveal which accounts
//! exist.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::oauth2::types::{Realm, ResourceOwner};
use crate::users::{LocalUser, UserStore, UserStoreError};

/// Look up the active user matching `owner[field]`
///
/// A missing, empty or non-scalar identifier resolves to `None`, as does a
/// disabled user or one outside its activity window.
///
/// # Errors
///
/// Returns an error if the user store fails
pub async fn resolve_active_user(
    users: &dyn UserStore,
    owner: &ResourceOwner,
    realm: Realm,
    field: &str,
) -> Result<Option<LocalUser>, UserStoreError> {
    let Some(identifier) = owner.identifier(field) else {
        return Ok(None);
    };

    let user = users.find_one_by(realm, field, &identifier).await?;
    let now = Utc::now();

    Ok(user.filter(|user| user.is_active_at(now)))
}

/// Maps a resource owner payload to a local user
#[async_trait]
pub trait UserMatcher: Send + Sync {
    /// Whether this matcher handles the named client
    fn supports(&self, client_name: &str) -> bool;

    /// Resolve an active local user of `realm`
    ///
    /// # Errors
    ///
    /// Returns an error if the user store fails
    async fn resolve(
        &self,
        owner: &ResourceOwner,
        realm: Realm,
    ) -> Result<Option<LocalUser>, UserStoreError>;
}

/// Matcher comparing one identifier field by exact equality
pub struct IdentifierMatcher {
    clients: Option<HashSet<String>>,
    field: String,
    users: Arc<dyn UserStore>,
}

impl IdentifierMatcher {
    /// Matcher for every client
    pub fn new(field: impl Into<String>, users: Arc<dyn UserStore>) -> Self {
        Self {
            clients: None,
            field: field.into(),
            users,
        }
    }

    /// Restrict the matcher to the named clients
    #[must_use]
    pub fn for_clients<I, S>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clients = Some(clients.into_iter().map(Into::into).collect());
        self
    }

    /// Identifier field read from the payload
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

#[async_trait]
impl UserMatcher for IdentifierMatcher {
    fn supports(&self, client_name: &str) -> bool {
        self.clients
            .as_ref()
            .is_none_or(|clients| clients.contains(client_name))
    }

    async fn resolve(
        &self,
        owner: &ResourceOwner,
        realm: Realm,
    ) -> Result<Option<LocalUser>, UserStoreError> {
        resolve_active_user(self.users.as_ref(), owner, realm, &self.field).await
    }
}

/// Ordered matcher list; the first matcher supporting a client wins
#[derive(Default, Clone)]
pub struct UserMatchers {
    matchers: Vec<Arc<dyn UserMatcher>>,
}

impl UserMatchers {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a matcher
    pub fn push(&mut self, matcher: Arc<dyn UserMatcher>) {
        self.matchers.push(matcher);
    }

    /// First matcher supporting the client
    #[must_use]
    pub fn find(&self, client_name: &str) -> Option<&Arc<dyn UserMatcher>> {
        self.matchers
            .iter()
            .find(|matcher| matcher.supports(client_name))
    }

    /// Number of matchers
    #[must_use]
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Whether no matcher is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
