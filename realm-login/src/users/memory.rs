//! In-memory user store

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{LocalUser, UserStore, UserStoreError};
use crate::oauth2::types::Realm;

/// User store backed by a vector, for development and tests
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<LocalUser>>,
}

impl InMemoryUserStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given users
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = LocalUser>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().collect()),
        }
    }

    /// Add a user
    pub fn insert(&self, user: LocalUser) {
        self.users.write().push(user);
    }

    /// Number of users across both realms
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_one_by(
        &self,
        realm: Realm,
        field: &str,
        value: &str,
    ) -> Result<Option<LocalUser>, UserStoreError> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|user| user.realm == realm && user.field(field).as_deref() == Some(value))
            .cloned())
    }
}
