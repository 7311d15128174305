//! Client factory registry
//!
//! Maps client names to factories. Built once at startup from configuration
//! and read-only afterwards, so it is shared behind an `Arc` without locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::LoginConfig;
use crate::oauth2::factory::{ClientFactory, ConfiguredClientFactory};
use crate::oauth2::http::HttpClient;
use crate::oauth2::types::Realm;
use crate::users::UserStore;

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No factory is registered under the name
    #[error("Could not find a client factory named '{0}'")]
    NotFound(String),

    /// A factory with the same name is already registered
    #[error("A client factory named '{0}' is already registered")]
    Duplicate(String),
}

/// Name-keyed factory registry preserving registration order
#[derive(Default, Clone)]
pub struct ClientFactoryRegistry {
    factories: Vec<Arc<dyn ClientFactory>>,
    by_name: HashMap<String, usize>,
}

impl ClientFactoryRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one `ConfiguredClientFactory` per configured client
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Duplicate` if two clients share a name
    pub fn from_config(
        config: &LoginConfig,
        http: &HttpClient,
        users: &Arc<dyn UserStore>,
    ) -> Result<Self, RegistryError> {
        let settings = Arc::new(config.login.clone());
        let mut registry = Self::new();

        for client in &config.clients {
            registry.register(Arc::new(ConfiguredClientFactory::new(
                client.clone(),
                Arc::clone(&settings),
                http.clone(),
                Arc::clone(users),
            )))?;
        }

        Ok(registry)
    }

    /// Register a factory
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Duplicate` if the name is taken
    pub fn register(&mut self, factory: Arc<dyn ClientFactory>) -> Result<(), RegistryError> {
        let name = factory.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        self.by_name.insert(name, self.factories.len());
        self.factories.push(factory);
        Ok(())
    }

    /// Look up a factory by name
    ///
    /// Disabled factories are returned too; callers check `is_enabled`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if no factory has that name
    pub fn get(&self, name: &str) -> Result<Arc<dyn ClientFactory>, RegistryError> {
        self.by_name
            .get(name)
            .map(|&index| Arc::clone(&self.factories[index]))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Enabled factories of a realm, in registration order
    #[must_use]
    pub fn list_by_realm(&self, realm: Realm) -> Vec<Arc<dyn ClientFactory>> {
        self.factories
            .iter()
            .filter(|factory| factory.realm() == realm && factory.is_enabled())
            .cloned()
            .collect()
    }

    /// All factories, in registration order
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn ClientFactory>] {
        &self.factories
    }

    /// Number of enabled factories
    #[must_use]
    pub fn active(&self) -> usize {
        self.factories
            .iter()
            .filter(|factory| factory.is_enabled())
            .count()
    }

    /// Number of registered factories
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
