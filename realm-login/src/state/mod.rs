//! Application state
//!
//! Everything the HTTP handlers share, built once from a validated
//! [`LoginConfig`].

use std::sync::Arc;

use anyhow::Context as _;

use crate::config::{LoginConfig, LoginSettings};
use crate::oauth2::authenticator::Authenticator;
use crate::oauth2::events::TokenListener;
use crate::oauth2::http::HttpClient;
use crate::oauth2::matcher::UserMatcher;
use crate::oauth2::messages::{Locale, Translator};
use crate::oauth2::registry::ClientFactoryRegistry;
use crate::oauth2::signing::{LoginUrlParams, SigningError, UriSigner};
use crate::oauth2::target::TargetResolver;
use crate::session::{MemorySessionStore, SessionConfig, SessionStore};
use crate::users::{InMemoryUserStore, SqlUserStore, UserStore};

/// Shared state of the login endpoints
///
/// # Example
///
/// ```rust,no_run
/// use realm_login::{config::LoginConfig, oauth2::handlers, state::AppState};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = LoginConfig::load_for_service("realm-login")?;
/// let state = AppState::from_config(&config).await?;
/// let app = handlers::router(state);
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    settings: Arc<LoginSettings>,
    authenticator: Authenticator,
    signer: UriSigner,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    session_config: SessionConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("settings", &self.settings)
            .field("clients", &self.authenticator.registry().len())
            .field("session_config", &self.session_config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Build state from configuration
    ///
    /// Users come from `[database]` when configured (the tables are created
    /// if missing), otherwise from an empty in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or the clients cannot
    /// be registered
    pub async fn from_config(config: &LoginConfig) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = match &config.database {
            Some(database) => {
                let store = SqlUserStore::connect(&database.url)
                    .await
                    .with_context(|| format!("Failed to connect to {}", database.url))?;
                store.migrate().await.context("Failed to create user tables")?;
                Arc::new(store)
            }
            None => {
                tracing::warn!("No [database] configured, using an empty in-memory user store");
                Arc::new(InMemoryUserStore::new())
            }
        };

        Self::with_user_store(config, users)
    }

    /// Build state over an existing user store
    ///
    /// # Errors
    ///
    /// Returns an error if the clients cannot be registered
    pub fn with_user_store(config: &LoginConfig, users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let http = HttpClient::new(&config.http).context("Failed to build HTTP client")?;
        let registry = ClientFactoryRegistry::from_config(config, &http, &users)?;

        let locale: Locale = config
            .login
            .locale
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let authenticator = Authenticator::new(
            Arc::new(registry),
            TargetResolver::new(&config.login),
            Translator::new(locale),
            config.http.timeout(),
        );

        tracing::info!(
            clients = authenticator.registry().len(),
            active = authenticator.registry().active(),
            "Login clients registered"
        );

        Ok(Self {
            settings: Arc::new(config.login.clone()),
            signer: UriSigner::new(&config.login.signing_secret),
            authenticator,
            users,
            sessions: Arc::new(MemorySessionStore::new()),
            session_config: SessionConfig::from_settings(&config.session),
        })
    }

    /// Replace the session store
    #[must_use]
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Add a user matcher
    #[must_use]
    pub fn with_matcher(mut self, matcher: Arc<dyn UserMatcher>) -> Self {
        self.authenticator = self.authenticator.with_matcher(matcher);
        self
    }

    /// Add a token listener
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn TokenListener>) -> Self {
        self.authenticator = self.authenticator.with_listener(listener);
        self
    }

    /// Login settings
    #[must_use]
    pub fn settings(&self) -> &LoginSettings {
        &self.settings
    }

    /// Authentication state machine
    #[must_use]
    pub const fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Start URL signer
    #[must_use]
    pub const fn signer(&self) -> &UriSigner {
        &self.signer
    }

    /// Local user store
    #[must_use]
    pub fn users(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.users)
    }

    /// Session store
    #[must_use]
    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Session cookie settings
    #[must_use]
    pub const fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Sweep expired sessions from the store every
    /// [`SessionConfig::purge_interval`] until the task is aborted
    pub fn spawn_session_purge(&self) -> tokio::task::JoinHandle<()> {
        let sessions = self.sessions();
        let mut ticker = tokio::time::interval(self.session_config.purge_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                match sessions.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "Purged expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
                }
            }
        })
    }

    /// Signed start URL of an enabled client
    ///
    /// Returns `None` for unknown or disabled clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the public base URL cannot be parsed
    pub fn login_url(
        &self,
        client_name: &str,
        params: &LoginUrlParams,
    ) -> Result<Option<String>, SigningError> {
        let Ok(factory) = self.authenticator.registry().get(client_name) else {
            return Ok(None);
        };

        if !factory.is_enabled() {
            return Ok(None);
        }

        self.signer
            .login_url(self.settings.base_url(), client_name, factory.realm(), params)
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::oauth2::types::{ProviderKind, Realm};

    fn config() -> LoginConfig {
        LoginConfig::from_toml_str(
            r#"
            [login]
            public_base_url = "https://cms.example.org"
            signing_secret = "test-secret"

            [[clients]]
            name = "github_backend"
            provider = "github"
            realm = "backend"
            enable_login = true
            client_id = "id"
            client_secret = "secret"

            [[clients]]
            name = "github_frontend"
            provider = "github"
            realm = "frontend"
            "#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_from_config_without_database() {
        let state = AppState::from_config(&config()).await.unwrap();
        assert_eq!(state.authenticator().registry().len(), 2);
        assert_eq!(state.authenticator().registry().active(), 1);
    }

    #[tokio::test]
    async fn test_from_config_with_sqlite() {
        let mut config = config();
        config.database = Some(crate::config::DatabaseSettings {
            url: "sqlite::memory:".to_string(),
        });
        let state = AppState::from_config(&config).await.unwrap();
        let user = state
            .users()
            .find_one_by(Realm::Backend, "email", "nobody@example.org")
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn test_login_url_only_for_enabled_clients() {
        let state =
            AppState::with_user_store(&config(), Arc::new(InMemoryUserStore::new())).unwrap();

        let url = state
            .login_url("github_backend", &LoginUrlParams::default())
            .unwrap()
            .unwrap();
        assert!(url.starts_with("https://cms.example.org/_start_oauth2_login/github_backend/backend?_hash="));
        assert!(state.signer().check(&url));

        assert!(state.login_url("github_frontend", &LoginUrlParams::default()).unwrap().is_none());
        assert!(state.login_url("missing", &LoginUrlParams::default()).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_purge_task_sweeps_expired_sessions() {
        use crate::session::{SessionData, SessionId};

        let store = Arc::new(MemorySessionStore::new());
        let state = AppState::with_user_store(&config(), Arc::new(InMemoryUserStore::new()))
            .unwrap()
            .with_session_store(store.clone());

        store
            .save(&SessionId::generate(), SessionData::new(chrono::Duration::seconds(-1)))
            .await
            .unwrap();
        store.save(&SessionId::generate(), SessionData::default()).await.unwrap();

        let task = state.spawn_session_purge();
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        assert_eq!(store.len(), 1);
        task.abort();
    }

    #[test]
    fn test_client_config_builder_matches_toml() {
        let built = ClientConfig::new("github_frontend", ProviderKind::GitHub, Realm::Frontend);
        assert_eq!(config().clients[1].callback_path(), built.callback_path());
    }
}
