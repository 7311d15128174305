//! Configuration management for realm-login
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `REALM_LOGIN_` prefix, `__` for nesting)
//! 2. `./realm-login.toml` (development)
//! 3. `~/.config/realm-login/{service}/config.toml` (user config, XDG)
//! 4. `/etc/realm-login/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `REALM_LOGIN_SECTION__FIELD_NAME`, e.g.
//! `REALM_LOGIN_LOGIN__SIGNING_SECRET=...`.
//!
//! The configuration is validated once at startup; an invalid client entry
//! is a startup error, never a runtime one.
//!
//! # Example Configuration
//!
//! ```toml
//! [login]
//! public_base_url = "https://cms.example.org"
//! signing_secret = "change-me"
//! enable_csrf_token_check = true
//! locale = "en"
//! backend_home = "/admin"
//! frontend_home = "/"
//!
//! [http]
//! timeout_secs = 10
//!
//! [[clients]]
//! name = "github_backend"
//! provider = "github"
//! realm = "backend"
//! enable_login = true
//! client_id = "Iv1.0123456789"
//! client_secret_env = "GITHUB_BACKEND_SECRET"
//!
//! [[clients]]
//! name = "github_frontend"
//! provider = "github"
//! realm = "frontend"
//! enable_login = true
//! client_id = "Iv1.9876543210"
//! client_secret = "topsecret"
//! identifier_field = "email"
//! ```

use figment::{
    providers::{Data, Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::oauth2::types::{ProviderKind, Realm};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "REALM_LOGIN_";

/// Default identifier field read from the resource owner payload
pub const DEFAULT_IDENTIFIER_FIELD: &str = "email";

/// Login flow settings shared by every client
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSettings {
    /// Public origin of this application, used for redirect URIs and signed URLs
    pub public_base_url: String,

    /// Secret used to sign start URLs
    pub signing_secret: String,

    /// Require the session request token on the start endpoint
    pub enable_csrf_token_check: bool,

    /// Locale of user-facing messages (`en` or `de`)
    pub locale: String,

    /// Default landing page for backend users
    pub backend_home: String,

    /// Default landing page for frontend members
    pub frontend_home: String,

    /// Hosts, besides the public base URL host, that absolute target paths may point to
    pub allowed_redirect_hosts: Vec<String>,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:3000".to_string(),
            signing_secret: String::new(),
            enable_csrf_token_check: true,
            locale: "en".to_string(),
            backend_home: "/admin".to_string(),
            frontend_home: "/".to_string(),
            allowed_redirect_hosts: Vec::new(),
        }
    }
}

impl fmt::Debug for LoginSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginSettings")
            .field("public_base_url", &self.public_base_url)
            .field("signing_secret", &"[redacted]")
            .field("enable_csrf_token_check", &self.enable_csrf_token_check)
            .field("locale", &self.locale)
            .field("backend_home", &self.backend_home)
            .field("frontend_home", &self.frontend_home)
            .field("allowed_redirect_hosts", &self.allowed_redirect_hosts)
            .finish()
    }
}

impl LoginSettings {
    /// Public base URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    /// Default landing page for a realm
    #[must_use]
    pub fn home(&self, realm: Realm) -> &str {
        match realm {
            Realm::Backend => &self.backend_home,
            Realm::Frontend => &self.frontend_home,
        }
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Timeout for each provider request, in seconds
    pub timeout_secs: u64,

    /// User agent sent to providers (GitHub rejects requests without one)
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("realm-login/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    /// Request timeout as a `Duration`
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Cookie name for the session id
    pub cookie_name: String,

    /// Session maximum age in seconds
    pub max_age_secs: u64,

    /// Enable secure cookies (HTTPS only)
    pub secure_cookies: bool,

    /// Seconds between sweeps of expired sessions
    pub purge_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "realm_login_session".to_string(),
            max_age_secs: 86400, // 24 hours
            secure_cookies: !cfg!(debug_assertions),
            purge_interval_secs: 300,
        }
    }
}

/// Local user database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite connection URL, e.g. `sqlite://users.db`
    pub url: String,
}

/// Configuration of one OAuth2 client
///
/// One entry per logical client name (`github_backend`, `github_frontend`, ...).
/// Immutable once loaded.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Unique client name
    pub name: String,

    /// Provider type
    pub provider: ProviderKind,

    /// Realm this client logs users into
    pub realm: Realm,

    /// Whether the client may be used
    #[serde(default)]
    pub enable_login: bool,

    /// OAuth2 client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret
    #[serde(default)]
    pub client_secret: String,

    /// Environment variable holding the client secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_env: Option<String>,

    /// Resource owner field matched against local users
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    /// Scopes to request; empty means provider defaults
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Callback URL registered at the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Authorization endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Token endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// Resource owner endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_owner_url: Option<String>,

    /// Send a PKCE challenge with the authorization request
    #[serde(default = "default_true")]
    pub use_pkce: bool,
}

fn default_identifier_field() -> String {
    DEFAULT_IDENTIFIER_FIELD.to_string()
}

const fn default_true() -> bool {
    true
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("realm", &self.realm)
            .field("enable_login", &self.enable_login)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("client_secret_env", &self.client_secret_env)
            .field("identifier_field", &self.identifier_field)
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri)
            .field("use_pkce", &self.use_pkce)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Create a disabled client with default options
    #[must_use]
    pub fn new(name: impl Into<String>, provider: ProviderKind, realm: Realm) -> Self {
        Self {
            name: name.into(),
            provider,
            realm,
            enable_login: false,
            client_id: String::new(),
            client_secret: String::new(),
            client_secret_env: None,
            identifier_field: default_identifier_field(),
            scopes: Vec::new(),
            redirect_uri: None,
            auth_url: None,
            token_url: None,
            resource_owner_url: None,
            use_pkce: true,
        }
    }

    /// Enable the client with the given credentials
    #[must_use]
    pub fn enabled(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.enable_login = true;
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Callback path handled by this application
    #[must_use]
    pub fn callback_path(&self) -> String {
        format!("/_oauth2_login/{}/{}", self.name, self.realm)
    }

    /// Redirect URI sent to the provider
    #[must_use]
    pub fn redirect_uri(&self, settings: &LoginSettings) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}{}", settings.base_url(), self.callback_path()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyClientName);
        }

        if !is_plain_identifier(&self.identifier_field) {
            return Err(ConfigError::InvalidIdentifierField {
                client: self.name.clone(),
                field: self.identifier_field.clone(),
            });
        }

        if self.provider == ProviderKind::Generic {
            for (endpoint, value) in [
                ("auth_url", &self.auth_url),
                ("token_url", &self.token_url),
                ("resource_owner_url", &self.resource_owner_url),
            ] {
                if value.is_none() {
                    return Err(ConfigError::MissingEndpoint {
                        client: self.name.clone(),
                        endpoint,
                    });
                }
            }
        }

        for (endpoint, value) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("resource_owner_url", &self.resource_owner_url),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if let Some(value) = value {
                url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
                    field: format!("clients.{}.{endpoint}", self.name),
                    message: e.to_string(),
                })?;
            }
        }

        if self.enable_login && (self.client_id.is_empty() || self.client_secret.is_empty()) {
            return Err(ConfigError::MissingCredentials {
                client: self.name.clone(),
            });
        }

        Ok(())
    }
}

/// Complete realm-login configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginConfig {
    /// Login flow settings
    #[serde(default)]
    pub login: LoginSettings,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Session cookie settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Local user database (in-memory store when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSettings>,

    /// Configured clients, in registration order
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

impl LoginConfig {
    /// Load configuration for a specific service
    ///
    /// Searches for configuration in XDG-compliant locations with precedence:
    /// 1. Environment variables (`REALM_LOGIN_*`, use `__` for nesting)
    /// 2. `./realm-login.toml`
    /// 3. `~/.config/realm-login/{service_name}/config.toml`
    /// 4. `/etc/realm-login/{service_name}/config.toml`
    /// 5. Defaults
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be parsed or the
    /// merged configuration fails validation
    pub fn load_for_service(service_name: &str) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Self::defaults()?);

        let system_config = PathBuf::from("/etc/realm-login")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from("./realm-login.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        Self::finish(figment)
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables still override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the configuration
    /// fails validation
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Self::defaults()?)
            .merge(Toml::file(path.into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        Self::finish(figment)
    }

    /// Parse configuration from a TOML string (no environment overrides)
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Self::defaults()?)
            .merge(Toml::string(content));

        Self::finish(figment)
    }

    fn defaults() -> Result<Data<Toml>, ConfigError> {
        let defaults = toml::to_string(&Self::default())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        Ok(Toml::string(&defaults))
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.resolve_secrets()?;
        config.validate()?;
        Ok(config)
    }

    /// Fill `client_secret` from `client_secret_env` where configured
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced environment variable is not set
    pub fn resolve_secrets(&mut self) -> Result<(), ConfigError> {
        for client in &mut self.clients {
            if !client.client_secret.is_empty() {
                continue;
            }
            if let Some(var) = &client.client_secret_env {
                client.client_secret =
                    std::env::var(var).map_err(|_| ConfigError::MissingSecretEnv {
                        client: client.name.clone(),
                        var: var.clone(),
                    })?;
            }
        }
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns the first violation found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.login.signing_secret.is_empty() {
            return Err(ConfigError::MissingSigningSecret);
        }

        if !matches!(self.login.locale.as_str(), "en" | "de") {
            return Err(ConfigError::UnsupportedLocale(self.login.locale.clone()));
        }

        url::Url::parse(&self.login.public_base_url).map_err(|e| ConfigError::InvalidUrl {
            field: "login.public_base_url".to_string(),
            message: e.to_string(),
        })?;

        let mut seen = HashSet::new();
        for client in &self.clients {
            client.validate()?;
            if !seen.insert(client.name.as_str()) {
                return Err(ConfigError::DuplicateClient(client.name.clone()));
            }
        }

        Ok(())
    }

    /// Get the recommended XDG config path for a service
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./realm-login.toml"),
            |config_dir| {
                config_dir
                    .join("realm-login")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }
}

/// Check that a field name is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`)
///
/// Identifier fields end up as column names in SQL lookups.
#[must_use]
pub fn is_plain_identifier(field: &str) -> bool {
    let mut chars = field.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Configuration errors, all detected at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// No signing secret configured
    #[error("login.signing_secret must be set")]
    MissingSigningSecret,

    /// Locale without a message catalog
    #[error("Unsupported locale '{0}' (expected 'en' or 'de')")]
    UnsupportedLocale(String),

    /// Two clients share a name
    #[error("Duplicate client name '{0}'")]
    DuplicateClient(String),

    /// A client has an empty name
    #[error("Client name must not be empty")]
    EmptyClientName,

    /// An enabled client lacks credentials
    #[error("Client '{client}' is enabled but has no client_id/client_secret")]
    MissingCredentials {
        /// Client name
        client: String,
    },

    /// The secret environment variable is not set
    #[error("Client '{client}' reads its secret from ${var}, which is not set")]
    MissingSecretEnv {
        /// Client name
        client: String,
        /// Environment variable name
        var: String,
    },

    /// Identifier field is not a plain identifier
    #[error("Client '{client}' has an invalid identifier_field '{field}'")]
    InvalidIdentifierField {
        /// Client name
        client: String,
        /// Offending field
        field: String,
    },

    /// Generic provider without an endpoint
    #[error("Client '{client}' uses the generic provider and must set {endpoint}")]
    MissingEndpoint {
        /// Client name
        client: String,
        /// Missing endpoint key
        endpoint: &'static str,
    },

    /// A URL failed to parse
    #[error("Invalid URL in {field}: {message}")]
    InvalidUrl {
        /// Config key
        field: String,
        /// Parser message
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[login]
signing_secret = "test-secret"
"#;

    #[test]
    fn test_default_settings() {
        let config = LoginConfig::default();
        assert_eq!(config.http.timeout_secs, 10);
        assert!(config.login.enable_csrf_token_check);
        assert_eq!(config.login.locale, "en");
        assert_eq!(config.login.home(Realm::Backend), "/admin");
        assert_eq!(config.login.home(Realm::Frontend), "/");
        assert!(config.clients.is_empty());
    }

    #[test]
    fn test_default_config_requires_signing_secret() {
        assert!(matches!(
            LoginConfig::default().validate(),
            Err(ConfigError::MissingSigningSecret)
        ));
    }

    #[test]
    fn test_parse_clients_in_order() {
        let config = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "github_backend"
provider = "github"
realm = "backend"
enable_login = true
client_id = "id-1"
client_secret = "secret-1"

[[clients]]
name = "github_frontend"
provider = "github"
realm = "frontend"
identifier_field = "login"
"#,
        )
        .unwrap();

        assert_eq!(config.clients.len(), 2);
        assert_eq!(config.clients[0].name, "github_backend");
        assert!(config.clients[0].enable_login);
        assert_eq!(config.clients[0].identifier_field, "email");
        assert!(config.clients[0].use_pkce);
        assert_eq!(config.clients[1].realm, Realm::Frontend);
        assert!(!config.clients[1].enable_login);
        assert_eq!(config.clients[1].identifier_field, "login");
    }

    #[test]
    fn test_duplicate_client_names_rejected() {
        let result = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "github_backend"
provider = "github"
realm = "backend"

[[clients]]
name = "github_backend"
provider = "github"
realm = "frontend"
"#,
        );
        assert!(matches!(result, Err(ConfigError::DuplicateClient(name)) if name == "github_backend"));
    }

    #[test]
    fn test_enabled_client_requires_credentials() {
        let result = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "github_backend"
provider = "github"
realm = "backend"
enable_login = true
client_id = "id"
"#,
        );
        assert!(matches!(result, Err(ConfigError::MissingCredentials { .. })));
    }

    #[test]
    fn test_generic_provider_requires_endpoints() {
        let result = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "sso_frontend"
provider = "generic"
realm = "frontend"
auth_url = "https://sso.example.org/authorize"
"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::MissingEndpoint { endpoint: "token_url", .. })
        ));
    }

    #[test]
    fn test_identifier_field_must_be_plain() {
        let result = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "github_backend"
provider = "github"
realm = "backend"
identifier_field = "email; DROP TABLE backend_users"
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidIdentifierField { .. })));
    }

    #[test]
    fn test_unknown_locale_rejected() {
        let result = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"
locale = "fr"
"#,
        );
        assert!(matches!(result, Err(ConfigError::UnsupportedLocale(_))));
    }

    #[test]
    fn test_client_secret_from_env() {
        std::env::set_var("REALM_LOGIN_TEST_SECRET_FROM_ENV", "env-secret");
        let config = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "github_backend"
provider = "github"
realm = "backend"
enable_login = true
client_id = "id"
client_secret_env = "REALM_LOGIN_TEST_SECRET_FROM_ENV"
"#,
        )
        .unwrap();
        assert_eq!(config.clients[0].client_secret, "env-secret");
    }

    #[test]
    fn test_missing_secret_env_rejected() {
        let result = LoginConfig::from_toml_str(
            r#"
[login]
signing_secret = "s3cret"

[[clients]]
name = "github_backend"
provider = "github"
realm = "backend"
client_secret_env = "REALM_LOGIN_TEST_SECRET_THAT_IS_NOT_SET"
"#,
        );
        assert!(matches!(result, Err(ConfigError::MissingSecretEnv { .. })));
    }

    #[test]
    fn test_redirect_uri_defaults_to_callback_route() {
        let settings = LoginSettings {
            public_base_url: "https://cms.example.org/".to_string(),
            ..LoginSettings::default()
        };
        let client = ClientConfig::new("github_backend", ProviderKind::GitHub, Realm::Backend);
        assert_eq!(
            client.redirect_uri(&settings),
            "https://cms.example.org/_oauth2_login/github_backend/backend"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let client = ClientConfig::new("github_backend", ProviderKind::GitHub, Realm::Backend)
            .enabled("id", "very-secret-value");
        let debug = format!("{client:?}");
        assert!(!debug.contains("very-secret-value"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{MINIMAL}
[http]
timeout_secs = 3

[[clients]]
name = "google_frontend"
provider = "google"
realm = "frontend"
"#
        )
        .unwrap();

        let config = LoginConfig::load_from(file.path()).unwrap();
        assert_eq!(config.http.timeout(), Duration::from_secs(3));
        assert_eq!(config.clients[0].provider, ProviderKind::Google);
    }

    #[test]
    fn test_is_plain_identifier() {
        assert!(is_plain_identifier("email"));
        assert!(is_plain_identifier("_github_id2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2fa"));
        assert!(!is_plain_identifier("e-mail"));
        assert!(!is_plain_identifier("email OR 1=1"));
    }

    #[test]
    fn test_recommended_path() {
        let path = LoginConfig::recommended_path("test-app");
        let path = path.to_str().unwrap();
        assert!(path.contains("test-app") || path.ends_with("realm-login.toml"));
    }
}
