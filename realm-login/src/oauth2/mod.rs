//! OAuth2 login
//!
//! Authorization-code login that maps an external identity (GitHub, Google,
//! or any OAuth2 provider) onto an existing local user of one of two realms:
//! backend users and frontend members.
//!
//! # Flow
//!
//! 1. `start`: a signed link hits the start endpoint. The client is looked up
//!    in the [`ClientFactoryRegistry`], a CSRF state (and PKCE verifier) is
//!    stored in the realm's [`FlowState`], and the browser is redirected to
//!    the provider.
//! 2. `callback`: the provider redirects back with `code` and `state`. The
//!    [`Authenticator`] validates both, exchanges the code, fetches the
//!    resource owner and resolves it to an active local user.
//! 3. `on_success` / `on_failure` pick the redirect target and empty the
//!    flow state.
//!
//! # Example
//!
//! ```rust,no_run
//! use realm_login::config::LoginConfig;
//! use realm_login::oauth2::handlers;
//! use realm_login::state::AppState;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = LoginConfig::load_from("realm-login.toml")?;
//! let app = handlers::router(AppState::from_config(&config).await?);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod client;
pub mod events;
pub mod factory;
pub mod flow_state;
pub mod handlers;
pub mod http;
pub mod matcher;
pub mod messages;
pub mod providers;
pub mod registry;
pub mod signing;
pub mod target;
pub mod types;

pub use authenticator::{
    AuthFailure, AuthOutcome, AuthenticatedUser, Authenticator, CallbackParams, FailureKind,
    StartParams,
};
pub use client::ProviderClient;
pub use events::{TokenAcquired, TokenEvents, TokenListener};
pub use factory::{ClientFactory, ConfiguredClientFactory};
pub use flow_state::{FlowState, FlowStateBag};
pub use matcher::{IdentifierMatcher, UserMatcher};
pub use messages::{Locale, Translator};
pub use registry::{ClientFactoryRegistry, RegistryError};
pub use signing::{LoginUrlParams, UriSigner};
pub use target::TargetResolver;
pub use types::{OAuthError, OAuthToken, ProviderKind, Realm, ResourceOwner};
