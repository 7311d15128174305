//! realm-login: OAuth2 login for two user realms
//!
//! Bridges an external OAuth2 identity provider to a local user store with two
//! independent audiences: **backend** users (administration) and **frontend**
//! members (public site). A provider identity only logs in a user that
//! already exists locally, matched by a configurable identifier field
//! (`email` by default), and only while that user is active.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use realm_login::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     realm_login::observability::init()?;
//!
//!     let config = LoginConfig::load_for_service("realm-login")?;
//!     let state = AppState::from_config(&config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`] - figment-based configuration, validated once at startup
//! - [`oauth2`] - client registry, providers, the login state machine and its
//!   HTTP endpoints
//! - [`users`] - local user lookup (SQLite or in-memory)
//! - [`session`] - cookie sessions holding the per-realm flow state
//! - [`state`] - shared application state

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod oauth2;
pub mod observability;
pub mod session;
pub mod state;
pub mod users;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    //! Convenience re-exports
    //!
    //! ```rust
    //! use realm_login::prelude::*;
    //! ```

    pub use crate::config::{ClientConfig, LoginConfig, LoginSettings};
    pub use crate::error::LoginError;
    pub use crate::oauth2::handlers::router;
    pub use crate::oauth2::{
        AuthFailure, AuthOutcome, AuthenticatedUser, Authenticator, ClientFactory,
        ClientFactoryRegistry, FailureKind, FlowStateBag, LoginUrlParams, ProviderKind, Realm,
        ResourceOwner, TokenAcquired, TokenListener, UserMatcher,
    };
    pub use crate::session::{
        MemorySessionStore, Session, SessionData, SessionId, SessionLayer, SessionStore,
    };
    pub use crate::state::AppState;
    pub use crate::users::{InMemoryUserStore, LocalUser, SqlUserStore, UserStore};

    pub use axum;
}
