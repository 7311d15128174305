//! Signed start URL generation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use realm_login::config::LoginConfig;
use realm_login::oauth2::LoginUrlParams;
use realm_login::state::AppState;
use realm_login::users::InMemoryUserStore;

/// Print the signed start URL of a client
#[derive(Debug)]
pub struct LoginUrlCommand {
    config: Option<PathBuf>,
    client: String,
    params: LoginUrlParams,
}

impl LoginUrlCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: Option<PathBuf>, client: String, params: LoginUrlParams) -> Self {
        Self {
            config,
            client,
            params,
        }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the client is
    /// unknown or disabled
    pub fn execute(&self) -> Result<()> {
        let config = crate::load_config(self.config.as_deref())?;
        println!("{}", login_url(&config, &self.client, &self.params)?);
        Ok(())
    }
}

/// Signed start URL of an enabled client
///
/// # Errors
///
/// Returns an error if the client is unknown or disabled
pub fn login_url(config: &LoginConfig, client: &str, params: &LoginUrlParams) -> Result<String> {
    // URL signing needs no users.
    let state = AppState::with_user_store(config, Arc::new(InMemoryUserStore::new()))?;

    match state.login_url(client, params)? {
        Some(url) => Ok(url),
        None => bail!("Client '{client}' is unknown or not enabled"),
    }
}
