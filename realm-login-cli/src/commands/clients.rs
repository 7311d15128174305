//! Client listing

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use console::style;
use realm_login::config::LoginConfig;
use realm_login::oauth2::Realm;

/// List configured clients in registration order
#[derive(Debug)]
pub struct ClientsCommand {
    config: Option<PathBuf>,
    realm: Option<Realm>,
}

impl ClientsCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: Option<PathBuf>, realm: Option<Realm>) -> Self {
        Self { config, realm }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid
    pub fn execute(&self) -> Result<()> {
        let config = crate::load_config(self.config.as_deref())?;
        let table = render(&config, self.realm);

        if table.is_empty() {
            println!("{}", style("No clients configured").yellow());
        } else {
            print!("{table}");
        }

        Ok(())
    }
}

/// One line per client: name, provider, realm, status and callback URL
#[must_use]
pub fn render(config: &LoginConfig, realm: Option<Realm>) -> String {
    let mut out = String::new();

    for client in config
        .clients
        .iter()
        .filter(|client| realm.is_none_or(|realm| client.realm == realm))
    {
        let _ = writeln!(
            out,
            "{:<24} {:<8} {:<9} {:<9} {}",
            client.name,
            client.provider.display_name(),
            client.realm,
            if client.enable_login { "enabled" } else { "disabled" },
            client.redirect_uri(&config.login),
        );
    }

    out
}
