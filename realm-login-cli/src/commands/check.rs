//! Configuration check

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use console::{style, Emoji};
use realm_login::config::LoginConfig;
use realm_login::oauth2::Realm;

static SUCCESS: Emoji = Emoji("✓", "√");

/// Validate configuration and print a summary
#[derive(Debug)]
pub struct CheckCommand {
    config: Option<PathBuf>,
}

impl CheckCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: Option<PathBuf>) -> Self {
        Self { config }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or invalid
    pub fn execute(&self) -> Result<()> {
        let config = crate::load_config(self.config.as_deref())?;

        println!("{} {}", SUCCESS, style("Configuration is valid").green().bold());
        println!();
        print!("{}", summary(&config));

        Ok(())
    }
}

/// Plain-text summary of a validated configuration
#[must_use]
pub fn summary(config: &LoginConfig) -> String {
    let mut out = String::new();
    let login = &config.login;

    let _ = writeln!(out, "Public URL:     {}", login.base_url());
    let _ = writeln!(out, "Locale:         {}", login.locale);
    let _ = writeln!(
        out,
        "CSRF check:     {}",
        if login.enable_csrf_token_check { "on" } else { "off" }
    );
    let _ = writeln!(
        out,
        "User store:     {}",
        config
            .database
            .as_ref()
            .map_or("in-memory", |database| database.url.as_str())
    );
    let _ = writeln!(out, "HTTP timeout:   {}s", config.http.timeout_secs);

    for realm in Realm::ALL {
        let clients: Vec<_> = config.clients.iter().filter(|c| c.realm == realm).collect();
        let enabled = clients.iter().filter(|c| c.enable_login).count();
        let _ = writeln!(
            out,
            "{:<16}{} client(s), {} enabled",
            format!("{realm}:"),
            clients.len(),
            enabled
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_clients_per_realm() {
        let config = LoginConfig::from_toml_str(
            r#"
            [login]
            signing_secret = "secret"

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
        .unwrap();

        let summary = summary(&config);
        assert!(summary.contains("Public URL:     http://localhost:3000"));
        assert!(summary.contains("User store:     in-memory"));
        assert!(summary.contains("backend:        1 client(s), 1 enabled"));
        assert!(summary.contains("frontend:       1 client(s), 0 enabled"));
    }
}
