//! HTTP server

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use realm_login::oauth2::handlers;
use realm_login::state::AppState;

/// Serve the login endpoints
#[derive(Debug)]
pub struct ServeCommand {
    config: Option<PathBuf>,
    bind: SocketAddr,
}

impl ServeCommand {
    /// Create a new command instance
    #[must_use]
    pub const fn new(config: Option<PathBuf>, bind: SocketAddr) -> Self {
        Self { config, bind }
    }

    /// Execute the command until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the user database is
    /// unreachable or the address cannot be bound
    pub async fn execute(&self) -> Result<()> {
        realm_login::observability::init()?;

        let config = crate::load_config(self.config.as_deref())?;
        let state = AppState::from_config(&config).await?;
        let purge = state.spawn_session_purge();
        let app = handlers::router(state);

        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind))?;

        println!(
            "{} {}",
            style("Listening on").green().bold(),
            style(format!("http://{}", self.bind)).cyan()
        );
        tracing::info!(address = %self.bind, public_url = %config.login.base_url(), "Login server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        purge.abort();
        tracing::info!("Login server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
