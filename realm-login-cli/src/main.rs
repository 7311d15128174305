//! realm-login CLI tool

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use realm_login::oauth2::{LoginUrlParams, Realm};
use realm_login_cli::commands::{CheckCommand, ClientsCommand, LoginUrlCommand, ServeCommand};

#[derive(Parser)]
#[command(name = "realm-login")]
#[command(version)]
#[command(about = "OAuth2 login server for backend users and frontend members", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the login endpoints
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Validate the configuration
    Check,
    /// List configured clients
    Clients {
        /// Only clients of this realm
        #[arg(short, long, value_parser = parse_realm)]
        realm: Option<Realm>,
    },
    /// Print the signed start URL of a client
    LoginUrl {
        /// Client name, e.g. `github_backend`
        client: String,
        /// Post-login target path
        #[arg(short, long)]
        target_path: Option<String>,
        /// Prefer the target path over the one chosen after login
        #[arg(long)]
        always_use_target_path: bool,
        /// Redirect after a failed frontend login
        #[arg(short, long)]
        failure_path: Option<String>,
    },
}

fn parse_realm(value: &str) -> Result<Realm, String> {
    value
        .parse()
        .map_err(|_| format!("unknown realm '{value}' (expected backend or frontend)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => {
            ServeCommand::new(cli.config, bind).execute().await?;
        }
        Commands::Check => {
            CheckCommand::new(cli.config).execute()?;
        }
        Commands::Clients { realm } => {
            ClientsCommand::new(cli.config, realm).execute()?;
        }
        Commands::LoginUrl {
            client,
            target_path,
            always_use_target_path,
            failure_path,
        } => {
            let params = LoginUrlParams {
                target_path,
                always_use_target_path,
                failure_path,
            };
            LoginUrlCommand::new(cli.config, client, params).execute()?;
        }
    }

    Ok(())
}
