//! realm-login CLI library

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use realm_login::config::LoginConfig;

/// Service name used for the default configuration path and environment prefix
pub const SERVICE_NAME: &str = "realm-login";

/// Load and validate configuration
///
/// Without an explicit path the XDG location for [`SERVICE_NAME`] is used.
///
/// # Errors
///
/// Returns an error if the configuration cannot be read or is invalid
pub fn load_config(path: Option<&Path>) -> Result<LoginConfig> {
    match path {
        Some(path) => LoginConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => LoginConfig::load_for_service(SERVICE_NAME).with_context(|| {
            format!(
                "Failed to load configuration (expected at {})",
                LoginConfig::recommended_path(SERVICE_NAME).display()
            )
        }),
    }
}
