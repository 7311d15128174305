//! CLI command implementations

pub mod check;
pub mod clients;
pub mod login_url;
pub mod serve;

pub use check::CheckCommand;
pub use clients::ClientsCommand;
pub use login_url::LoginUrlCommand;
pub use serve::ServeCommand;
