pub mod auth;
pub mod config;
pub mod sync;

pub use auth::auth_command;
pub use config::config_command;
pub use sync::sync_command;
