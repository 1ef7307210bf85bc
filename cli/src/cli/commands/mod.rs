//! Command implementations.

pub mod auth;
pub mod completions;
pub mod run;

pub use auth::{handle_login, handle_logout, handle_status};
pub use completions::handle_completions;
pub use run::handle_run;
