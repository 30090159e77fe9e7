pub mod auth;

pub use auth::{require_system_auth, Caller};
