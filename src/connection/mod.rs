pub mod auth;
pub mod config;

pub use auth::{CredentialStore, SessionCredentials};
pub use config::{PresenceConfig, ServiceConfig};
