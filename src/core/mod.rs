pub mod error;
pub mod types;

pub use error::{ConfigError, DirectoryError, Result, ServiceError};
pub use types::{Group, Metadata, Project, Scope};
