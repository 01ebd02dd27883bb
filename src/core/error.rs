use thiserror::Error;

/// Outcome taxonomy reported by the directory manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Project '{0}' already exists")]
    NameConflict(String),

    #[error("Transient failure: {0}")]
    TransientFailure(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),
}

impl DirectoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientFailure(message.into())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Errors raised by the remote project and contact service clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("request was rejected as unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Maps a non-success HTTP status onto the service taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 => Self::Unauthorized,
            409 => Self::Conflict(body),
            _ => Self::Status { status, body },
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("unknown scope '{0}', expected 'mine' or 'all'")]
    UnknownScope(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
