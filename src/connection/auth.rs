use std::sync::{PoisonError, RwLock};

use tracing::info;

/// Locally cached credential state
///
/// Token acquisition happens outside this crate; the directory only reads
/// the current access token and clears it once the service reports it as
/// expired.
pub trait CredentialStore: Send + Sync {
    /// Returns the current access token, if one is stored
    fn access_token(&self) -> Option<String>;

    /// Drops the stored credentials
    fn clear(&self);
}

/// In-memory credential store for a single session
#[derive(Debug, Default)]
pub struct SessionCredentials {
    token: RwLock<Option<String>>,
}

impl SessionCredentials {
    /// Creates a store without a token
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Replaces the stored token
    pub fn store(&self, token: impl Into<String>) {
        let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token.into());
    }

    /// Checks if a token is currently stored
    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

impl CredentialStore for SessionCredentials {
    fn access_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            info!("cleared expired session credentials");
        }
    }
}
