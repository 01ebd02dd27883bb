use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Field of a user-directory entry holding the participant's display name.
pub const DISPLAY_NAME_FIELD: &str = "http://purl.org/dc/terms/title";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room '{0}' is unreachable")]
    Unreachable(String),

    #[error("room session closed: {0}")]
    Closed(String),
}

/// A participant identity written to the room's join map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    pub identity: String,
}

impl MembershipChange {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

/// Shared-state room engine.
///
/// The engine has no query for current membership. Presence is
/// reconstructed by joining and collecting the join notifications existing
/// participants emit in response.
#[async_trait]
pub trait RoomEngine: Send + Sync {
    /// Connect to the shared document of `room`.
    async fn open(&self, room: &str) -> Result<Box<dyn RoomSession>, RoomError>;
}

/// Connection to one room.
#[async_trait]
pub trait RoomSession: Send {
    /// Subscribe to changes of the room's join map.
    fn observe_changes(&mut self) -> mpsc::UnboundedReceiver<MembershipChange>;

    /// Write `identity` into the join map.
    async fn join(&mut self, identity: &str) -> Result<(), RoomError>;

    /// Display name of `identity` from the room's user directory.
    fn lookup_display_name(&self, identity: &str) -> Option<String>;

    /// Close the room connection.
    async fn leave(&mut self);
}
