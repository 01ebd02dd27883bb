// ============================================================================
// projectlist Library
// ============================================================================

pub mod connection;
pub mod core;
pub mod directory;
pub mod events;
pub mod presence;
pub mod service;

use std::sync::Arc;

use tokio::sync::broadcast;

// Re-export main types for convenience
pub use connection::{CredentialStore, PresenceConfig, ServiceConfig, SessionCredentials};
pub use crate::core::{
    ConfigError, DirectoryError, Group, Metadata, Project, Result, Scope, ServiceError,
};
pub use directory::{DirectoryFilter, DirectoryManager, Phase};
pub use events::{DirectoryEvent, EventBus};
pub use presence::{
    ManualTimer, MemoryRoomHub, ObservationTimer, PresenceAggregator, PresenceRecord,
    RoomBinding, RoomEngine, TokioTimer,
};
pub use service::{ContactService, HttpContactService, HttpProjectService, ProjectService};

// ============================================================================
// Composition root
// ============================================================================

/// Project list with online-user presence
///
/// Wires the directory manager, the presence aggregator and the event bus
/// they publish on. Hosts subscribe to the bus instead of listening for
/// global notifications.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use projectlist::{MemoryRoomHub, ProjectList, Scope, ServiceConfig, SessionCredentials};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Arc::new(SessionCredentials::with_token("token"));
/// let list = ProjectList::connect(
///     ServiceConfig::default(),
///     credentials,
///     Arc::new(MemoryRoomHub::new()),
/// )?;
///
/// list.directory().load_directory(Scope::Mine).await?;
/// for project in list.directory().view() {
///     println!("{} [{}]", project.name, list.presence().online_users_label(&project.name));
/// }
/// # Ok(())
/// # }
/// ```
pub struct ProjectList {
    config: ServiceConfig,
    events: EventBus,
    directory: DirectoryManager,
    presence: PresenceAggregator,
}

impl ProjectList {
    /// Connect to the HTTP project and contact services described by `config`
    pub fn connect(
        config: ServiceConfig,
        credentials: Arc<dyn CredentialStore>,
        engine: Arc<dyn RoomEngine>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let projects = Arc::new(HttpProjectService::from_config(&config)?);
        let contacts = Arc::new(HttpContactService::from_config(&config)?);
        let timer: Arc<dyn ObservationTimer> = Arc::new(TokioTimer);
        Ok(Self::from_parts(
            config,
            projects,
            contacts,
            credentials,
            engine,
            timer,
        ))
    }

    /// Assemble from already constructed collaborators
    pub fn from_parts(
        config: ServiceConfig,
        projects: Arc<dyn ProjectService>,
        contacts: Arc<dyn ContactService>,
        credentials: Arc<dyn CredentialStore>,
        engine: Arc<dyn RoomEngine>,
        timer: Arc<dyn ObservationTimer>,
    ) -> Self {
        let events = EventBus::new();
        let directory = DirectoryManager::new(projects, contacts, credentials, events.clone())
            .disable_all_projects(config.disable_all_projects);
        let presence = PresenceAggregator::with_timer(engine, timer, &config.presence);

        Self {
            config,
            events,
            directory,
            presence,
        }
    }

    pub fn directory(&self) -> &DirectoryManager {
        &self.directory
    }

    pub fn presence(&self) -> &PresenceAggregator {
        &self.presence
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Subscribe to directory notifications
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    /// Start presence probes for the rooms of each project
    pub fn set_online_user_rooms(&self, binding: &RoomBinding) {
        self.presence.track(binding);
    }
}
