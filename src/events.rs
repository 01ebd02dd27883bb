//! Typed notifications from the directory to its host.

use tokio::sync::broadcast;
use tracing::trace;

use crate::core::{Metadata, Project};

const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryEvent {
    /// The canonical project list after a successful load
    ProjectsLoaded(Vec<Project>),
    /// A project was chosen, or its linked group changed
    ProjectSelected(Project),
    /// Metadata of a project was accepted by the service
    MetadataChanged {
        project: Project,
        metadata: Metadata,
    },
}

impl DirectoryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DirectoryEvent::ProjectsLoaded(_) => "projects-loaded",
            DirectoryEvent::ProjectSelected(_) => "project-selected",
            DirectoryEvent::MetadataChanged { .. } => "metadata-changed",
        }
    }
}

/// Publish/subscribe channel owned by the composition root.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DirectoryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.sender.subscribe()
    }

    /// Delivers `event` to current subscribers. Publishing with no
    /// subscriber drops the event.
    pub fn publish(&self, event: DirectoryEvent) {
        let name = event.name();
        let receivers = self.sender.send(event).unwrap_or(0);
        trace!(event = name, receivers, "published directory event");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
