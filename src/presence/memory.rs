use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::room::{DISPLAY_NAME_FIELD, MembershipChange, RoomEngine, RoomError, RoomSession};

#[derive(Debug, Default)]
struct MemoryRoom {
    /// Identities currently written to the join map
    participants: Vec<String>,
    /// Identity to user-directory entry
    user_directory: HashMap<String, Value>,
    observers: HashMap<u64, mpsc::UnboundedSender<MembershipChange>>,
    open_sessions: usize,
}

impl MemoryRoom {
    fn broadcast(&mut self, identity: &str) {
        self.observers
            .retain(|_, observer| observer.send(MembershipChange::new(identity)).is_ok());
    }
}

#[derive(Debug, Default)]
struct HubState {
    rooms: HashMap<String, MemoryRoom>,
    unreachable: HashSet<String>,
    next_observer: u64,
}

/// In-process room engine.
///
/// Mirrors the join-map protocol of the collaboration engine: whenever an
/// identity joins, every participant already in the room re-announces
/// itself to the room's observers.
#[derive(Debug, Clone, Default)]
pub struct MemoryRoomHub {
    inner: Arc<Mutex<HubState>>,
}

impl MemoryRoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `identity` into the join map of `room`, registering its display
    /// name in the user directory when given.
    pub fn add_participant(&self, room: &str, identity: &str, display_name: Option<&str>) {
        let mut hub = self.lock();
        let room = hub.rooms.entry(room.to_string()).or_default();
        if !room.participants.iter().any(|existing| existing == identity) {
            room.participants.push(identity.to_string());
        }
        if let Some(name) = display_name {
            room.user_directory
                .insert(identity.to_string(), json!({ DISPLAY_NAME_FIELD: name }));
        }
    }

    pub fn remove_participant(&self, room: &str, identity: &str) {
        if let Some(room) = self.lock().rooms.get_mut(room) {
            room.participants.retain(|existing| existing != identity);
        }
    }

    /// Make `open` fail for `room`.
    pub fn set_unreachable(&self, room: &str, unreachable: bool) {
        let mut hub = self.lock();
        if unreachable {
            hub.unreachable.insert(room.to_string());
        } else {
            hub.unreachable.remove(room);
        }
    }

    /// Sessions opened on `room` and not yet left.
    pub fn open_sessions(&self, room: &str) -> usize {
        self.lock()
            .rooms
            .get(room)
            .map(|room| room.open_sessions)
            .unwrap_or(0)
    }

    pub fn participants(&self, room: &str) -> Vec<String> {
        self.lock()
            .rooms
            .get(room)
            .map(|room| room.participants.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RoomEngine for MemoryRoomHub {
    async fn open(&self, room: &str) -> Result<Box<dyn RoomSession>, RoomError> {
        let mut hub = self.lock();
        if hub.unreachable.contains(room) {
            return Err(RoomError::Unreachable(room.to_string()));
        }
        hub.rooms.entry(room.to_string()).or_default().open_sessions += 1;

        Ok(Box::new(MemorySession {
            hub: Arc::clone(&self.inner),
            room: room.to_string(),
            observer_ids: Vec::new(),
            identity: None,
            closed: false,
        }))
    }
}

struct MemorySession {
    hub: Arc<Mutex<HubState>>,
    room: String,
    observer_ids: Vec<u64>,
    identity: Option<String>,
    closed: bool,
}

impl MemorySession {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.hub.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RoomSession for MemorySession {
    fn observe_changes(&mut self) -> mpsc::UnboundedReceiver<MembershipChange> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = {
            let mut hub = self.lock();
            let id = hub.next_observer;
            hub.next_observer += 1;
            hub.rooms
                .entry(self.room.clone())
                .or_default()
                .observers
                .insert(id, sender);
            id
        };
        self.observer_ids.push(id);
        receiver
    }

    async fn join(&mut self, identity: &str) -> Result<(), RoomError> {
        if self.closed {
            return Err(RoomError::Closed(self.room.clone()));
        }

        {
            let mut hub = self.lock();
            let room = hub.rooms.entry(self.room.clone()).or_default();
            room.broadcast(identity);

            let answering: Vec<String> = room
                .participants
                .iter()
                .filter(|existing| existing.as_str() != identity)
                .cloned()
                .collect();
            for participant in &answering {
                room.broadcast(participant);
            }

            if !room.participants.iter().any(|existing| existing == identity) {
                room.participants.push(identity.to_string());
            }
        }

        self.identity = Some(identity.to_string());
        Ok(())
    }

    fn lookup_display_name(&self, identity: &str) -> Option<String> {
        let hub = self.lock();
        let entry = hub.rooms.get(&self.room)?.user_directory.get(identity)?;
        entry
            .get(DISPLAY_NAME_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    async fn leave(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let observer_ids = std::mem::take(&mut self.observer_ids);
        let identity = self.identity.take();
        let mut hub = self.lock();
        if let Some(room) = hub.rooms.get_mut(&self.room) {
            for id in observer_ids {
                room.observers.remove(&id);
            }
            if let Some(identity) = identity {
                room.participants.retain(|existing| *existing != identity);
            }
            room.open_sessions = room.open_sessions.saturating_sub(1);
        }
    }
}
