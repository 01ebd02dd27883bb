use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::Project;

/// Project name to the rooms whose participants count as that project's
/// online users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomBinding {
    rooms: BTreeMap<String, Vec<String>>,
}

impl RoomBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `rooms` to `project`, keeping the given order.
    pub fn bind<I, S>(mut self, project: impl Into<String>, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rooms
            .entry(project.into())
            .or_default()
            .extend(rooms.into_iter().map(Into::into));
        self
    }

    /// Derive a binding for loaded projects, `rooms_for` naming each
    /// project's rooms.
    pub fn from_projects<F>(projects: &[Project], rooms_for: F) -> Self
    where
        F: Fn(&Project) -> Vec<String>,
    {
        projects.iter().fold(Self::new(), |binding, project| {
            binding.bind(project.name.clone(), rooms_for(project))
        })
    }

    pub fn rooms(&self, project: &str) -> &[String] {
        self.rooms.get(project).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.rooms
            .iter()
            .map(|(project, rooms)| (project.as_str(), rooms.as_slice()))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Display names seen online per project. Entries only grow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceRecord {
    online: HashMap<String, BTreeSet<String>>,
}

impl PresenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `project` without any user.
    pub fn ensure(&mut self, project: &str) {
        self.online.entry(project.to_string()).or_default();
    }

    /// Set union of `users` into the project's entry. Returns the number of
    /// names that were not recorded before.
    pub fn merge<I>(&mut self, project: &str, users: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self.online.entry(project.to_string()).or_default();
        let before = entry.len();
        entry.extend(users);
        entry.len() - before
    }

    pub fn users(&self, project: &str) -> BTreeSet<String> {
        self.online.get(project).cloned().unwrap_or_default()
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.online.keys().map(String::as_str)
    }
}
