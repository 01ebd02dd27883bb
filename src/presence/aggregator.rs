use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::probe::{ProbeSettings, probe_room};
use super::record::{PresenceRecord, RoomBinding};
use super::room::RoomEngine;
use super::timer::{ObservationTimer, TokioTimer};
use crate::connection::PresenceConfig;

/// Presence aggregator
///
/// Probes every room of a [`RoomBinding`] independently and folds the
/// results into a per-project [`PresenceRecord`]. A name stays recorded for
/// the lifetime of the aggregator: presence means "seen during a window",
/// not "currently connected".
pub struct PresenceAggregator {
    engine: Arc<dyn RoomEngine>,
    timer: Arc<dyn ObservationTimer>,
    settings: ProbeSettings,
    record: Arc<RwLock<PresenceRecord>>,
    probes: Mutex<Vec<JoinHandle<()>>>,
    cancel: watch::Sender<bool>,
}

impl PresenceAggregator {
    /// Create an aggregator using wall-clock observation windows
    pub fn new(engine: Arc<dyn RoomEngine>, config: &PresenceConfig) -> Self {
        Self::with_timer(engine, Arc::new(TokioTimer), config)
    }

    pub fn with_timer(
        engine: Arc<dyn RoomEngine>,
        timer: Arc<dyn ObservationTimer>,
        config: &PresenceConfig,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            engine,
            timer,
            settings: ProbeSettings {
                window: config.observation_window,
                reserved_identity: config.reserved_identity.clone(),
            },
            record: Arc::new(RwLock::new(PresenceRecord::new())),
            probes: Mutex::new(Vec::new()),
            cancel,
        }
    }

    /// Start one probe per room of `binding`.
    ///
    /// Probes from earlier calls keep running. Must be called from within a
    /// tokio runtime.
    pub fn track(&self, binding: &RoomBinding) {
        let mut started = Vec::with_capacity(binding.room_count());

        for (project, rooms) in binding.iter() {
            self.record
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .ensure(project);

            for room in rooms {
                started.push(self.spawn_probe(project.to_string(), room.clone()));
            }
        }

        info!(
            projects = binding.iter().count(),
            rooms = started.len(),
            "tracking room presence"
        );
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(started);
    }

    fn spawn_probe(&self, project: String, room: String) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let timer = Arc::clone(&self.timer);
        let record = Arc::clone(&self.record);
        let settings = self.settings.clone();
        let cancel = self.cancel.subscribe();

        tokio::spawn(async move {
            let users = probe_room(&room, engine.as_ref(), timer.as_ref(), &settings, cancel).await;
            let added = record
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .merge(&project, users);
            debug!(project = %project, room = %room, added, "merged room presence");
        })
    }

    /// Users seen online in any room of `project`.
    pub fn presence_for(&self, project: &str) -> BTreeSet<String> {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .users(project)
    }

    /// Comma-separated online users of `project`, empty when none.
    pub fn online_users_label(&self, project: &str) -> String {
        self.presence_for(project)
            .into_iter()
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Snapshot of the whole presence record.
    pub fn snapshot(&self) -> PresenceRecord {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of probes started and not yet awaited by [`settle`](Self::settle).
    pub fn pending_probes(&self) -> usize {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait for every probe started so far to merge its result.
    pub async fn settle(&self) {
        let handles = std::mem::take(
            &mut *self.probes.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for result in join_all(handles).await {
            if let Err(error) = result {
                debug!(error = %error, "presence probe task ended abnormally");
            }
        }
    }

    /// Close every open observation window now. Probes still leave their
    /// rooms and merge what they observed. Probes started after this close
    /// their window immediately.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}
