use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use super::room::{RoomEngine, RoomSession};
use super::timer::ObservationTimer;

/// Parameters shared by every probe of an aggregator.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub window: Duration,
    pub reserved_identity: String,
}

/// One bounded attempt to discover who is connected to `room`.
///
/// Subscribes to the join map, announces the reserved identity and records
/// the display name of every other participant that answers until the
/// window elapses or `cancel` turns true. The room is always left before
/// returning. An unreachable room yields an empty set.
pub async fn probe_room(
    room: &str,
    engine: &dyn RoomEngine,
    timer: &dyn ObservationTimer,
    settings: &ProbeSettings,
    mut cancel: watch::Receiver<bool>,
) -> BTreeSet<String> {
    let mut observed = BTreeSet::new();

    let mut session = match engine.open(room).await {
        Ok(session) => session,
        Err(error) => {
            debug!(room, error = %error, "presence probe could not open room");
            return observed;
        }
    };

    let mut changes = session.observe_changes();
    if let Err(error) = session.join(&settings.reserved_identity).await {
        debug!(room, error = %error, "presence probe could not join room");
        session.leave().await;
        return observed;
    }

    let window = timer.wait(settings.window);
    tokio::pin!(window);

    let mut stream_open = true;
    loop {
        // notifications already delivered count even if the window has closed
        tokio::select! {
            biased;
            change = changes.recv(), if stream_open => match change {
                Some(change) => record(&*session, settings, &change.identity, &mut observed),
                None => stream_open = false,
            },
            _ = &mut window => break,
            _ = cancelled(&mut cancel) => break,
        }
    }

    session.leave().await;
    debug!(room, users = observed.len(), "presence probe finished");
    observed
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // a dropped sender also ends the window
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

fn record(
    session: &dyn RoomSession,
    settings: &ProbeSettings,
    identity: &str,
    observed: &mut BTreeSet<String>,
) {
    if identity == settings.reserved_identity {
        return;
    }
    if let Some(name) = session.lookup_display_name(identity) {
        observed.insert(name);
    }
}
