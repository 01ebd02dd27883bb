use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

/// Bounds how long a probe keeps its room open.
#[async_trait]
pub trait ObservationTimer: Send + Sync {
    /// Resolves once the observation `window` has elapsed.
    async fn wait(&self, window: Duration);
}

/// Wall-clock timer backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl ObservationTimer for TokioTimer {
    async fn wait(&self, window: Duration) {
        tokio::time::sleep(window).await;
    }
}

/// Timer whose windows close only when [`ManualTimer::fire`] is called.
///
/// Once fired, every pending and future window resolves immediately.
#[derive(Debug)]
pub struct ManualTimer {
    fired: watch::Sender<bool>,
}

impl ManualTimer {
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self { fired }
    }

    pub fn fire(&self) {
        self.fired.send_replace(true);
    }

    pub fn has_fired(&self) -> bool {
        *self.fired.borrow()
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObservationTimer for ManualTimer {
    async fn wait(&self, _window: Duration) {
        let mut fired = self.fired.subscribe();
        // the sender lives as long as `self`, so this only errors on shutdown
        let _ = fired.wait_for(|fired| *fired).await;
    }
}
