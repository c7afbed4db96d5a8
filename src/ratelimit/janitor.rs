//! Background sweep that evicts expired windows.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::store::WindowStore;

/// Handle to the sweep task.
///
/// Call [`Janitor::shutdown`] to stop it cleanly. Dropping the handle
/// aborts the task instead.
pub struct Janitor {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Janitor {
    /// Spawn a task that sweeps `store` every `interval`.
    ///
    /// The first sweep happens one full interval after spawning.
    pub fn spawn(store: Arc<WindowStore>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let now = Instant::now().into_std();
                        let evicted = store.sweep_expired(now);
                        debug!(evicted, remaining = store.len(), "Swept expired windows");
                    }
                }
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "Janitor spawned");

        Self {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Janitor task ended abnormally");
            }
        }
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
