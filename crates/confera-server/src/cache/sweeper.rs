//! Background sweep of expired entries.
//!
//! Expiry is already enforced on every read; the sweeper only reclaims memory
//! held by entries nobody reads again. The same periodic task drives the
//! rate limiter's idle bucket reclaim.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

use crate::cache::ResponseCache;

/// Shortest period a background task will run at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Handle for controlling a running sweeper.
///
/// Dropping the handle stops the sweeper.
pub struct SweeperHandle {
    /// Sender to signal shutdown.
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Spawns `run` with the shutdown receiver it must watch.
    pub(crate) fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(shutdown_rx));

        Self {
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Signals the sweeper to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stops the sweeper and waits for its task to finish.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true once the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<V> ResponseCache<V>
where
    V: Send + Sync + 'static,
{
    /// Starts a periodic sweep on the current tokio runtime.
    ///
    /// The task holds a weak reference, so it also ends once the last
    /// `Arc` to the cache is dropped. `every` is raised to
    /// [`MIN_SWEEP_INTERVAL`] when shorter.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        let cache = Arc::downgrade(self);
        SweeperHandle::spawn(move |shutdown_rx| {
            run_periodic(cache, every, shutdown_rx, "cache sweeper", |cache| {
                cache.sweep_expired();
            })
        })
    }
}

/// Calls `tick` on `target` every `every` until shutdown or until `target`
/// is dropped. The first tick fires one period after start.
pub(crate) async fn run_periodic<T>(
    target: Weak<T>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    name: &'static str,
    tick: fn(&T),
) where
    T: Send + Sync + 'static,
{
    let every = every.max(MIN_SWEEP_INTERVAL);
    let mut timer = interval_at(Instant::now() + every, every);

    info!(task = name, "Starting background task with interval {:?}", every);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let Some(target) = target.upgrade() else {
                    debug!(task = name, "Owner dropped, background task exiting");
                    break;
                };
                tick(&target);
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!(task = name, "Background task shutting down");
                    break;
                }
            }
        }
    }
}
