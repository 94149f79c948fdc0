// * Periodic Scheduler
// * Single background worker: tick, sleep for the full interval, repeat.
// * A failing or panicking callback is logged and counted; the schedule keeps going.

use crate::config::constants::SCHEDULER_STOP_GRACE;
use crate::config::SchedulerSection;
use crate::ops::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Error type a state-check callback may return
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// The tick action. Runs on the blocking pool, so it may block.
pub type StateCheck = Arc<dyn Fn() -> Result<(), CallbackError> + Send + Sync>;

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval: Duration,
    pub worker_alive: bool,
}

struct Worker {
    // * Owned by exactly one worker, so a late-exiting worker cannot be revived by start()
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    // * Closes when the worker task ends or is dropped
    exited: watch::Receiver<()>,
}

struct SchedulerState {
    interval: Duration,
    callback: Option<StateCheck>,
    worker: Option<Worker>,
}

/// Fixed-interval background timer driving the state-check callback
pub struct PeriodicScheduler {
    state: Mutex<SchedulerState>,
    grace: Duration,
}

impl std::fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field("status", &self.status())
            .finish()
    }
}

impl PeriodicScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                interval,
                callback: None,
                worker: None,
            }),
            grace: SCHEDULER_STOP_GRACE,
        }
    }

    pub fn from_section(section: &SchedulerSection) -> Self {
        Self::new(section.interval())
    }

    /// Overrides how long `stop()` waits for the worker to exit
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    // * The lock is never held across an await, so a poisoned guard still holds consistent state
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the interval and tick action. Takes effect on the next `start()`.
    pub fn configure<F>(&self, interval: Duration, callback: F)
    where
        F: Fn() -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let mut state = self.lock();
        if Self::is_running(&state) {
            tracing::warn!("Scheduler reconfigured while running; changes apply on next start");
        }
        state.interval = interval;
        state.callback = Some(Arc::new(callback));
    }

    fn is_running(state: &SchedulerState) -> bool {
        state
            .worker
            .as_ref()
            .is_some_and(|w| !w.stop.load(Ordering::Acquire))
    }

    /// Spawns the worker and returns immediately. Must be called inside a tokio runtime.
    ///
    /// A worker left over from a timed-out `stop()` is awaited by the new worker
    /// before its first tick.
    pub fn start(&self) {
        let mut state = self.lock();
        if Self::is_running(&state) {
            tracing::warn!("Scheduler is already running");
            return;
        }

        let previous = state
            .worker
            .take()
            .filter(|w| !w.handle.is_finished())
            .map(|w| w.exited);
        if previous.is_some() {
            tracing::warn!("Previous scheduler worker still alive; first tick waits for it");
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (alive, exited) = watch::channel(());
        let interval = state.interval;
        let callback = state.callback.clone();

        let handle = tokio::spawn(Self::run_loop(
            interval,
            callback,
            Arc::clone(&stop),
            previous,
            alive,
        ));
        state.worker = Some(Worker {
            stop,
            handle,
            exited,
        });

        tracing::info!(interval_secs = interval.as_secs_f64(), "Scheduler started");
    }

    /// Signals the worker and waits up to the grace period for it to exit.
    ///
    /// The worker notices the signal only after its current tick and sleep complete;
    /// on timeout this returns without aborting it.
    pub async fn stop(&self) {
        let (stop, exited) = {
            let state = self.lock();
            match state.worker.as_ref() {
                Some(w) if !w.stop.load(Ordering::Acquire) => {
                    (Arc::clone(&w.stop), w.exited.clone())
                }
                _ => return,
            }
        };

        stop.store(true, Ordering::Release);

        if tokio::time::timeout(self.grace, wait_for_exit(exited))
            .await
            .is_err()
        {
            tracing::warn!(
                grace_secs = self.grace.as_secs_f64(),
                "Scheduler worker did not exit within grace period"
            );
            return;
        }

        // * Only clear the slot if a concurrent start() has not replaced the worker
        let finished = {
            let mut state = self.lock();
            let same = state
                .worker
                .as_ref()
                .is_some_and(|w| Arc::ptr_eq(&w.stop, &stop));
            if same {
                state.worker.take()
            } else {
                None
            }
        };

        match finished {
            Some(worker) => match worker.handle.await {
                Ok(()) => tracing::info!("Scheduler stopped"),
                Err(e) => tracing::error!(error = %e, "Scheduler worker ended abnormally"),
            },
            None => tracing::info!("Scheduler stopped"),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.lock();
        SchedulerStatus {
            running: Self::is_running(&state),
            interval: state.interval,
            worker_alive: state
                .worker
                .as_ref()
                .is_some_and(|w| !w.handle.is_finished()),
        }
    }

    async fn run_loop(
        interval: Duration,
        callback: Option<StateCheck>,
        stop: Arc<AtomicBool>,
        previous: Option<watch::Receiver<()>>,
        _alive: watch::Sender<()>,
    ) {
        if let Some(previous) = previous {
            wait_for_exit(previous).await;
            tracing::debug!("Previous scheduler worker exited");
        }

        while !stop.load(Ordering::Acquire) {
            Self::tick(callback.as_ref()).await;
            tokio::time::sleep(interval).await;
        }
        tracing::debug!("Scheduler worker exiting");
    }

    async fn tick(callback: Option<&StateCheck>) {
        let Some(callback) = callback else {
            tracing::debug!("Performing default state check");
            telemetry::record_scheduler_tick("ok");
            return;
        };

        let callback = Arc::clone(callback);
        match tokio::task::spawn_blocking(move || callback()).await {
            Ok(Ok(())) => telemetry::record_scheduler_tick("ok"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Error in state check callback");
                telemetry::record_scheduler_tick("error");
            }
            Err(e) => {
                tracing::error!(error = %e, "State check callback panicked");
                telemetry::record_scheduler_tick("panic");
            }
        }
    }
}

// * Nothing is ever sent; changed() fails once the worker drops its sender
async fn wait_for_exit(mut exited: watch::Receiver<()>) {
    while exited.changed().await.is_ok() {}
}

impl Default for PeriodicScheduler {
    fn default() -> Self {
        Self::from_section(&SchedulerSection::default())
    }
}
