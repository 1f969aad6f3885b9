//! Periodic job scheduling.
//!
//! A [`PeriodicJob`] is a unit of background work; a [`Scheduler`] decides when it runs. The tokio
//! implementation ticks on a fixed interval and is stopped through a `watch` channel, the same
//! shutdown signal the workers use.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[async_trait]
pub trait PeriodicJob: Send + 'static {
    fn name(&self) -> &str;

    /// One tick of work. Failures are logged by the job itself; the schedule keeps going.
    async fn run_once(&mut self);
}

pub trait Scheduler: Send + Sync {
    fn schedule(&self, interval: Duration, job: Box<dyn PeriodicJob>) -> JobHandle;
}

/// Handle to a scheduled job. Dropping it without calling [`JobHandle::stop`] also ends the job
/// at its next tick boundary, since the shutdown channel closes.
pub struct JobHandle {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the job and wait for an in-flight tick to be abandoned.
    pub async fn stop(self) {
        let JobHandle {
            name,
            shutdown_tx,
            handle,
        } = self;

        let _ = shutdown_tx.send(true);
        if let Err(e) = handle.await {
            warn!(job = %name, error = %e, "periodic job ended abnormally");
        }
    }
}

/// Runs each job on its own tokio task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    /// Fire the first tick as soon as the job is scheduled rather than one interval later.
    pub run_immediately: bool,
}

impl TokioScheduler {
    pub fn new(run_immediately: bool) -> Self {
        Self { run_immediately }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, interval: Duration, job: Box<dyn PeriodicJob>) -> JobHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let name = job.name().to_string();
        let handle = tokio::spawn(run_job(job, interval, self.run_immediately, shutdown_rx));

        JobHandle {
            name,
            shutdown_tx,
            handle,
        }
    }
}

async fn run_job(
    mut job: Box<dyn PeriodicJob>,
    period: Duration,
    run_immediately: bool,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    if !run_immediately {
        ticker.tick().await;
    }

    info!(
        job = %job.name(),
        interval_ms = period.as_millis() as u64,
        "periodic job started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                // A tick in flight is abandoned when shutdown arrives.
                let stop = tokio::select! {
                    _ = job.run_once() => false,
                    changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
                };
                if stop {
                    break;
                }
            }
        }
    }

    info!(job = %job.name(), "periodic job stopped");
}
