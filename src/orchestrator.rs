//! Supervises one poll loop per consumer (spec §4.4).
//!
//! Grounded on `silas/queue/orchestrator.py`'s `QueueOrchestrator`: one
//! background task per consumer, each looping `poll_once` with an idle
//! sleep, stopped cooperatively rather than killed. `tokio::spawn` plus
//! `Arc<AtomicBool>`/`Notify` replace the source's asyncio task-cancellation
//! idiom with the teacher's own task-supervision style
//! (`message_router`'s worker pool shuts down the same way).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::consumer::{Consumer, ConsumerRuntime};
use crate::error::BusError;
use crate::time_provider::SharedTimeProvider;

/// One supervised consumer poll loop.
struct Worker {
    queue_name: String,
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

/// Runs every registered consumer's poll loop concurrently until
/// [`Orchestrator::stop`] is called.
#[derive(Default)]
pub struct Orchestrator {
    workers: Vec<Worker>,
}

impl Orchestrator {
    /// Builds an empty orchestrator; consumers are added via
    /// [`Orchestrator::spawn`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns a background task that repeatedly calls `runtime.poll_once()`,
    /// sleeping `poll_interval` between idle polls, until stopped.
    pub fn spawn<C>(
        &mut self,
        runtime: Arc<ConsumerRuntime<C>>,
        poll_interval: std::time::Duration,
        time_provider: SharedTimeProvider,
    ) where
        C: Consumer + 'static,
    {
        let queue_name = runtime.queue_name().to_string();
        let stop = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        let task_stop = Arc::clone(&stop);
        let task_notify = Arc::clone(&notify);
        let task_queue_name = queue_name.clone();

        let handle = tokio::spawn(async move {
            info!(queue = %task_queue_name, "consumer loop started");
            loop {
                if task_stop.load(Ordering::Relaxed) {
                    break;
                }

                match runtime.poll_once().await {
                    Ok(crate::consumer::PollResult::WorkDone) => {}
                    Ok(crate::consumer::PollResult::Idle) => {
                        tokio::select! {
                            () = time_provider.sleep(poll_interval) => {}
                            () = task_notify.notified() => {}
                        }
                    }
                    Err(err) => {
                        warn!(queue = %task_queue_name, error = %err, "consumer loop error, backing off");
                        time_provider.sleep(poll_interval).await;
                    }
                }
            }
            info!(queue = %task_queue_name, "consumer loop stopped");
        });

        self.workers.push(Worker {
            queue_name,
            handle,
            stop,
            notify,
        });
    }

    /// Signals every worker to stop after its current `poll_once` call and
    /// waits for all loops to exit.
    #[instrument(skip(self))]
    pub async fn stop(self) -> Result<(), BusError> {
        for worker in &self.workers {
            worker.stop.store(true, Ordering::Relaxed);
            worker.notify.notify_one();
        }
        for worker in self.workers {
            if worker.handle.await.is_err() {
                warn!(queue = %worker.queue_name, "consumer task panicked during shutdown");
            }
        }
        Ok(())
    }

    /// Number of consumer loops currently supervised.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
