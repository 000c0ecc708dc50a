use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::Turn;

/// Unit of work for the detection worker: a ready turn plus the buffer
/// snapshots taken when it was enqueued.
#[derive(Debug, Clone)]
pub struct DetectionJob {
    pub turn: Turn,
    pub uncommented_text: String,
    pub full_context: String,
    /// Wall-clock enqueue stamp; staleness is measured against this, never
    /// against media timestamps (media seconds and wall-clock age are not
    /// comparable).
    pub enqueued_at: Instant,
}

impl DetectionJob {
    pub fn new(turn: Turn, uncommented_text: String, full_context: String) -> Self {
        Self {
            turn,
            uncommented_text,
            full_context,
            enqueued_at: Instant::now(),
        }
    }
}

/// Consumer side of the detection queue.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Processes one job. Runs serially: the worker never starts a second
    /// invocation before the previous one returns, and an in-flight
    /// invocation is never cancelled by newer enqueues.
    async fn process(self: Arc<Self>, job: DetectionJob) -> anyhow::Result<()>;

    /// Called when `process` returned an error; the worker then continues
    /// with the next pending job.
    fn on_error(&self, error: anyhow::Error, job: &DetectionJob);

    /// Called when a job was evicted for staleness before processing.
    fn on_drop_stale(&self, _job: &DetectionJob) {}
}

#[derive(Default)]
struct QueueState {
    pending: Option<DetectionJob>,
    running: bool,
    worker: Option<AbortHandle>,
}

/// Single-slot, latest-wins work queue with a serial worker and staleness
/// eviction.
///
/// `enqueue` overwrites any pending job — the newest input wins and older
/// pending work is silently dropped. The worker drains the slot one job at a
/// time and exits when it is empty; the next enqueue restarts it.
pub struct DetectionQueue {
    state: Arc<Mutex<QueueState>>,
    max_staleness: Duration,
    dropped_stale: Arc<AtomicU64>,
}

impl DetectionQueue {
    pub fn new(max_staleness: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            max_staleness,
            dropped_stale: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamps the job and puts it in the slot, replacing any pending job.
    /// Spawns the worker when none is running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, mut job: DetectionJob, handler: Arc<dyn JobHandler>) {
        job.enqueued_at = Instant::now();
        let mut state = self.state.lock().unwrap();
        if let Some(dropped) = state.pending.replace(job) {
            debug!(turn_id = %dropped.turn.id, "pending detection superseded by newer turn");
        }
        if !state.running {
            state.running = true;
            let handle = tokio::spawn(worker_loop(
                Arc::clone(&self.state),
                handler,
                self.max_staleness,
                Arc::clone(&self.dropped_stale),
            ));
            state.worker = Some(handle.abort_handle());
        }
    }

    /// Drops the pending job, if any. The in-flight job (if one is being
    /// processed) is not affected.
    pub fn clear(&self) {
        self.state.lock().unwrap().pending = None;
    }

    /// Clears the slot and aborts the worker task. Used at facade teardown.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.pending = None;
        state.running = false;
        if let Some(worker) = state.worker.take() {
            worker.abort();
        }
    }

    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    /// Number of jobs evicted for staleness since creation.
    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale.load(Ordering::Relaxed)
    }

    /// Records a staleness eviction that happened outside the worker's own
    /// check (the defensive re-check inside job processing).
    pub fn note_dropped_stale(&self) {
        self.dropped_stale.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }
}

async fn worker_loop(
    state: Arc<Mutex<QueueState>>,
    handler: Arc<dyn JobHandler>,
    max_staleness: Duration,
    dropped_stale: Arc<AtomicU64>,
) {
    loop {
        let job = {
            let mut state = state.lock().unwrap();
            match state.pending.take() {
                Some(job) => job,
                None => {
                    state.running = false;
                    state.worker = None;
                    return;
                }
            }
        };

        if job.enqueued_at.elapsed() > max_staleness {
            dropped_stale.fetch_add(1, Ordering::Relaxed);
            debug!(
                turn_id = %job.turn.id,
                age_ms = job.enqueued_at.elapsed().as_millis() as u64,
                "dropping stale detection job"
            );
            handler.on_drop_stale(&job);
            continue;
        }

        if let Err(error) = Arc::clone(&handler).process(job.clone()).await {
            warn!(%error, turn_id = %job.turn.id, "detection job failed");
            handler.on_error(error, &job);
        }
    }
}
