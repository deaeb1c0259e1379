//! Execution pool
//!
//! A fixed set of tokio workers, each owning one [`SqlExecutor`]. Jobs for the
//! same [`BatchKey`] always land on the same worker queue, so statements for
//! one table partition execute in flush order even while a worker retries.
//!
//! ```text
//! Queued -> Executing -> Done
//!              |  ^
//!              v  |
//!            Backoff        (until success, or cancellation after shutdown grace)
//! ```

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rustc_hash::FxHasher;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::error::HistoryError;
use super::executor::SqlExecutor;
use super::key::BatchKey;
use super::store::DrainedBatch;

/// One finished statement, executed exactly once
#[derive(Debug)]
pub struct Job {
    pub key: BatchKey,
    pub rows: usize,
    pub sql: String,
}

impl From<DrainedBatch> for Job {
    fn from(batch: DrainedBatch) -> Self {
        Self {
            key: batch.key,
            rows: batch.rows,
            sql: batch.sql,
        }
    }
}

/// Fixed-backoff retry
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
        }
    }
}

/// Pool counters
#[derive(Debug, Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    executed: AtomicU64,
    failed_attempts: AtomicU64,
    abandoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatsSnapshot {
    pub submitted: u64,
    pub executed: u64,
    pub failed_attempts: u64,
    pub abandoned: u64,
}

impl PoolStats {
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable handle that routes jobs to worker queues
#[derive(Clone)]
pub struct JobSubmitter {
    queues: Arc<Vec<mpsc::Sender<Job>>>,
    stats: Arc<PoolStats>,
}

impl JobSubmitter {
    /// Worker index for `key`; stable for the life of the pool
    pub fn route(&self, key: &BatchKey) -> usize {
        route(key, self.queues.len())
    }

    /// Enqueue `job`, waiting while its worker queue is full
    pub async fn submit(&self, job: Job) -> Result<(), HistoryError> {
        let idx = self.route(&job.key);
        self.queues[idx]
            .send(job)
            .await
            .map_err(|_| HistoryError::Stopped)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Jobs waiting across all worker queues
    pub fn queued(&self) -> usize {
        self.queues
            .iter()
            .map(|q| q.max_capacity() - q.capacity())
            .sum()
    }
}

fn route(key: &BatchKey, workers: usize) -> usize {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Worker pool with one private connection per worker
pub struct ExecutionPool {
    submitter: JobSubmitter,
    handles: Vec<JoinHandle<()>>,
    cancel_tx: watch::Sender<bool>,
    stats: Arc<PoolStats>,
}

impl ExecutionPool {
    /// Spawn one worker per executor
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        executors: Vec<Box<dyn SqlExecutor>>,
        policy: RetryPolicy,
        queue_capacity: usize,
    ) -> Result<Self, HistoryError> {
        if executors.is_empty() {
            return Err(HistoryError::Init("execution pool needs at least one worker".into()));
        }
        if queue_capacity == 0 {
            return Err(HistoryError::Init("queue capacity must be > 0".into()));
        }

        let stats = Arc::new(PoolStats::default());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut queues = Vec::with_capacity(executors.len());
        let mut handles = Vec::with_capacity(executors.len());

        for (id, executor) in executors.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(queue_capacity);
            queues.push(tx);
            let worker = Worker {
                id,
                executor,
                policy,
                cancel: cancel_rx.clone(),
                stats: stats.clone(),
            };
            handles.push(tokio::spawn(worker.run(rx)));
        }

        info!(
            workers = handles.len(),
            queue_capacity,
            backoff_ms = policy.backoff.as_millis() as u64,
            "History execution pool started"
        );

        Ok(Self {
            submitter: JobSubmitter {
                queues: Arc::new(queues),
                stats: stats.clone(),
            },
            handles,
            cancel_tx,
            stats,
        })
    }

    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop retrying: jobs get one more attempt, then count as abandoned
    ///
    /// Workers keep pulling from their queues, so a sender blocked on a full
    /// queue is released.
    pub fn cancel_retries(&self) {
        if !self.cancel_tx.send_replace(true) {
            warn!("Cancelling history retries");
        }
    }

    /// Close the queues and wait for workers to finish
    ///
    /// Workers first empty their queues with normal retry. If that takes
    /// longer than `grace`, retries are cancelled: each remaining job gets a
    /// single attempt and failures are logged as abandoned. Every submitter
    /// clone must be dropped before calling this, or the queues never close.
    pub async fn shutdown(mut self, grace: Duration) -> PoolStatsSnapshot {
        let mut handles = std::mem::take(&mut self.handles);
        // Closes this pool's side of the queues
        self.submitter.queues = Arc::new(Vec::new());

        // Handles [0, joined) have completed and must not be polled again
        let mut joined = 0;
        let drained = tokio::time::timeout(grace, async {
            while joined < handles.len() {
                if let Err(e) = (&mut handles[joined]).await {
                    error!("History worker panicked: {}", e);
                }
                joined += 1;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "History workers still busy after grace period"
            );
            self.cancel_retries();
            for handle in handles.into_iter().skip(joined) {
                if let Err(e) = handle.await {
                    error!("History worker panicked: {}", e);
                }
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            executed = snapshot.executed,
            failed_attempts = snapshot.failed_attempts,
            abandoned = snapshot.abandoned,
            "History execution pool stopped"
        );
        snapshot
    }
}

struct Worker {
    id: usize,
    executor: Box<dyn SqlExecutor>,
    policy: RetryPolicy,
    cancel: watch::Receiver<bool>,
    stats: Arc<PoolStats>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Job>) {
        while let Some(job) = rx.recv().await {
            self.execute(job).await;
        }
        self.executor.close().await;
        debug!(worker = self.id, "History worker stopped");
    }

    /// Execute `job` until it succeeds or retries are cancelled
    ///
    /// Returns true if the statement was applied.
    async fn execute(&mut self, job: Job) -> bool {
        trace!(worker = self.id, sql = %job.sql, "exec sql");
        loop {
            match self.executor.execute(&job.sql).await {
                Ok(()) => {
                    self.stats.executed.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(e) => {
                    self.stats.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    error!(
                        worker = self.id,
                        table = %job.key.table_name(),
                        rows = job.rows,
                        error = %e,
                        "exec sql fail"
                    );
                }
            }

            if *self.cancel.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.policy.backoff) => {}
                _ = cancelled(&mut self.cancel) => break,
            }
        }

        self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
        error!(
            worker = self.id,
            table = %job.key.table_name(),
            rows = job.rows,
            sql = %job.sql,
            "History batch abandoned on shutdown"
        );
        false
    }
}

/// Resolves once cancellation is requested; never if the pool is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
