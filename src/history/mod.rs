//! Ledger History Writer
//!
//! Buffers order, deal and balance history in memory and writes it to the
//! sharded MySQL history tables in batches, off the engine thread.
//!
//! # Data flow
//!
//! ```text
//! engine thread                     tokio runtime
//! -------------                     -------------
//! HistoryWriter::append_*  --->  PendingStore  --(100ms tick)-->  FlushScheduler
//!                                                                     |
//!                                             one job per (type, shard) per tick
//!                                                                     v
//!                                  ExecutionPool: N workers, 1 connection each,
//!                                  retry with fixed backoff until success
//! ```
//!
//! Appends return as soon as the row is buffered. A batch accepted by the
//! pool is retried until it is written; only shutdown cancellation past the
//! grace period can abandon it, and that is logged with the full statement.

pub mod error;
pub mod executor;
pub mod flusher;
pub mod format;
pub mod key;
pub mod pool;
pub mod store;
pub mod writer;

pub use error::HistoryError;
pub use executor::{MySqlExecutor, SqlExecutor};
pub use flusher::FlushScheduler;
pub use format::{escape_text, format_decimal};
pub use key::{BatchKey, RecordType};
pub use pool::{ExecutionPool, Job, PoolStatsSnapshot, RetryPolicy};
pub use store::{PendingSet, PendingStore};
pub use writer::HistoryWriter;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::HistoryConfig;

/// Running history service: pending store, flush task and execution pool
pub struct HistoryService {
    store: Arc<PendingStore>,
    flusher: FlushScheduler,
    flush_task: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
    pool: ExecutionPool,
}

impl HistoryService {
    /// Start the service on the current tokio runtime
    ///
    /// `executors` are the already-connected worker sessions, one per worker
    /// (see [`MySqlExecutor::connect_many`]).
    pub fn start(
        config: &HistoryConfig,
        executors: Vec<Box<dyn SqlExecutor>>,
    ) -> Result<Self, HistoryError> {
        config.validate().map_err(HistoryError::Config)?;

        let store = Arc::new(PendingStore::new(config.shard_count));
        let pool = ExecutionPool::start(
            executors,
            RetryPolicy {
                backoff: config.retry_backoff(),
            },
            config.queue_capacity,
        )?;
        let flusher = FlushScheduler::new(store.clone(), pool.submitter(), config.flush_interval());
        let (stop_tx, stop_rx) = watch::channel(false);
        let flush_task = tokio::spawn(flusher.clone().run(stop_rx));

        info!(
            shards = config.shard_count,
            workers = pool.worker_count(),
            "History service started"
        );

        Ok(Self {
            store,
            flusher,
            flush_task,
            stop_tx,
            pool,
        })
    }

    /// Connect `config.worker_count` MySQL sessions and start
    pub async fn connect(config: &HistoryConfig) -> Result<Self, HistoryError> {
        config.validate().map_err(HistoryError::Config)?;
        let executors = MySqlExecutor::connect_many(&config.db, config.worker_count).await?;
        Self::start(config, executors)
    }

    /// Append handle for the engine thread
    pub fn writer(&self) -> HistoryWriter {
        HistoryWriter::new(self.store.clone())
    }

    /// Run one drain pass now instead of waiting for the next tick
    pub async fn flush_now(&self) -> usize {
        self.flusher.flush_once().await
    }

    /// Keys with rows not yet drained
    pub fn pending_keys(&self) -> usize {
        self.store.pending_keys()
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.pool.stats()
    }

    /// Stop accepting rows, flush what is buffered and stop the pool
    ///
    /// Everything gets `grace` to reach the database with normal retry. Past
    /// that deadline retries are cancelled, which also releases a final flush
    /// stuck behind full worker queues.
    pub async fn shutdown(self, grace: Duration) -> PoolStatsSnapshot {
        let HistoryService {
            store,
            flusher,
            mut flush_task,
            stop_tx,
            pool,
        } = self;
        let deadline = Instant::now() + grace;

        store.stop();
        let _ = stop_tx.send(true);
        let flushed = match tokio::time::timeout(grace, &mut flush_task).await {
            Ok(res) => res,
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "History final flush still blocked after grace period"
                );
                pool.cancel_retries();
                flush_task.await
            }
        };
        if let Err(e) = flushed {
            error!("History flush task panicked: {}", e);
        }
        // Last submitter clone; the pool closes its queues once this is gone
        drop(flusher);

        pool.shutdown(deadline.saturating_duration_since(Instant::now()))
            .await
    }
}
