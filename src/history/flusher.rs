//! Flush scheduler
//!
//! Drains the pending set on a fixed period and hands each non-empty batch to
//! the execution pool as one job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::pool::{Job, JobSubmitter};
use super::store::PendingStore;

#[derive(Clone)]
pub struct FlushScheduler {
    store: Arc<PendingStore>,
    submitter: JobSubmitter,
    interval: Duration,
    // One drain-and-submit pass at a time, so a key's jobs enqueue in drain order
    pass: Arc<AsyncMutex<()>>,
}

impl FlushScheduler {
    pub fn new(store: Arc<PendingStore>, submitter: JobSubmitter, interval: Duration) -> Self {
        Self {
            store,
            submitter,
            interval,
            pass: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Drain every pending batch and submit it; returns the job count
    pub async fn flush_once(&self) -> usize {
        let _pass = self.pass.lock().await;
        let batches = self.store.drain();
        let mut count = 0;

        for batch in batches {
            let rows = batch.rows;
            let table = batch.key.table_name();
            match self.submitter.submit(Job::from(batch)).await {
                Ok(()) => count += 1,
                Err(e) => error!(table = %table, rows, error = %e, "Failed to submit history batch"),
            }
        }

        if count > 0 {
            debug!(queued = self.submitter.queued(), "flush history count: {}", count);
        }
        count
    }

    /// Tick until `shutdown` turns true, then run one final pass
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "History flush scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                dropped = async { shutdown.wait_for(|stop| *stop).await.is_err() } => {
                    if dropped {
                        debug!("History flush shutdown handle dropped");
                    }
                    break;
                }
            }
        }

        let last = self.flush_once().await;
        info!(jobs = last, "History flush scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::error::HistoryError;
    use crate::history::executor::SqlExecutor;
    use crate::history::key::{BatchKey, RecordType};
    use crate::history::pool::{ExecutionPool, RetryPolicy};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl SqlExecutor for Recorder {
        async fn execute(&mut self, sql: &str) -> Result<(), HistoryError> {
            self.0.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        async fn close(self: Box<Self>) {}
    }

    #[tokio::test]
    async fn test_flush_once_one_job_per_key() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let pool = ExecutionPool::start(
            vec![Box::new(Recorder(applied.clone())) as Box<dyn SqlExecutor>],
            RetryPolicy::default(),
            16,
        )
        .unwrap();
        let store = Arc::new(PendingStore::new(100));
        let flusher = FlushScheduler::new(store.clone(), pool.submitter(), Duration::from_millis(100));

        let a = BatchKey::new(RecordType::UserBalance, 1, 100);
        let b = BatchKey::new(RecordType::UserBalance, 2, 100);
        store.append(a, "(1)").unwrap();
        store.append(a, "(2)").unwrap();
        store.append(b, "(3)").unwrap();

        assert_eq!(flusher.flush_once().await, 2);
        // Nothing appended since the last pass
        assert_eq!(flusher.flush_once().await, 0);

        drop(flusher);
        let stats = pool.shutdown(Duration::from_secs(5)).await;
        assert_eq!(stats.executed, 2);

        let mut applied = applied.lock().unwrap().clone();
        applied.sort();
        assert_eq!(
            applied,
            vec![
                format!("{}(1), (2)", a.insert_prefix()),
                format!("{}(3)", b.insert_prefix()),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_flushes_on_shutdown() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let pool = ExecutionPool::start(
            vec![Box::new(Recorder(applied.clone())) as Box<dyn SqlExecutor>],
            RetryPolicy::default(),
            16,
        )
        .unwrap();
        let store = Arc::new(PendingStore::new(100));
        let flusher = FlushScheduler::new(store.clone(), pool.submitter(), Duration::from_secs(3600));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(flusher.run(stop_rx));

        // Let the immediate first tick pass before appending
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.append(BatchKey::new(RecordType::OrderDeal, 5, 100), "(9)").unwrap();

        stop_tx.send(true).unwrap();
        task.await.unwrap();
        pool.shutdown(Duration::from_secs(5)).await;

        assert_eq!(applied.lock().unwrap().len(), 1);
    }
}
