//! Pending batch store
//!
//! One growing multi-row `INSERT` per [`BatchKey`]. Entries are created on
//! first append and removed whole by [`PendingSet::drain`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashMap;

use super::error::HistoryError;
use super::key::BatchKey;

/// Accumulated statement text for one key
#[derive(Debug, Default)]
pub struct Batch {
    sql: String,
    rows: usize,
}

impl Batch {
    /// Append one `(...)` row tuple
    ///
    /// The first row writes the `INSERT ... VALUES ` prefix; later rows are
    /// joined with `, `. A non-empty batch is always a complete statement.
    pub fn push_row(&mut self, key: &BatchKey, row: &str) {
        if self.sql.is_empty() {
            self.sql.push_str(&key.insert_prefix());
        } else {
            self.sql.push_str(", ");
        }
        self.sql.push_str(row);
        self.rows += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A drained batch, ready to become a job
#[derive(Debug)]
pub struct DrainedBatch {
    pub key: BatchKey,
    pub rows: usize,
    pub sql: String,
}

/// `BatchKey -> Batch`, at most one live batch per key
#[derive(Debug)]
pub struct PendingSet {
    batches: FxHashMap<BatchKey, Batch>,
}

impl PendingSet {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut batches = FxHashMap::default();
        batches.reserve(capacity);
        Self { batches }
    }

    /// Look up `key`, inserting an empty batch if absent
    #[inline]
    pub fn get_or_create(&mut self, key: BatchKey) -> &mut Batch {
        self.batches.entry(key).or_default()
    }

    pub fn get(&self, key: &BatchKey) -> Option<&Batch> {
        self.batches.get(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Remove every entry, returning the non-empty ones
    ///
    /// Ownership of each statement moves to the caller; the next append for
    /// a drained key starts a fresh statement.
    pub fn drain(&mut self) -> Vec<DrainedBatch> {
        self.batches
            .drain()
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(key, batch)| DrainedBatch {
                key,
                rows: batch.rows,
                sql: batch.sql,
            })
            .collect()
    }
}

impl Default for PendingSet {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

/// Pending set shared between the append path and the flush task
///
/// The lock is held for one row append or one whole drain pass.
#[derive(Debug)]
pub struct PendingStore {
    pending: Mutex<PendingSet>,
    shard_count: u32,
    stopped: AtomicBool,
}

impl PendingStore {
    pub fn new(shard_count: u32) -> Self {
        Self {
            pending: Mutex::new(PendingSet::default()),
            shard_count,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Buffer one row under `key`
    pub fn append(&self, key: BatchKey, row: &str) -> Result<(), HistoryError> {
        let mut pending = self.lock();
        // Checked under the lock: the final drain after stop() sees every accepted row
        if self.is_stopped() {
            return Err(HistoryError::Stopped);
        }
        pending.get_or_create(key).push_row(&key, row);
        Ok(())
    }

    /// Take every non-empty batch
    pub fn drain(&self) -> Vec<DrainedBatch> {
        self.lock().drain()
    }

    /// Number of keys currently buffered
    pub fn pending_keys(&self) -> usize {
        self.lock().len()
    }

    /// Reject further appends
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, PendingSet> {
        // push_row never leaves a partial tuple behind, so a poisoned set is still usable
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::key::RecordType;

    fn key(shard: u64) -> BatchKey {
        BatchKey::new(RecordType::OrderDeal, shard, 100)
    }

    #[test]
    fn test_get_or_create_is_lazy() {
        let mut set = PendingSet::default();
        assert!(set.get(&key(1)).is_none());

        let batch = set.get_or_create(key(1));
        assert!(batch.is_empty());
        assert_eq!(set.len(), 1);

        // Second lookup returns the same entry
        set.get_or_create(key(1)).push_row(&key(1), "(1)");
        assert_eq!(set.get_or_create(key(1)).rows(), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_rows_joined_in_order() {
        let mut set = PendingSet::default();
        let k = key(3);
        for row in ["(1)", "(2)", "(3)"] {
            set.get_or_create(k).push_row(&k, row);
        }

        let sql = set.get(&k).unwrap().sql();
        assert_eq!(sql, format!("{}(1), (2), (3)", k.insert_prefix()));
    }

    #[test]
    fn test_drain_removes_everything() {
        let mut set = PendingSet::default();
        set.get_or_create(key(1)).push_row(&key(1), "(1)");
        set.get_or_create(key(2)).push_row(&key(2), "(2)");
        // Created but never written
        set.get_or_create(key(3));

        let mut drained = set.drain();
        drained.sort_by_key(|d| d.key.shard);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].key, key(1));
        assert_eq!(drained[0].rows, 1);
        assert!(set.is_empty());

        // Nothing appended since: nothing drained
        assert!(set.drain().is_empty());
    }

    #[test]
    fn test_drained_key_restarts_with_prefix() {
        let mut set = PendingSet::default();
        let k = key(9);
        set.get_or_create(k).push_row(&k, "(1)");
        set.drain();

        set.get_or_create(k).push_row(&k, "(2)");
        let drained = set.drain();
        assert_eq!(drained[0].sql, format!("{}(2)", k.insert_prefix()));
    }

    #[test]
    fn test_store_rejects_after_stop() {
        let store = PendingStore::new(100);
        store.append(key(1), "(1)").unwrap();
        store.stop();
        assert!(matches!(
            store.append(key(1), "(2)"),
            Err(HistoryError::Stopped)
        ));

        // Rows buffered before the stop are still drained
        let drained = store.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].rows, 1);
    }
}
