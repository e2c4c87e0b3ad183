//! Per-path mutation locks.
//!
//! Every mutation of a secret (write, delete, undelete, destroy, metadata
//! update) holds that path's lock from the moment it reads the current
//! metadata until it has committed the new metadata. Operations on different
//! paths never contend. Entries are removed from the table once the last
//! holder or waiter is gone, so the table only tracks paths in use.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

type LockTable = Arc<SyncMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// Table of per-path async mutexes.
#[derive(Debug, Default, Clone)]
pub struct PathLocks {
    table: LockTable,
}

impl PathLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the exclusive lock for `path`, waiting for any current holder.
    pub async fn lock(&self, path: &str) -> PathGuard {
        let mutex = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(path.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        PathGuard {
            guard: Some(guard),
            key: path.to_string(),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of paths currently locked or waited on.
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

/// Holds one path's lock until dropped.
#[derive(Debug)]
pub struct PathGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    table: LockTable,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut table = self.table.lock();
        // Only the table's own reference left: no holder, no waiter.
        if let Some(entry) = table.get(&self.key)
            && Arc::strong_count(entry) == 1
        {
            table.remove(&self.key);
        }
    }
}
