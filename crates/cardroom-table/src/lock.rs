//! Per-table mutual exclusion.
//!
//! Each table id maps to its own async mutex. Bodies for the same table run
//! strictly one after another (Tokio's mutex is FIFO-fair); bodies for
//! different tables never contend. Lock objects are created on first use
//! and held only weakly by the registry, so a table nobody is touching
//! costs one dead map slot until the next prune.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use cardroom_protocol::TableId;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Dead entries are first swept once the map grows past this many slots.
const PRUNE_THRESHOLD: usize = 128;

/// Issues one critical section per table id.
pub struct TableMutexRegistry {
    locks: DashMap<TableId, Weak<Mutex<()>>>,
    /// Map size that triggers the next sweep: twice what survived the last
    /// one, never below [`PRUNE_THRESHOLD`].
    prune_at: AtomicUsize,
}

impl Default for TableMutexRegistry {
    fn default() -> Self {
        Self {
            locks: DashMap::new(),
            prune_at: AtomicUsize::new(PRUNE_THRESHOLD),
        }
    }
}

/// Exclusive ownership of one table's critical section. Released on drop,
/// including when the holder unwinds from a panic.
pub struct TableGuard {
    table_id: TableId,
    _guard: OwnedMutexGuard<()>,
}

impl TableGuard {
    pub fn table_id(&self) -> TableId {
        self.table_id
    }
}

impl TableMutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive ownership of `table_id`'s critical section.
    ///
    /// No timeout: a holder that never releases is a bug, not a condition
    /// callers are expected to handle.
    pub async fn lock(&self, table_id: TableId) -> TableGuard {
        let lock = self.handle(table_id);
        let guard = lock.lock_owned().await;
        tracing::trace!(%table_id, "table lock acquired");
        TableGuard {
            table_id,
            _guard: guard,
        }
    }

    /// Runs `f` while holding `table_id`'s lock and returns its result.
    ///
    /// Errors returned by `f` pass straight through; the lock is released
    /// either way.
    pub async fn with_table_lock<R>(&self, table_id: TableId, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock(table_id).await;
        f()
    }

    /// Drops map slots whose lock is no longer referenced by anyone.
    pub fn prune(&self) {
        self.locks.retain(|_, lock| lock.strong_count() > 0);
        let next = (self.locks.len() * 2).max(PRUNE_THRESHOLD);
        self.prune_at.store(next, Ordering::Relaxed);
        tracing::trace!(tracked = self.locks.len(), next, "table locks pruned");
    }

    /// Number of map slots, live or dead.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }

    /// Returns the live lock for `table_id`, creating it if needed. The
    /// map shard stays locked between the lookup and the insert, so two
    /// callers can never end up holding different locks for one table.
    fn handle(&self, table_id: TableId) -> Arc<Mutex<()>> {
        if self.locks.len() > self.prune_at.load(Ordering::Relaxed) {
            self.prune();
        }

        let mut slot = self.locks.entry(table_id).or_default();
        if let Some(lock) = slot.upgrade() {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        *slot = Arc::downgrade(&lock);
        lock
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_with_table_lock_returns_body_result() {
        let locks = TableMutexRegistry::new();
        let out = locks.with_table_lock(TableId::new(), || 7).await;
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn test_error_from_body_propagates_and_releases() {
        let locks = TableMutexRegistry::new();
        let id = TableId::new();

        let result: Result<(), &str> = locks.with_table_lock(id, || Err("boom")).await;
        assert_eq!(result, Err("boom"));

        // Would hang if the first call had leaked the lock.
        tokio::time::timeout(Duration::from_secs(1), locks.lock(id))
            .await
            .expect("lock should be free again");
    }

    #[tokio::test]
    async fn test_same_table_bodies_never_overlap() {
        let locks = Arc::new(TableMutexRegistry::new());
        let id = TableId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_tables_do_not_block_each_other() {
        let locks = TableMutexRegistry::new();
        let _held = locks.lock(TableId::new()).await;

        tokio::time::timeout(Duration::from_secs(1), locks.lock(TableId::new()))
            .await
            .expect("a different table must be lockable while another is held");
    }

    #[tokio::test]
    async fn test_guard_reports_its_table() {
        let locks = TableMutexRegistry::new();
        let id = TableId::new();
        assert_eq!(locks.lock(id).await.table_id(), id);
    }

    #[tokio::test]
    async fn test_panicking_body_releases_lock() {
        let locks = Arc::new(TableMutexRegistry::new());
        let id = TableId::new();

        let task = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                locks
                    .with_table_lock(id, || {
                        panic!("body failed");
                    })
                    .await
            })
        };
        assert!(task.await.is_err());

        tokio::time::timeout(Duration::from_secs(1), locks.lock(id))
            .await
            .expect("lock should be released after the panic");
    }

    #[tokio::test]
    async fn test_unreferenced_locks_are_pruned() {
        let locks = TableMutexRegistry::new();
        for _ in 0..10 {
            let _guard = locks.lock(TableId::new()).await;
        }
        assert_eq!(locks.tracked(), 10);

        locks.prune();

        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn test_held_lock_survives_prune() {
        let locks = TableMutexRegistry::new();
        let id = TableId::new();
        let _held = locks.lock(id).await;

        locks.prune();

        assert_eq!(locks.tracked(), 1);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), locks.lock(id))
                .await
                .is_err(),
            "pruning must not hand out a second lock for a held table"
        );
    }

    #[tokio::test]
    async fn test_live_locks_do_not_trigger_a_sweep_per_acquire() {
        let locks = TableMutexRegistry::new();
        let mut held = Vec::new();
        for _ in 0..=PRUNE_THRESHOLD {
            held.push(locks.lock(TableId::new()).await);
        }

        // Crossing the threshold sweeps once; every slot is live and stays.
        held.push(locks.lock(TableId::new()).await);
        let mark = 2 * (PRUNE_THRESHOLD + 1);
        assert_eq!(locks.prune_at.load(Ordering::Relaxed), mark);

        for _ in 0..50 {
            held.push(locks.lock(TableId::new()).await);
        }
        assert_eq!(locks.prune_at.load(Ordering::Relaxed), mark);

        // Released slots linger until the map passes the mark again.
        let total = held.len();
        drop(held);
        let _guard = locks.lock(TableId::new()).await;
        assert_eq!(locks.tracked(), total + 1);
    }

    #[tokio::test]
    async fn test_sweep_resets_mark_to_threshold_when_map_empties() {
        let locks = TableMutexRegistry::new();
        for _ in 0..=PRUNE_THRESHOLD + 1 {
            let _guard = locks.lock(TableId::new()).await;
        }
        locks.prune();
        assert_eq!(locks.tracked(), 0);
        assert_eq!(locks.prune_at.load(Ordering::Relaxed), PRUNE_THRESHOLD);
    }
}
