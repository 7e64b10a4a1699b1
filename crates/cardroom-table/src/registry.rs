//! Registry of live game workers, at most one per table.

use std::marker::PhantomData;
use std::sync::Arc;

use cardroom_protocol::{Codec, JsonCodec, TableId};
use cardroom_session::Table;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::worker::spawn_worker;
use crate::{BroadcastDispatcher, GameRules, WorkerConfig, WorkerHandle};

/// Creates, finds, and stops game workers.
///
/// Does no table locking of its own. Callers mutate a table's entry only
/// while holding that table's lock from
/// [`TableMutexRegistry`](crate::TableMutexRegistry).
pub struct GameWorkerRegistry<G: GameRules, C: Codec = JsonCodec> {
    workers: DashMap<TableId, WorkerHandle>,
    dispatcher: Arc<BroadcastDispatcher<C>>,
    config: WorkerConfig,
    _rules: PhantomData<fn() -> G>,
}

impl<G: GameRules, C: Codec> GameWorkerRegistry<G, C> {
    pub fn new(dispatcher: Arc<BroadcastDispatcher<C>>, config: WorkerConfig) -> Self {
        Self {
            workers: DashMap::new(),
            dispatcher,
            config,
            _rules: PhantomData,
        }
    }

    /// Starts a worker for `table` unless a live one already exists.
    ///
    /// A worker that stopped on its own (a failed step) is replaced.
    /// Returns `true` if this call started a worker.
    pub fn create_if_absent(&self, table: &Table) -> bool {
        match self.workers.entry(table.id) {
            Entry::Occupied(entry) if entry.get().is_live() => false,
            Entry::Occupied(mut entry) => {
                tracing::debug!(table_id = %table.id, "replacing stopped game worker");
                entry.insert(self.spawn(table));
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(self.spawn(table));
                true
            }
        }
    }

    /// The live worker for `table_id`, if any.
    pub fn lookup(&self, table_id: TableId) -> Option<WorkerHandle> {
        self.workers
            .get(&table_id)
            .filter(|worker| worker.is_live())
            .map(|worker| worker.value().clone())
    }

    /// Signals `table_id`'s worker to stop and forgets it. Does not wait for
    /// the task to exit. Returns `false` if there was no worker.
    pub fn remove(&self, table_id: TableId) -> bool {
        match self.workers.remove(&table_id) {
            Some((_, worker)) => {
                worker.stop();
                true
            }
            None => false,
        }
    }

    /// Number of tables with a live worker.
    pub fn live_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_live()).count()
    }

    /// Tables that currently have a live worker.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.workers
            .iter()
            .filter(|w| w.is_live())
            .map(|w| *w.key())
            .collect()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn spawn(&self, table: &Table) -> WorkerHandle {
        spawn_worker::<G, C>(table.clone(), &self.config, Arc::clone(&self.dispatcher))
    }
}
