//! Game worker: an isolated Tokio task that drives one table's game.
//!
//! The worker owns the game state outright. The outside world talks to it
//! through a [`WorkerHandle`]: notifications go in over a bounded mpsc
//! channel and never wait for the worker, while the lifecycle is published
//! on a `watch` channel that both sides can read.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use cardroom_protocol::{Codec, TableId, Username, WireMessage};
use cardroom_session::Table;
use rand::Rng;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::{BroadcastDispatcher, GameRules, WorkerConfig, WorkerError, WorkerState};

/// Notifications the orchestrator hands to a worker.
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    PlayerConnected(Username),
    PlayerDisconnected(Username),
}

/// Handle to a game worker. Cheap to clone.
///
/// Every method returns immediately; none of them wait on the worker's
/// own progress, so they are safe to call while holding the table lock.
#[derive(Clone)]
pub struct WorkerHandle {
    table_id: TableId,
    commands: mpsc::Sender<WorkerCommand>,
    lifecycle: Arc<watch::Sender<WorkerState>>,
}

impl WorkerHandle {
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.lifecycle.borrow()
    }

    /// `true` until a stop has been signalled.
    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Queues a "player connected" notification.
    ///
    /// # Errors
    /// [`WorkerError::Stopped`] once the worker is stopping, or
    /// [`WorkerError::Backlogged`] if its queue is full.
    pub fn on_player_connected(&self, username: Username) -> Result<(), WorkerError> {
        self.notify(WorkerCommand::PlayerConnected(username))
    }

    /// Queues a "player disconnected" notification.
    ///
    /// # Errors
    /// Same as [`on_player_connected`](Self::on_player_connected).
    pub fn on_player_disconnected(&self, username: Username) -> Result<(), WorkerError> {
        self.notify(WorkerCommand::PlayerDisconnected(username))
    }

    /// Signals the worker to stop and returns without waiting for it.
    ///
    /// Returns `false` if a stop had already been signalled. Notifications
    /// are refused from the moment this returns.
    pub fn stop(&self) -> bool {
        let signalled = begin_stop(&self.lifecycle);
        if signalled {
            tracing::info!(table_id = %self.table_id, "game worker stopping");
        }
        signalled
    }

    /// Resolves once the worker task has exited.
    pub async fn stopped(&self) {
        let mut rx = self.lifecycle.subscribe();
        let _ = rx.wait_for(|state| *state == WorkerState::Stopped).await;
    }

    fn notify(&self, command: WorkerCommand) -> Result<(), WorkerError> {
        if !self.is_live() {
            return Err(WorkerError::Stopped(self.table_id));
        }
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(dropped) => {
                tracing::warn!(
                    table_id = %self.table_id,
                    command = ?dropped,
                    "game worker backlogged, notification dropped"
                );
                WorkerError::Backlogged(self.table_id)
            }
            TrySendError::Closed(_) => WorkerError::Stopped(self.table_id),
        })
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("table_id", &self.table_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Moves a live worker to Stopping. Returns `false` if it was not live.
fn begin_stop(lifecycle: &watch::Sender<WorkerState>) -> bool {
    lifecycle.send_if_modified(|state| {
        if state.can_transition_to(WorkerState::Stopping) {
            *state = WorkerState::Stopping;
            true
        } else {
            false
        }
    })
}

/// Marks the worker Stopped when its task ends, however it ends.
struct StopOnExit {
    table_id: TableId,
    lifecycle: Arc<watch::Sender<WorkerState>>,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        begin_stop(&self.lifecycle);
        self.lifecycle.send_if_modified(|state| {
            let stopping = state.can_transition_to(WorkerState::Stopped);
            if stopping {
                *state = WorkerState::Stopped;
            }
            stopping
        });
        tracing::info!(table_id = %self.table_id, "game worker stopped");
    }
}

/// The worker's task-side state.
struct GameWorker<G, C: Codec> {
    table: Table,
    commands: mpsc::Receiver<WorkerCommand>,
    lifecycle: Arc<watch::Sender<WorkerState>>,
    dispatcher: Arc<BroadcastDispatcher<C>>,
    /// First step deadline and period, or `None` when event-driven.
    schedule: Option<(Instant, Duration)>,
    _rules: PhantomData<fn() -> G>,
}

impl<G: GameRules, C: Codec> GameWorker<G, C> {
    async fn run(mut self) {
        let table_id = self.table.id;
        let _exit = StopOnExit {
            table_id,
            lifecycle: Arc::clone(&self.lifecycle),
        };

        // A stop signalled before the task was first polled wins.
        let started = self.lifecycle.send_if_modified(|state| {
            if state.can_transition_to(WorkerState::Running) {
                *state = WorkerState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return;
        }
        tracing::info!(%table_id, table = %self.table.name, "game worker running");

        let mut game = G::init(&self.table);
        let mut steps = self.schedule.map(|(start, period)| {
            let mut steps = time::interval_at(start, period);
            steps.set_missed_tick_behavior(MissedTickBehavior::Skip);
            steps
        });
        let mut stop_rx = self.lifecycle.subscribe();

        loop {
            tokio::select! {
                biased;

                () = stop_requested(&mut stop_rx) => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle(&mut game, command),
                    None => break,
                },

                () = next_step(&mut steps) => match G::step(&mut game) {
                    Ok(messages) => self.publish_all(messages),
                    Err(reason) => {
                        tracing::error!(%table_id, %reason, "game step failed, stopping worker");
                        begin_stop(&self.lifecycle);
                        break;
                    }
                },
            }
        }
    }

    fn handle(&self, game: &mut G::State, command: WorkerCommand) {
        tracing::debug!(table_id = %self.table.id, ?command, "worker notification");
        let messages = match &command {
            WorkerCommand::PlayerConnected(username) => G::on_player_connected(game, username),
            WorkerCommand::PlayerDisconnected(username) => {
                G::on_player_disconnected(game, username)
            }
        };
        self.publish_all(messages);
    }

    fn publish_all(&self, messages: Vec<WireMessage>) {
        for message in messages {
            if let Err(e) = self.dispatcher.publish(self.table.id, message) {
                tracing::error!(table_id = %self.table.id, error = %e, "dropping unencodable game output");
            }
        }
    }
}

async fn stop_requested(rx: &mut watch::Receiver<WorkerState>) {
    // The worker itself holds the sender, so this only resolves on a stop.
    let _ = rx.wait_for(|state| state.is_stopping()).await;
}

async fn next_step(steps: &mut Option<Interval>) {
    match steps {
        Some(steps) => {
            steps.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Spawns a worker task for `table` and returns its handle in the Created
/// state. Must be called from within a Tokio runtime.
pub(crate) fn spawn_worker<G: GameRules, C: Codec>(
    table: Table,
    config: &WorkerConfig,
    dispatcher: Arc<BroadcastDispatcher<C>>,
) -> WorkerHandle {
    let table_id = table.id;
    let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
    let (lifecycle, _) = watch::channel(WorkerState::Created);
    let lifecycle = Arc::new(lifecycle);

    let schedule = config.step_period().map(|period| {
        let max_us = config.initial_jitter.as_micros() as u64;
        let jitter = if max_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..max_us))
        } else {
            Duration::ZERO
        };
        (Instant::now() + period + jitter, period)
    });

    let worker = GameWorker::<G, C> {
        table,
        commands: rx,
        lifecycle: Arc::clone(&lifecycle),
        dispatcher,
        schedule,
        _rules: PhantomData,
    };
    tokio::spawn(worker.run());

    tracing::info!(%table_id, "game worker created");
    WorkerHandle {
        table_id,
        commands: tx,
        lifecycle,
    }
}

#[cfg(test)]
mod tests {
    use cardroom_protocol::{Envelope, JsonCodec, table_topic};
    use cardroom_transport::{TopicHub, TopicReceiver};

    use super::*;

    /// Logs every hook call; tables named "doomed" fail their first step.
    struct Scripted;

    impl GameRules for Scripted {
        type State = (String, u32);

        fn init(table: &Table) -> Self::State {
            (table.name.clone(), 0)
        }

        fn on_player_connected(_: &mut Self::State, username: &Username) -> Vec<WireMessage> {
            vec![log(format!("joined {username}"))]
        }

        fn on_player_disconnected(_: &mut Self::State, username: &Username) -> Vec<WireMessage> {
            vec![log(format!("left {username}"))]
        }

        fn step(state: &mut Self::State) -> Result<Vec<WireMessage>, String> {
            if state.0 == "doomed" {
                return Err("deck exhausted".into());
            }
            state.1 += 1;
            Ok(vec![log(format!("step {}", state.1))])
        }
    }

    fn log(message: String) -> WireMessage {
        WireMessage::Log { message }
    }

    fn start(name: &str, config: WorkerConfig) -> (WorkerHandle, TopicReceiver) {
        let hub = Arc::new(TopicHub::new());
        let table = Table::new(name);
        let rx = hub.subscribe(&table_topic(table.id));
        let dispatcher = Arc::new(BroadcastDispatcher::json(hub));
        (spawn_worker::<Scripted, _>(table, &config, dispatcher), rx)
    }

    async fn next_log(rx: &mut TopicReceiver) -> String {
        let bytes = rx.recv().await.unwrap();
        match JsonCodec.decode::<Envelope>(&bytes).unwrap().message {
            WireMessage::Log { message } => message,
            other => panic!("expected a log line, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_new_worker_starts_created_then_runs() {
        let (worker, mut rx) = start("main", WorkerConfig::default());
        assert_eq!(worker.state(), WorkerState::Created);

        worker.on_player_connected("alice".into()).unwrap();

        assert_eq!(next_log(&mut rx).await, "joined alice");
        assert_eq!(worker.state(), WorkerState::Running);
    }

    #[tokio::test]
    async fn test_notifications_are_handled_in_order() {
        let (worker, mut rx) = start("main", WorkerConfig::default());

        worker.on_player_connected("alice".into()).unwrap();
        worker.on_player_connected("bob".into()).unwrap();
        worker.on_player_disconnected("alice".into()).unwrap();

        assert_eq!(next_log(&mut rx).await, "joined alice");
        assert_eq!(next_log(&mut rx).await, "joined bob");
        assert_eq!(next_log(&mut rx).await, "left alice");
    }

    #[tokio::test]
    async fn test_stop_is_signalled_once_and_worker_exits() {
        let (worker, mut rx) = start("main", WorkerConfig::default());
        worker.on_player_connected("alice".into()).unwrap();
        next_log(&mut rx).await;

        assert!(worker.stop());
        assert!(!worker.stop());
        assert_eq!(worker.state(), WorkerState::Stopping);

        worker.stopped().await;
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_notify_after_stop_is_refused() {
        let (worker, _rx) = start("main", WorkerConfig::default());
        worker.stop();

        let result = worker.on_player_connected("alice".into());

        assert!(matches!(result, Err(WorkerError::Stopped(id)) if id == worker.table_id()));
    }

    #[tokio::test]
    async fn test_stop_before_first_poll_never_runs() {
        let (worker, _rx) = start("main", WorkerConfig::default());

        assert!(worker.stop());
        worker.stopped().await;

        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn test_full_queue_reports_backlog() {
        let config = WorkerConfig {
            command_capacity: 1,
            ..WorkerConfig::default()
        };
        // Single-threaded runtime: the worker task cannot drain the queue
        // until this test yields.
        let (worker, _rx) = start("main", config);

        worker.on_player_connected("alice".into()).unwrap();
        let result = worker.on_player_connected("bob".into());

        assert!(matches!(result, Err(WorkerError::Backlogged(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stepping_worker_publishes_each_step() {
        let (worker, mut rx) = start("main", WorkerConfig::stepping_every(Duration::from_secs(1)));

        assert_eq!(next_log(&mut rx).await, "step 1");
        assert_eq!(next_log(&mut rx).await, "step 2");
        assert_eq!(worker.state(), WorkerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_driven_worker_never_steps() {
        let (_worker, mut rx) = start("main", WorkerConfig::default());

        time::sleep(Duration::from_secs(60)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_stops_worker() {
        let (worker, _rx) = start("doomed", WorkerConfig::stepping_every(Duration::from_secs(1)));

        time::timeout(Duration::from_secs(5), worker.stopped())
            .await
            .expect("worker should stop itself after a failed step");

        assert!(matches!(
            worker.on_player_connected("alice".into()),
            Err(WorkerError::Stopped(_))
        ));
    }

    #[tokio::test]
    async fn test_dropping_every_handle_ends_the_task() {
        let (worker, _rx) = start("main", WorkerConfig::default());
        let mut lifecycle = worker.lifecycle.subscribe();
        drop(worker);

        let _ = lifecycle
            .wait_for(|state| *state == WorkerState::Stopped)
            .await;
        assert_eq!(*lifecycle.borrow(), WorkerState::Stopped);
    }
}
