//! Connect and disconnect protocols.
//!
//! Both run entirely inside the table's lock, so for any one table the
//! sequence "check, mutate, broadcast" of one call never interleaves with
//! another's. Game workers are only ever notified, never waited on, so the
//! lock is held for a bounded time regardless of what the game is doing.

use std::sync::Arc;

use cardroom_protocol::{
    Codec, ConnectionKind, JsonCodec, SubscriptionView, TableId, Username, WireMessage,
};
use cardroom_session::{Repository, Session};
use cardroom_table::{
    BroadcastDispatcher, GameRules, GameWorkerRegistry, TableMutexRegistry, WorkerConfig,
    WorkerHandle,
};

use crate::CardroomError;

/// Attaches participants to tables and detaches them again, keeping
/// sessions, game workers, and table broadcasts consistent.
pub struct ConnectionOrchestrator<G: GameRules, S: Repository, C: Codec = JsonCodec> {
    store: Arc<S>,
    locks: TableMutexRegistry,
    workers: GameWorkerRegistry<G, C>,
    dispatcher: Arc<BroadcastDispatcher<C>>,
}

impl<G: GameRules, S: Repository, C: Codec> ConnectionOrchestrator<G, S, C> {
    pub fn new(
        store: Arc<S>,
        dispatcher: Arc<BroadcastDispatcher<C>>,
        worker_config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            locks: TableMutexRegistry::new(),
            workers: GameWorkerRegistry::new(Arc::clone(&dispatcher), worker_config),
            dispatcher,
        }
    }

    /// Attaches `username` to `table_id` as `kind`.
    ///
    /// On success a `PLAYER_CONNECTED` broadcast has gone out to the table
    /// and the returned view lists every session at the table, the new one
    /// included. The view is meant for the caller only.
    ///
    /// # Errors
    /// - [`CardroomError::TableNotFound`] / [`CardroomError::ParticipantNotFound`]
    ///   if either lookup fails
    /// - [`CardroomError::AlreadyConnected`] if the participant already has a
    ///   session at this table
    ///
    /// None of these leave any state behind or broadcast anything. If the
    /// broadcast itself cannot be encoded, the session and any worker this
    /// call started are removed before the error is returned.
    pub async fn connect(
        &self,
        table_id: TableId,
        kind: ConnectionKind,
        username: &Username,
    ) -> Result<SubscriptionView, CardroomError> {
        self.locks
            .with_table_lock(table_id, || self.connect_locked(table_id, kind, username))
            .await
    }

    /// Detaches `username` from `table_id`.
    ///
    /// Stops the table's game worker if no other players remain, otherwise
    /// tells it the participant left. Then removes the session and
    /// broadcasts `PLAYER_DISCONNECTED`. Succeeds without broadcasting if
    /// there was no session to remove.
    ///
    /// # Errors
    /// Only if the broadcast cannot be encoded. The session is gone by then.
    pub async fn disconnect(&self, table_id: TableId, username: &Username) -> Result<(), CardroomError> {
        self.locks
            .with_table_lock(table_id, || self.disconnect_locked(table_id, username))
            .await
    }

    /// Broadcasts a chat line from `username` to everyone at `table_id`.
    ///
    /// Not a membership change, so the table lock is not taken.
    ///
    /// # Errors
    /// [`CardroomError::NotSubscribed`] if `username` has no session there.
    pub fn chat(&self, table_id: TableId, username: &Username, message: String) -> Result<(), CardroomError> {
        if self.store.find_session(table_id, username).is_none() {
            return Err(CardroomError::NotSubscribed);
        }
        self.dispatcher.publish(
            table_id,
            WireMessage::Chat {
                username: Some(username.clone()),
                message,
            },
        )?;
        Ok(())
    }

    /// The live game worker for `table_id`, if any.
    pub fn worker(&self, table_id: TableId) -> Option<WorkerHandle> {
        self.workers.lookup(table_id)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn connect_locked(
        &self,
        table_id: TableId,
        kind: ConnectionKind,
        username: &Username,
    ) -> Result<SubscriptionView, CardroomError> {
        let table = self
            .store
            .find_table(table_id)
            .ok_or(CardroomError::TableNotFound(table_id))?;
        let participant = self
            .store
            .find_participant(username)
            .ok_or_else(|| CardroomError::ParticipantNotFound(username.clone()))?;
        if self.store.find_session(table_id, username).is_some() {
            return Err(CardroomError::AlreadyConnected {
                table_id,
                username: username.clone(),
            });
        }

        let started_worker = kind.is_player() && self.workers.create_if_absent(&table);
        if started_worker && !self.store.players_excluding(table_id, username).is_empty() {
            tracing::warn!(%table_id, "players were seated without a live game worker, replaced");
        }

        let session = match self.store.create_session(&table, &participant, kind) {
            Ok(session) => session,
            Err(e) => {
                if started_worker {
                    self.workers.remove(table_id);
                }
                return Err(e.into());
            }
        };

        let view = SubscriptionView {
            table_id,
            sessions: self.store.sessions_at(table_id).iter().map(Session::view).collect(),
        };

        let announced = self.dispatcher.publish(
            table_id,
            WireMessage::PlayerConnected {
                session: session.view(),
            },
        );
        if let Err(e) = announced {
            tracing::error!(%table_id, %username, error = %e, "connect broadcast failed, rolling back");
            self.store.remove_session(table_id, username);
            if started_worker {
                self.workers.remove(table_id);
            }
            return Err(e.into());
        }

        if kind.is_player() {
            if let Some(worker) = self.workers.lookup(table_id) {
                // A fresh worker may be replacing one that stopped with
                // players still seated. It has to learn about all of them.
                let arrivals = if started_worker {
                    self.store
                        .sessions_at(table_id)
                        .into_iter()
                        .filter(Session::is_player)
                        .map(|s| s.username)
                        .collect()
                } else {
                    vec![username.clone()]
                };
                for player in arrivals {
                    if let Err(e) = worker.on_player_connected(player.clone()) {
                        tracing::warn!(%table_id, username = %player, error = %e, "worker not notified of connect");
                    }
                }
            }
        }

        tracing::info!(
            %table_id,
            %username,
            %kind,
            members = view.sessions.len(),
            "participant connected"
        );
        Ok(view)
    }

    fn disconnect_locked(&self, table_id: TableId, username: &Username) -> Result<(), CardroomError> {
        let session = self.store.find_session(table_id, username);
        let worker = self.workers.lookup(table_id);
        let remaining = self.store.players_excluding(table_id, username);

        if remaining.is_empty() {
            if self.workers.remove(table_id) {
                tracing::info!(%table_id, "no players left, game worker removed");
            }
        } else if let (Some(worker), Some(_)) = (&worker, &session) {
            if let Err(e) = worker.on_player_disconnected(username.clone()) {
                tracing::warn!(%table_id, %username, error = %e, "worker not notified of disconnect");
            }
        }

        let Some(session) = session else {
            tracing::debug!(%table_id, %username, "no session to disconnect");
            return Ok(());
        };

        self.store.remove_session(table_id, username);
        self.dispatcher.publish(
            table_id,
            WireMessage::PlayerDisconnected {
                username: username.clone(),
            },
        )?;

        tracing::info!(%table_id, %username, kind = %session.kind, "participant disconnected");
        Ok(())
    }
}
