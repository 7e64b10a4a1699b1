//! Storage seams the orchestrator consumes.
//!
//! Every method is synchronous. Implementations must be safe to share
//! between tasks, but they are not expected to make multi-call sequences
//! atomic; that is the table lock's job.

use cardroom_protocol::{ConnectionKind, TableId, Username};

use crate::{Participant, Session, SessionError, Table};

/// Lookup of tables by id.
pub trait TableStore: Send + Sync + 'static {
    fn find_table(&self, table_id: TableId) -> Option<Table>;
}

/// Lookup of participants by username.
pub trait ParticipantStore: Send + Sync + 'static {
    fn find_participant(&self, username: &Username) -> Option<Participant>;
}

/// Live session bookkeeping.
pub trait SessionStore: Send + Sync + 'static {
    /// The live session for `(table_id, username)`, if any.
    fn find_session(&self, table_id: TableId, username: &Username) -> Option<Session>;

    /// Creates a session, assigning seat and dealer flag as the store sees fit.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if a session for the pair exists.
    fn create_session(
        &self,
        table: &Table,
        participant: &Participant,
        kind: ConnectionKind,
    ) -> Result<Session, SessionError>;

    /// Removes the session for `(table_id, username)`, returning it if it
    /// existed. Removing an absent session is not an error.
    fn remove_session(&self, table_id: TableId, username: &Username) -> Option<Session>;

    /// Every live session at the table, in join order.
    fn sessions_at(&self, table_id: TableId) -> Vec<Session>;

    /// Live player sessions at the table other than `username`'s.
    fn players_excluding(&self, table_id: TableId, username: &Username) -> Vec<Session> {
        self.sessions_at(table_id)
            .into_iter()
            .filter(|s| s.is_player() && &s.username != username)
            .collect()
    }
}

/// Convenience bound for a single backend serving all three seams.
pub trait Repository: TableStore + ParticipantStore + SessionStore {}

impl<T: TableStore + ParticipantStore + SessionStore> Repository for T {}
