//! In-memory implementation of every storage seam.
//!
//! Used by the demo server and the test suites. Data lives for the life of
//! the process.

use cardroom_protocol::{ConnectionKind, TableId, Username};
use dashmap::DashMap;

use crate::{
    Participant, ParticipantStore, Session, SessionError, SessionStore, Table, TableStore,
};

/// A process-local store of tables, participants, and live sessions.
///
/// Sessions are grouped per table so each table's list is guarded by its
/// own map shard rather than one global lock.
#[derive(Default)]
pub struct InMemoryStore {
    tables: DashMap<TableId, Table>,
    participants: DashMap<Username, Participant>,
    /// Live sessions per table, in join order.
    sessions: DashMap<TableId, Vec<Session>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table and returns it.
    pub fn add_table(&self, table: Table) -> Table {
        self.tables.insert(table.id, table.clone());
        table
    }

    /// Registers a participant and returns it.
    pub fn add_participant(&self, participant: Participant) -> Participant {
        self.participants
            .insert(participant.username.clone(), participant.clone());
        participant
    }

    /// Total live sessions across all tables.
    pub fn session_count(&self) -> usize {
        self.sessions.iter().map(|entry| entry.value().len()).sum()
    }
}

impl TableStore for InMemoryStore {
    fn find_table(&self, table_id: TableId) -> Option<Table> {
        self.tables.get(&table_id).map(|t| t.clone())
    }
}

impl ParticipantStore for InMemoryStore {
    fn find_participant(&self, username: &Username) -> Option<Participant> {
        self.participants.get(username).map(|p| p.clone())
    }
}

impl SessionStore for InMemoryStore {
    fn find_session(&self, table_id: TableId, username: &Username) -> Option<Session> {
        self.sessions
            .get(&table_id)?
            .iter()
            .find(|s| &s.username == username)
            .cloned()
    }

    fn create_session(
        &self,
        table: &Table,
        participant: &Participant,
        kind: ConnectionKind,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.entry(table.id).or_default();

        if sessions.iter().any(|s| s.username == participant.username) {
            return Err(SessionError::AlreadyConnected {
                table_id: table.id,
                username: participant.username.clone(),
            });
        }

        let (seat, dealer) = match kind {
            ConnectionKind::Player => {
                let taken: Vec<u32> = sessions.iter().filter_map(|s| s.seat).collect();
                let seat = (1..).find(|n| !taken.contains(n)).unwrap_or(1);
                // First player at an otherwise player-free table deals.
                (Some(seat), !sessions.iter().any(Session::is_player))
            }
            ConnectionKind::Observer => (None, false),
        };

        let session = Session {
            table_id: table.id,
            username: participant.username.clone(),
            kind,
            seat,
            dealer,
        };
        sessions.push(session.clone());

        tracing::info!(
            table_id = %table.id,
            username = %session.username,
            %kind,
            ?seat,
            dealer,
            "session created"
        );
        Ok(session)
    }

    fn remove_session(&self, table_id: TableId, username: &Username) -> Option<Session> {
        let removed = {
            let mut sessions = self.sessions.get_mut(&table_id)?;
            let index = sessions.iter().position(|s| &s.username == username)?;
            sessions.remove(index)
        };
        self.sessions.remove_if(&table_id, |_, sessions| sessions.is_empty());

        tracing::info!(%table_id, %username, "session removed");
        Some(removed)
    }

    fn sessions_at(&self, table_id: TableId) -> Vec<Session> {
        self.sessions
            .get(&table_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}
