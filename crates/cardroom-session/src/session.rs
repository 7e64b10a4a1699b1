//! Domain records: tables, participants, and sessions.

use cardroom_protocol::{ConnectionKind, SessionView, TableId, Username};

/// A table participants can connect to. Existence is decided by the
/// [`TableStore`](crate::TableStore); this layer never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub id: TableId,
    pub name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TableId::new(),
            name: name.into(),
        }
    }
}

/// A user eligible to join tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub username: Username,
}

impl Participant {
    pub fn new(username: impl Into<Username>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// One participant's live membership at one table.
///
/// At most one exists per `(table_id, username)` pair. Created by a
/// successful connect; destroyed by disconnect, whether the client left
/// on purpose or the connection dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub table_id: TableId,
    pub username: Username,
    pub kind: ConnectionKind,
    /// Seat number, assigned to players only.
    pub seat: Option<u32>,
    pub dealer: bool,
}

impl Session {
    pub fn is_player(&self) -> bool {
        self.kind.is_player()
    }

    /// The client-facing view of this session.
    pub fn view(&self) -> SessionView {
        SessionView {
            table_id: self.table_id,
            username: self.username.clone(),
            kind: self.kind,
            seat: self.seat,
            dealer: self.dealer,
        }
    }
}
