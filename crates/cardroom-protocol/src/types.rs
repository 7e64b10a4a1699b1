//! Core protocol types: identities, session views, and wire messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque unique identifier of a table.
///
/// Serialized as the bare UUID string, so `TableId` reads the same in JSON
/// as in the channel key derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub Uuid);

impl TableId {
    /// Generates a fresh random table id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant's unique username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Username {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Username {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a connection is attached to a table.
///
/// Only [`ConnectionKind::Player`] connections cause a game worker to exist
/// for the table; observers receive broadcasts and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionKind {
    Player,
    Observer,
}

impl ConnectionKind {
    pub fn is_player(self) -> bool {
        matches!(self, Self::Player)
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "PLAYER"),
            Self::Observer => write!(f, "OBSERVER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel keys
// ---------------------------------------------------------------------------

/// Prefix of every table channel key.
pub const TOPIC_PREFIX: &str = "/topic/loops.";

/// Derives the transport channel key a table's broadcasts are published on.
///
/// Deterministic: the same table always maps to the same key.
pub fn table_topic(table_id: TableId) -> String {
    format!("{TOPIC_PREFIX}{table_id}")
}

// ---------------------------------------------------------------------------
// Session views
// ---------------------------------------------------------------------------

/// The client-facing shape of one participant's membership at a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub table_id: TableId,
    pub username: Username,
    pub kind: ConnectionKind,
    /// Seat number for players, `None` for observers.
    pub seat: Option<u32>,
    pub dealer: bool,
}

/// Payload returned only to a caller whose connect succeeded: the full
/// membership of the table at the moment they joined, themselves included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub table_id: TableId,
    pub sessions: Vec<SessionView>,
}

// ---------------------------------------------------------------------------
// WireMessage
// ---------------------------------------------------------------------------

/// Every message exchanged with clients or published to a table channel.
///
/// Internally tagged, so a frame reads as
/// `{ "type": "PLAYER_CONNECTED", "session": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireMessage {
    // -- Connection lifecycle --

    /// Client → Server: first frame on every connection.
    Handshake { version: u32, token: Option<String> },

    /// Server → Client: the handshake was accepted.
    HandshakeAck { username: Username, server_time: u64 },

    /// Either direction: the sender is closing the connection.
    Disconnect { reason: String },

    /// Client → Server keep-alive.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive reply.
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Table membership --

    /// Client → Server: attach this connection to a table.
    Subscribe { table_id: TableId, kind: ConnectionKind },

    /// Client → Server: leave the table this connection is attached to.
    Unsubscribe,

    /// Server → Client (caller only): the connect succeeded; here is who
    /// is at the table.
    PlayerSubscribed(SubscriptionView),

    /// Broadcast: a participant joined the table.
    PlayerConnected { session: SessionView },

    /// Broadcast: a participant left the table.
    PlayerDisconnected { username: Username },

    // -- Table traffic --

    /// Client → Server: chat text from the sender. The server fills in
    /// `username` when it rebroadcasts, ignoring whatever the client sent.
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<Username>,
        message: String,
    },

    /// Broadcast: a human-readable progress line from the game worker.
    Log { message: String },

    /// Broadcast: game-specific data, opaque to this layer.
    Game { data: Vec<u8> },

    // -- Errors --

    /// Server → Client: a request failed. `code` follows HTTP conventions.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level frame. Every message on the wire is wrapped in one.
///
/// Server frames share one clock. Table broadcasts are numbered from 1 by a
/// server-wide counter; replies addressed to a single connection carry
/// [`Envelope::DIRECT_SEQ`] instead, so `seq` only ever orders broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sequence number assigned by the sender.
    pub seq: u64,
    /// Milliseconds since the sender started.
    pub timestamp: u64,
    pub message: WireMessage,
}

impl Envelope {
    /// `seq` of a frame sent to one connection rather than broadcast.
    pub const DIRECT_SEQ: u64 = 0;

    pub fn new(seq: u64, timestamp: u64, message: WireMessage) -> Self {
        Self {
            seq,
            timestamp,
            message,
        }
    }
}
