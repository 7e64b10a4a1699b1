//! Error types for the session layer.

use cardroom_protocol::{TableId, Username};

/// Errors raised by authentication and session bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The handshake token was rejected by the [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A live session already exists for this (table, participant) pair.
    #[error("{username} already has a session at table {table_id}")]
    AlreadyConnected { table_id: TableId, username: Username },
}
