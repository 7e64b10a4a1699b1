//! Unified error type for Cardroom.

use cardroom_protocol::{ProtocolError, TableId, Username};
use cardroom_session::SessionError;
use cardroom_table::WorkerError;
use cardroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The first group of variants are request-level failures of the connect
/// protocol. They are rendered back to the offending connection only and
/// never broadcast. The `#[from]` variants wrap sub-crate errors so the `?`
/// operator converts them automatically.
#[derive(Debug, thiserror::Error)]
pub enum CardroomError {
    /// No table with this id exists.
    #[error("table {0} not found")]
    TableNotFound(TableId),

    /// No participant with this username exists.
    #[error("participant {0} not found")]
    ParticipantNotFound(Username),

    /// The participant already has a live session at the table.
    #[error("{username} is already connected to table {table_id}")]
    AlreadyConnected { table_id: TableId, username: Username },

    /// The connection is already attached to a table.
    #[error("connection is already subscribed to table {0}")]
    AlreadySubscribed(TableId),

    /// The request needs a table attachment the connection does not have.
    #[error("connection is not subscribed to a table")]
    NotSubscribed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl CardroomError {
    /// HTTP-style status code sent with an `ERROR` frame.
    pub fn code(&self) -> u16 {
        match self {
            Self::TableNotFound(_) | Self::ParticipantNotFound(_) => 404,
            Self::AlreadyConnected { .. }
            | Self::AlreadySubscribed(_)
            | Self::Session(SessionError::AlreadyConnected { .. }) => 409,
            Self::NotSubscribed
            | Self::Protocol(ProtocolError::Decode(_) | ProtocolError::InvalidMessage(_)) => 400,
            Self::Session(SessionError::AuthFailed(_)) => 401,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: CardroomError = TransportError::SendFailed(io).into();
        assert!(matches!(err, CardroomError::Transport(_)));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.code(), 500);
    }

    #[test]
    fn test_from_protocol_error() {
        let err: CardroomError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, CardroomError::Protocol(_)));
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_from_session_error() {
        let err: CardroomError = SessionError::AuthFailed("nope".into()).into();
        assert!(matches!(err, CardroomError::Session(_)));
        assert_eq!(err.code(), 401);
    }

    #[test]
    fn test_from_worker_error() {
        let err: CardroomError = WorkerError::Stopped(TableId::new()).into();
        assert!(matches!(err, CardroomError::Worker(_)));
    }

    #[test]
    fn test_request_errors_map_to_client_codes() {
        let table_id = TableId::new();
        let alice = Username::from("alice");

        assert_eq!(CardroomError::TableNotFound(table_id).code(), 404);
        assert_eq!(CardroomError::ParticipantNotFound(alice.clone()).code(), 404);
        assert_eq!(
            CardroomError::AlreadyConnected {
                table_id,
                username: alice.clone(),
            }
            .code(),
            409
        );
        assert_eq!(
            CardroomError::from(SessionError::AlreadyConnected {
                table_id,
                username: alice,
            })
            .code(),
            409
        );
        assert_eq!(CardroomError::AlreadySubscribed(table_id).code(), 409);
        assert_eq!(CardroomError::NotSubscribed.code(), 400);
    }

    #[test]
    fn test_request_error_messages_name_the_subject() {
        let err = CardroomError::ParticipantNotFound(Username::from("mallory"));
        assert_eq!(err.to_string(), "participant mallory not found");
    }
}
