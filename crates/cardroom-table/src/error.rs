//! Error types for the table layer.

use cardroom_protocol::TableId;

/// Errors returned when handing work to a game worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker has been told to stop, or already has. It accepts no
    /// further notifications.
    #[error("game worker for table {0} is stopped")]
    Stopped(TableId),

    /// The worker's notification queue is full. The notification was
    /// dropped rather than waiting for the worker to catch up.
    #[error("game worker for table {0} is backlogged")]
    Backlogged(TableId),
}
