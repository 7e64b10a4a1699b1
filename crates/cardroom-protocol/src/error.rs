//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value could not be serialized. For outbound broadcasts this is a
    /// programming defect, never a transient condition.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound bytes were malformed or did not match the expected type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame decoded but breaks a protocol rule (wrong first message,
    /// version mismatch, and so on).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
