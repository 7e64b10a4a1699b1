//! Codec trait and the JSON implementation.
//!
//! The layers above never call `serde_json` directly: they hold something
//! implementing [`Codec`], so a binary format can be dropped in later
//! without touching the orchestrator or the dispatcher.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every connection task and every game worker.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do
    /// not match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use cardroom_protocol::{Codec, Envelope, JsonCodec, WireMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(1, 250, WireMessage::Heartbeat { client_time: 250 });
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{Envelope, Username, WireMessage};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_wrong_shape_returns_decode_error() {
        let result: Result<Envelope, _> =
            JsonCodec.decode(br#"{"seq":1,"timestamp":0,"message":{"type":"NOPE"}}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_non_string_map_keys_returns_encode_error() {
        // JSON objects need string keys; a tuple key cannot be encoded.
        let mut map = HashMap::new();
        map.insert((1u8, 2u8), "x");
        let result = JsonCodec.encode(&map);
        assert!(matches!(result, Err(ProtocolError::Encode(_))));
    }

    #[test]
    fn test_encoded_envelope_is_readable_json() {
        let envelope = Envelope::new(
            3,
            10,
            WireMessage::PlayerDisconnected {
                username: Username::from("alice"),
            },
        );
        let bytes = JsonCodec.encode(&envelope).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""type":"PLAYER_DISCONNECTED""#), "{text}");
        assert!(text.contains(r#""username":"alice""#), "{text}");
    }
}
