//! Codec trait and implementations for serializing Voxhost values.
//!
//! The same codec is used for request bodies sent to hosting devices and
//! for the persisted room collections, so a single [`Codec`] decides the
//! byte format of everything that leaves the process.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs live inside long-running
/// Tokio tasks (the room actor, spawned host calls).
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Host devices speak JSON, and the persisted state is kept as JSON so
/// it stays inspectable with a text editor.
///
/// ## Example
///
/// ```rust
/// use voxhost_protocol::{Codec, JsonCodec, RoomSummary, RoomId};
///
/// let codec = JsonCodec;
/// let summary = RoomSummary {
///     id: RoomId::new("r-1"),
///     name: "Lounge".into(),
///     description: String::new(),
///     host_device_id: None,
///     max_members: 10,
///     current_members: 0,
/// };
///
/// let bytes = codec.encode(&summary).unwrap();
/// let decoded: RoomSummary = codec.decode(&bytes).unwrap();
/// assert_eq!(summary, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
