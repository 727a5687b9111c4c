//! Codec trait and implementations for the adapter-facing byte format.
//!
//! The core never touches bytes itself; an adapter that receives raw
//! payloads from the platform decodes them into [`Inbound`](crate::Inbound)
//! with a [`Codec`] and encodes the [`Response`](crate::Response) the same
//! way. [`JsonCodec`] is the only implementation for now.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` so one codec can be shared by every task
/// spawned by the dispatcher.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use matchkeep_protocol::{Codec, Command, Inbound, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = br#"{
///     "kind": "request",
///     "community": 1,
///     "actor": 10,
///     "command": { "type": "Lock" }
/// }"#;
///
/// let Inbound::Request(request) = codec.decode::<Inbound>(bytes).unwrap() else {
///     panic!("expected a request");
/// };
/// assert_eq!(request.command, Command::Lock);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
