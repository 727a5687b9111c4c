//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or parsing inbound
/// messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, an
    /// unknown command type, and so on.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A timer duration that doesn't follow `<integer><s|m|h|d>`.
    #[error("invalid duration {0}")]
    InvalidDuration(String),
}
