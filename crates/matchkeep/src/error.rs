//! Unified error type for Matchkeep.

use matchkeep_protocol::{CommunityId, ErrorCode, ProtocolError};
use matchkeep_session::SessionError;

use crate::PlatformError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, and
/// [`code`](Self::code) maps each one onto the wire taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// An undecodable or unencodable message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A rejected session operation. The session is unchanged.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A platform call failed in a way that aborted the operation.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The community's actor stopped.
    #[error("community {0} is unavailable")]
    Unavailable(CommunityId),

    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),
}

impl MatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(ProtocolError::InvalidDuration(_)) => ErrorCode::InvalidRequest,
            Self::Protocol(_) => ErrorCode::Protocol,
            Self::Session(err) => match err {
                SessionError::NoActiveSession => ErrorCode::NoActiveSession,
                SessionError::AlreadyActive(_) => ErrorCode::AlreadyActive,
                SessionError::NotOwner => ErrorCode::NotOwner,
                SessionError::SessionLocked => ErrorCode::SessionLocked,
                SessionError::TargetNotInSession(_) => ErrorCode::TargetNotInSession,
                SessionError::AlreadyPending(_) => ErrorCode::AlreadyPending,
                SessionError::NoPendingApproval => ErrorCode::NoPendingApproval,
                SessionError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            },
            Self::Platform(_) => ErrorCode::PlatformOperationFailed,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Config(_) => ErrorCode::InvalidRequest,
        }
    }
}
