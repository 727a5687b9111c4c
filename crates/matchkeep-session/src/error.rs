//! Error types for the session layer.

use matchkeep_protocol::{MemberId, SessionId};

use crate::DenyReason;

/// Why a session operation was rejected.
///
/// None of these leave the session modified: transitions run against a
/// working copy that is only committed on success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// There is no match in this community (or it already ended).
    #[error("no active match")]
    NoActiveSession,

    /// A match is already running; end it before starting another.
    #[error("match {0} is already active")]
    AlreadyActive(SessionId),

    /// Only the owner may do this.
    #[error("only the match owner can do that")]
    NotOwner,

    /// The match is locked; roster changes are rejected until unlocked.
    #[error("the match is locked")]
    SessionLocked,

    /// The member named in the request is not on any team.
    #[error("member {0} is not in the match")]
    TargetNotInSession(MemberId),

    /// Someone already asked the owner to end the match.
    #[error("an end request from {0} is already pending")]
    AlreadyPending(MemberId),

    /// An approval decision arrived with nothing pending.
    #[error("no end request is pending")]
    NoPendingApproval,

    /// Well-formed but not meaningful, e.g. an unknown team label or a
    /// member moved into the team they are already on.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<DenyReason> for SessionError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotOwner => Self::NotOwner,
            DenyReason::SessionLocked => Self::SessionLocked,
            DenyReason::NoActiveSession => Self::NoActiveSession,
            DenyReason::TargetNotInSession(member) => Self::TargetNotInSession(member),
            DenyReason::AlreadyPending(member) => Self::AlreadyPending(member),
        }
    }
}
