//! Message vocabulary for matchkeep.
//!
//! This crate defines what the core and a platform adapter say to each
//! other:
//!
//! - **Identity** ([`MemberId`], [`CommunityId`], [`ChannelId`],
//!   [`SessionId`], [`TeamLabel`]): plain `u64`/string newtypes.
//! - **Inbound** ([`Inbound`], [`Request`], [`Command`],
//!   [`VoiceStateUpdate`]): commands issued by members and voice-state
//!   changes reported by the platform.
//! - **Outbound** ([`Response`], [`Reply`], [`Notice`]): answers to the
//!   requester and notices the platform should deliver.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, bytes out.
//!
//! It knows nothing about sessions, timers, or the platform itself.

mod codec;
mod duration;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use duration::MatchDuration;
pub use error::ProtocolError;
pub use message::{
    Audience, Command, ErrorCode, FailedOperation, Inbound, Notice, NoticeBody, Operation,
    Reply, Request, Response, RosterSpec, StatusReport, TimerStatus, VoiceStateUpdate,
};
pub use types::{
    ChannelId, CommunityId, Decision, EndReason, MemberId, MoveMode, SessionId, TeamLabel,
    TransferReason,
};
