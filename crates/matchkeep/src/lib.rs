//! # Matchkeep
//!
//! Coordinates team matches inside chat communities: one live match per
//! community, teams bound to voice locations, an owner with
//! administrative rights, end-approval by the owner, a lock, and a match
//! timer that warns and can end the match on its own.
//!
//! Matchkeep doesn't talk to any chat service itself. A platform adapter
//! implements [`Platform`] and feeds requests and voice-state changes into
//! a [`Dispatcher`]; Matchkeep decides, then asks the platform to move,
//! create, delete and notify.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use matchkeep::prelude::*;
//!
//! let dispatcher = Dispatcher::new(MyPlatform::connect().await?, CoordinatorConfig::default());
//! let outcome = dispatcher.handle(request).await?;
//! for failure in &outcome.failures {
//!     tracing::warn!(?failure, "partial failure");
//! }
//! ```

mod actor;
mod config;
mod dispatcher;
mod error;
mod executor;
mod platform;

pub use config::CoordinatorConfig;
pub use dispatcher::{Dispatcher, Outcome};
pub use error::MatchError;
pub use matchkeep_session::MatchChannels;
pub use platform::{Platform, PlatformError};

/// Everything an adapter usually needs, in one import.
pub mod prelude {
    pub use crate::{
        CoordinatorConfig, Dispatcher, MatchChannels, MatchError, Outcome, Platform,
        PlatformError,
    };
    pub use matchkeep_protocol::{
        Audience, ChannelId, Codec, Command, CommunityId, Decision, EndReason, ErrorCode,
        FailedOperation, Inbound, JsonCodec, MatchDuration, MemberId, MoveMode, Notice,
        NoticeBody, Operation, Reply, Request, Response, RosterSpec, SessionId, StatusReport,
        TeamLabel, TimerStatus, TransferReason, VoiceStateUpdate,
    };
}
