//! Identity types and small enums shared by every matchkeep layer.
//!
//! Ids are `u64` newtypes so a `MemberId` can never be passed where a
//! `ChannelId` is expected. All of them serialize as plain numbers
//! (`#[serde(transparent)]`), which is what platform adapters hand us.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A member of a community (a user on the chat platform).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// A community (server / guild). Each community holds at most one session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CommunityId(pub u64);

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// A location on the platform: a voice channel, a text channel, or a
/// category grouping them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH-{}", self.0)
    }
}

/// Identifies one match session. Never reused within a process, so a
/// late event tagged with an old id can always be recognized as stale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// The name of a team inside a session, e.g. `"team1"`.
///
/// Labels are compared case-sensitively. Generated labels follow the
/// `team{n}` pattern (1-based), see [`TeamLabel::numbered`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TeamLabel(String);

impl TeamLabel {
    /// Creates a label from any string.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The generated label for the `n`-th team (1-based): `team1`, `team2`, …
    pub fn numbered(n: usize) -> Self {
        Self(format!("team{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TeamLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

// ---------------------------------------------------------------------------
// Session options
// ---------------------------------------------------------------------------

/// Who may move members between team voice locations.
///
/// Fixed when the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveMode {
    /// Members move themselves; the owner may also move others.
    Allow,
    /// Only the owner moves members.
    Deny,
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// The owner's answer to a pending end request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Deny,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The owner ended it directly.
    Owner,
    /// The owner approved someone else's end request.
    Approved,
    /// The timer expired with auto-end enabled.
    Timer,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => f.write_str("ended by owner"),
            Self::Approved => f.write_str("approved by owner"),
            Self::Timer => f.write_str("auto-ended by timer"),
        }
    }
}

/// Why ownership changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    /// The owner handed it over explicitly.
    Requested,
    /// The owner left every match voice location.
    OwnerLeft,
}
