//! Messages exchanged with the platform adapter.
//!
//! Inbound: a [`Request`] (a member issuing a [`Command`]) or a
//! [`VoiceStateUpdate`] reported by the platform, wrapped in [`Inbound`].
//! Outbound: a [`Response`] to the requester, and [`Notice`]s the core
//! asks the platform to deliver.
//!
//! Enums use internally tagged JSON (`{ "type": "Swap", ... }`), the same
//! shape across commands, replies, and notices.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    ChannelId, CommunityId, Decision, EndReason, MatchDuration, MemberId, MoveMode,
    SessionId, TeamLabel, TransferReason,
};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// How the starting roster is formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterSpec {
    /// Teams given by label.
    Explicit {
        teams: BTreeMap<TeamLabel, Vec<MemberId>>,
    },
    /// Shuffle `pool` and split it evenly over `teams` teams
    /// (`team1..teamN`). `None` uses the configured default count.
    Shuffle {
        pool: Vec<MemberId>,
        #[serde(default)]
        teams: Option<usize>,
    },
}

/// A command issued by a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Create the match: voice locations, rosters, initial relocations.
    Start {
        roster: RosterSpec,
        move_mode: MoveMode,
    },

    /// End the match (owner) or ask the owner to end it (anyone else).
    End,

    /// Put `target` (the issuer when absent) into `team`.
    Move {
        #[serde(default)]
        target: Option<MemberId>,
        team: TeamLabel,
    },

    /// Exchange the teams of two participants.
    Swap { user1: MemberId, user2: MemberId },

    /// Hand ownership to another participant.
    Transfer { new_owner: MemberId },

    Lock,
    Unlock,
    Status,

    /// Start (or restart) the match timer.
    TimerStart {
        duration: MatchDuration,
        #[serde(default)]
        auto_end: bool,
    },

    TimerStop,

    /// The owner's answer to the approval prompt.
    ApprovalDecision { decision: Decision },
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::End => "end",
            Self::Move { .. } => "move",
            Self::Swap { .. } => "swap",
            Self::Transfer { .. } => "transfer",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Status => "status",
            Self::TimerStart { .. } => "timer_start",
            Self::TimerStop => "timer_stop",
            Self::ApprovalDecision { .. } => "approval_decision",
        }
    }
}

/// A command together with who issued it and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub community: CommunityId,
    pub actor: MemberId,
    /// The text location the command was issued from, if any.
    #[serde(default)]
    pub channel: Option<ChannelId>,
    pub command: Command,
}

/// A member's voice location changed on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub community: CommunityId,
    pub member: MemberId,
    #[serde(default)]
    pub before: Option<ChannelId>,
    #[serde(default)]
    pub after: Option<ChannelId>,
}

/// Everything the adapter may feed into the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inbound {
    Request(Request),
    VoiceState(VoiceStateUpdate),
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Remaining-time view of a running timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub remaining_secs: u64,
    pub warned: bool,
    pub auto_end: bool,
}

/// Snapshot of a session for the status command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub session: SessionId,
    pub name: String,
    pub owner: MemberId,
    pub move_mode: MoveMode,
    pub locked: bool,
    pub elapsed_minutes: u64,
    pub teams: BTreeMap<TeamLabel, Vec<MemberId>>,
    pub timer: Option<TimerStatus>,
    pub pending_end: Option<MemberId>,
}

/// What a successful command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    Started {
        session: SessionId,
        name: String,
        move_mode: MoveMode,
        teams: BTreeMap<TeamLabel, Vec<MemberId>>,
    },
    Ended {
        session: SessionId,
        reason: EndReason,
    },
    /// A non-owner's end request went to the owner.
    ApprovalRequested { owner: MemberId },
    /// The owner turned an end request down.
    ApprovalDenied { requested_by: MemberId },
    Moved {
        member: MemberId,
        team: TeamLabel,
        /// `true` when the member was not a participant before.
        joined: bool,
    },
    Swapped {
        user1: MemberId,
        user1_team: TeamLabel,
        user2: MemberId,
        user2_team: TeamLabel,
    },
    Transferred { from: MemberId, to: MemberId },
    /// Lock or unlock; `changed` is `false` when the flag already had
    /// the requested value.
    LockChanged { locked: bool, changed: bool },
    Status(StatusReport),
    TimerStarted {
        duration: MatchDuration,
        auto_end: bool,
        /// Whether a pre-expiry warning will fire.
        warns: bool,
    },
    TimerStopped { was_running: bool },
}

/// A platform operation that failed after the transition committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Move `member` to `to`; `None` disconnects them from voice.
    Relocate {
        member: MemberId,
        to: Option<ChannelId>,
    },
    DeleteChannels { category: ChannelId },
    Notify { to: Audience },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOperation {
    pub operation: Operation,
    pub error: String,
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoActiveSession,
    AlreadyActive,
    NotOwner,
    SessionLocked,
    TargetNotInSession,
    AlreadyPending,
    PlatformOperationFailed,
    InvalidRequest,
    NoPendingApproval,
    Protocol,
    Unavailable,
}

/// The answer sent back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok {
        reply: Reply,
        /// Physical operations that failed; the logical change stands.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        failures: Vec<FailedOperation>,
    },
    Error { code: ErrorCode, message: String },
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// Where a notice goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "to", content = "id", rename_all = "snake_case")]
pub enum Audience {
    /// A direct message to one member.
    Member(MemberId),
    /// A text location.
    Channel(ChannelId),
}

/// Something the platform should tell someone. Rendering is the
/// platform's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NoticeBody {
    MatchEnded {
        session: SessionId,
        reason: EndReason,
    },
    /// An approval prompt; the platform offers `actions` to the recipient
    /// and reports the choice back as [`Command::ApprovalDecision`].
    EndApprovalRequested {
        session: SessionId,
        requested_by: MemberId,
        actions: Vec<Decision>,
    },
    EndApprovalResolved {
        session: SessionId,
        decision: Decision,
    },
    OwnershipTransferred {
        session: SessionId,
        from: MemberId,
        to: MemberId,
        reason: TransferReason,
    },
    TimerWarning {
        session: SessionId,
        remaining_secs: u64,
    },
    TimerExpired {
        session: SessionId,
        auto_end: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub audience: Audience,
    pub body: NoticeBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "community": 1,
            "actor": 10,
            "channel": 500,
            "command": { "type": "Swap", "user1": 11, "user2": 12 }
        }"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.community, CommunityId(1));
        assert_eq!(req.channel, Some(ChannelId(500)));
        assert_eq!(
            req.command,
            Command::Swap {
                user1: MemberId(11),
                user2: MemberId(12)
            }
        );
    }

    #[test]
    fn test_start_with_explicit_roster() {
        let json = r#"{
            "type": "Start",
            "move_mode": "deny",
            "roster": { "kind": "explicit", "teams": { "team1": [1, 2], "team2": [3] } }
        }"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        let Command::Start { roster, move_mode } = cmd else {
            panic!("expected Start");
        };
        assert_eq!(move_mode, MoveMode::Deny);
        let RosterSpec::Explicit { teams } = roster else {
            panic!("expected explicit roster");
        };
        assert_eq!(teams[&TeamLabel::from("team1")], vec![MemberId(1), MemberId(2)]);
    }

    #[test]
    fn test_shuffle_team_count_is_optional() {
        let json = r#"{ "kind": "shuffle", "pool": [1, 2, 3] }"#;
        let roster: RosterSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            roster,
            RosterSpec::Shuffle {
                pool: vec![MemberId(1), MemberId(2), MemberId(3)],
                teams: None
            }
        );
    }

    #[test]
    fn test_move_target_defaults_to_none() {
        let cmd: Command =
            serde_json::from_str(r#"{ "type": "Move", "team": "team2" }"#).unwrap();
        assert_eq!(
            cmd,
            Command::Move {
                target: None,
                team: TeamLabel::from("team2")
            }
        );
    }

    #[test]
    fn test_timer_start_parses_duration_and_defaults_auto_end() {
        let cmd: Command =
            serde_json::from_str(r#"{ "type": "TimerStart", "duration": "20m" }"#).unwrap();
        let Command::TimerStart { duration, auto_end } = cmd else {
            panic!("expected TimerStart");
        };
        assert_eq!(duration.as_secs(), 1_200);
        assert!(!auto_end);
    }

    #[test]
    fn test_timer_start_rejects_bad_duration() {
        let err = serde_json::from_str::<Command>(r#"{ "type": "TimerStart", "duration": "1 hour" }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_inbound_voice_state_shape() {
        let json = r#"{ "kind": "voice_state", "community": 1, "member": 4, "before": 20 }"#;
        let inbound: Inbound = serde_json::from_str(json).unwrap();
        assert_eq!(
            inbound,
            Inbound::VoiceState(VoiceStateUpdate {
                community: CommunityId(1),
                member: MemberId(4),
                before: Some(ChannelId(20)),
                after: None,
            })
        );
    }

    #[test]
    fn test_error_response_uses_screaming_codes() {
        let resp = Response::Error {
            code: ErrorCode::TargetNotInSession,
            message: "nope".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "TARGET_NOT_IN_SESSION");
    }

    #[test]
    fn test_ok_response_omits_empty_failures() {
        let resp = Response::Ok {
            reply: Reply::TimerStopped { was_running: true },
            failures: Vec::new(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["reply"]["type"], "TimerStopped");
        assert!(json.get("failures").is_none());
    }

    #[test]
    fn test_audience_json_shape() {
        let json = serde_json::to_value(Audience::Member(MemberId(5))).unwrap();
        assert_eq!(json["to"], "member");
        assert_eq!(json["id"], 5);
    }
}
