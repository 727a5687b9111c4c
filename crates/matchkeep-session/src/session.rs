//! Session types: the record of one in-progress match.
//!
//! A session tracks:
//! - WHO runs it (`owner`) and WHO plays (`teams`, `origins`)
//! - WHERE everything happens (`channels`, `announce`)
//! - HOW it may be changed (`move_mode`, `locked`, `pending`)
//! - WHEN it ends on its own (`timer`)
//!
//! Fields are private: every change goes through the state machine so
//! the roster invariants hold. Read access is through getters.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use matchkeep_protocol::{
    Audience, ChannelId, CommunityId, MatchDuration, MemberId, MoveMode, SessionId, TeamLabel,
};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// The voice locations created for a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchChannels {
    /// Display name, e.g. `Match-4821`.
    pub name: String,
    /// The category grouping every match location.
    pub category: ChannelId,
    /// Shared voice location not bound to a team.
    pub lobby: ChannelId,
    /// One voice location per team label.
    pub teams: BTreeMap<TeamLabel, ChannelId>,
}

impl MatchChannels {
    /// Whether `channel` is one of this match's voice locations.
    pub fn contains(&self, channel: ChannelId) -> bool {
        channel == self.lobby || self.teams.values().any(|c| *c == channel)
    }

    pub fn team_channel(&self, team: &TeamLabel) -> Option<ChannelId> {
        self.teams.get(team).copied()
    }
}

// ---------------------------------------------------------------------------
// Pending approval
// ---------------------------------------------------------------------------

/// An end request from someone other than the owner, awaiting the
/// owner's decision. May stay pending indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub requested_by: MemberId,
    pub requested_at: Instant,
    /// Who was prompted. Follows ownership changes.
    pub approver: MemberId,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// Identifies one armed countdown. Timer events carrying any other tag
/// are stale and get dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTag {
    pub session: SessionId,
    pub generation: u64,
}

/// The match countdown as the session sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub generation: u64,
    pub deadline: Instant,
    pub duration: MatchDuration,
    pub warned: bool,
    pub auto_end: bool,
    /// Where the timer was started from; timer notices go there.
    pub announce: Option<ChannelId>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything needed to create a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub id: SessionId,
    pub community: CommunityId,
    pub owner: MemberId,
    pub move_mode: MoveMode,
    pub channels: MatchChannels,
    pub teams: BTreeMap<TeamLabel, Vec<MemberId>>,
    /// Voice location of each rostered member before the match.
    pub origins: HashMap<MemberId, Option<ChannelId>>,
    pub announce: Option<ChannelId>,
    pub created_at: Instant,
}

/// One in-progress match in a community.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    community: CommunityId,
    pub(crate) owner: MemberId,
    pub(crate) teams: BTreeMap<TeamLabel, BTreeSet<MemberId>>,
    pub(crate) origins: HashMap<MemberId, Option<ChannelId>>,
    move_mode: MoveMode,
    pub(crate) locked: bool,
    pub(crate) pending: Option<PendingApproval>,
    pub(crate) timer: Option<TimerState>,
    timer_generation: u64,
    channels: MatchChannels,
    announce: Option<ChannelId>,
    created_at: Instant,
}

impl Session {
    /// Builds a session from a seed.
    ///
    /// Every label in `channels.teams` gets a (possibly empty) roster.
    /// Members without a recorded origin are treated as having been
    /// outside voice.
    pub fn new(seed: SessionSeed) -> Self {
        let mut teams: BTreeMap<TeamLabel, BTreeSet<MemberId>> = seed
            .channels
            .teams
            .keys()
            .map(|label| (label.clone(), BTreeSet::new()))
            .collect();
        let mut origins = HashMap::new();

        for (label, members) in seed.teams {
            let roster = teams.entry(label).or_default();
            for member in members {
                roster.insert(member);
                origins.insert(member, seed.origins.get(&member).copied().flatten());
            }
        }

        Self {
            id: seed.id,
            community: seed.community,
            owner: seed.owner,
            teams,
            origins,
            move_mode: seed.move_mode,
            locked: false,
            pending: None,
            timer: None,
            timer_generation: 0,
            channels: seed.channels,
            announce: seed.announce,
            created_at: seed.created_at,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn community(&self) -> CommunityId {
        self.community
    }

    pub fn owner(&self) -> MemberId {
        self.owner
    }

    pub fn is_owner(&self, member: MemberId) -> bool {
        self.owner == member
    }

    pub fn move_mode(&self) -> MoveMode {
        self.move_mode
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn pending(&self) -> Option<&PendingApproval> {
        self.pending.as_ref()
    }

    pub fn timer(&self) -> Option<&TimerState> {
        self.timer.as_ref()
    }

    pub fn channels(&self) -> &MatchChannels {
        &self.channels
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Rosters by team label.
    pub fn teams(&self) -> &BTreeMap<TeamLabel, BTreeSet<MemberId>> {
        &self.teams
    }

    /// Rosters as sorted vectors, the shape used in replies.
    pub fn roster(&self) -> BTreeMap<TeamLabel, Vec<MemberId>> {
        self.teams
            .iter()
            .map(|(label, members)| (label.clone(), members.iter().copied().collect()))
            .collect()
    }

    /// Whether `member` is on any team.
    pub fn is_participant(&self, member: MemberId) -> bool {
        self.origins.contains_key(&member)
    }

    /// All participants, sorted.
    pub fn participants(&self) -> Vec<MemberId> {
        let mut all: Vec<MemberId> = self.origins.keys().copied().collect();
        all.sort();
        all
    }

    /// The team `member` is on, if any.
    pub fn team_of(&self, member: MemberId) -> Option<&TeamLabel> {
        self.teams
            .iter()
            .find(|(_, members)| members.contains(&member))
            .map(|(label, _)| label)
    }

    /// Where `member` was before the match. `None` for non-participants;
    /// `Some(None)` for participants who were not in voice.
    pub fn origin_of(&self, member: MemberId) -> Option<Option<ChannelId>> {
        self.origins.get(&member).copied()
    }

    /// Whether a move of `target` by `actor` into a team would add a new
    /// participant (self-join in allow mode).
    pub fn would_join(&self, actor: MemberId, target: MemberId) -> bool {
        self.move_mode == MoveMode::Allow
            && actor == target
            && !self.locked
            && !self.is_participant(target)
    }

    /// Where match-wide notices go: the location the match was started
    /// from, or the owner directly.
    pub fn announce_audience(&self) -> Audience {
        self.announce
            .map(Audience::Channel)
            .unwrap_or(Audience::Member(self.owner))
    }

    /// Where timer notices go.
    pub fn timer_audience(&self) -> Audience {
        self.timer
            .as_ref()
            .and_then(|t| t.announce)
            .map(Audience::Channel)
            .unwrap_or_else(|| self.announce_audience())
    }

    /// The tag of the running countdown.
    pub fn timer_tag(&self) -> Option<TimerTag> {
        self.timer.as_ref().map(|t| TimerTag {
            session: self.id,
            generation: t.generation,
        })
    }

    pub(crate) fn next_timer_generation(&mut self) -> u64 {
        self.timer_generation += 1;
        self.timer_generation
    }

    /// Puts `member` on `team`, removing them from any other team.
    pub(crate) fn assign(&mut self, member: MemberId, team: &TeamLabel) {
        for members in self.teams.values_mut() {
            members.remove(&member);
        }
        self.teams.entry(team.clone()).or_default().insert(member);
    }
}
