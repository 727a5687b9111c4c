//! The match state machine.
//!
//! Transitions mutate a [`Session`] and describe what the outside world
//! should do about it as an ordered list of [`Effect`]s. Nothing here
//! talks to the platform or to timers; the caller executes the effects
//! after the transition has been committed to the store.
//!
//! ```text
//!            Start
//!              │
//!              ▼
//!   ┌──── ACTIVE ◄──── Lock/Unlock (flag) ────┐
//!   │        │                                │
//!   │  Move/Swap/Transfer/Timer*/RequestEnd   │
//!   │        └────────────────────────────────┘
//!   │
//!   └─ owner End / approval / auto-end timer ──► ENDED (session removed)
//! ```

use std::time::Duration;

use matchkeep_protocol::{
    Audience, ChannelId, Command, Decision, EndReason, MemberId, Notice, NoticeBody, Reply,
    StatusReport, TeamLabel, TimerStatus, TransferReason,
};
use tokio::time::Instant;

use crate::policy::{Action, Verdict, authorize};
use crate::{
    MatchChannels, PendingApproval, Session, SessionError, SessionSeed, TimerState, TimerTag,
};

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Something the caller must do after a transition commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Move a member to a voice location; `None` disconnects them.
    Relocate {
        member: MemberId,
        to: Option<ChannelId>,
    },
    /// Delete the match's voice locations.
    DeleteChannels(MatchChannels),
    Notify(Notice),
    /// Start a countdown reporting with `tag`.
    ArmTimer { tag: TimerTag, deadline: Instant },
    /// Stop the running countdown.
    CancelTimer,
}

/// The outcome of a committed transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub effects: Vec<Effect>,
    /// The session reached ENDED and must be removed from the store.
    pub ended: bool,
}

impl Transition {
    fn effects(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            ended: false,
        }
    }

    fn ended(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            ended: true,
        }
    }
}

/// Inputs a transition needs from its surroundings.
#[derive(Debug, Clone)]
pub struct Context {
    pub now: Instant,
    /// How long before expiry the timer warns.
    pub warning_lead: Duration,
    /// The text location the command came from.
    pub channel: Option<ChannelId>,
    /// Current voice location of a member joining through a self-move.
    pub join_origin: Option<ChannelId>,
}

impl Context {
    pub fn at(now: Instant, warning_lead: Duration) -> Self {
        Self {
            now,
            warning_lead,
            channel: None,
            join_origin: None,
        }
    }
}

/// An internal event from the session's countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Warning,
    Expiry,
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Builds a session and the relocations that put every rostered member
/// into their team's voice location.
///
/// # Errors
/// [`SessionError::InvalidRequest`] if a roster label has no voice
/// location in `seed.channels`.
pub fn begin(seed: SessionSeed) -> Result<(Session, Vec<Effect>), SessionError> {
    if let Some(label) = seed
        .teams
        .keys()
        .find(|label| seed.channels.team_channel(label).is_none())
    {
        return Err(SessionError::InvalidRequest(format!(
            "no voice location for team {label}"
        )));
    }

    let session = Session::new(seed);
    let effects = session
        .teams()
        .iter()
        .flat_map(|(label, members)| {
            let to = session.channels().team_channel(label);
            members.iter().map(move |member| Effect::Relocate {
                member: *member,
                to,
            })
        })
        .collect();
    Ok((session, effects))
}

/// The reply for a successful start.
pub fn started_reply(session: &Session) -> Reply {
    Reply::Started {
        session: session.id(),
        name: session.channels().name.clone(),
        move_mode: session.move_mode(),
        teams: session.roster(),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Authorizes and applies `command` from `actor`.
///
/// Run this inside [`SessionStore::mutate`](crate::SessionStore::mutate)
/// so a rejected command leaves no trace.
pub fn apply(
    session: &mut Session,
    actor: MemberId,
    command: &Command,
    ctx: &Context,
) -> Result<(Reply, Transition), SessionError> {
    match command {
        Command::Start { .. } => Err(SessionError::AlreadyActive(session.id())),
        Command::End => request_end(session, actor, ctx),
        Command::Move { target, team } => {
            move_member(session, actor, target.unwrap_or(actor), team, ctx)
        }
        Command::Swap { user1, user2 } => swap(session, actor, *user1, *user2),
        Command::Transfer { new_owner } => transfer(session, actor, *new_owner),
        Command::Lock => set_lock(session, actor, true),
        Command::Unlock => set_lock(session, actor, false),
        Command::Status => {
            check(session, actor, Action::Status)?;
            Ok((Reply::Status(status(session, ctx.now)), Transition::default()))
        }
        Command::TimerStart { duration, auto_end } => {
            check(session, actor, Action::TimerStart)?;
            if duration.as_secs() == 0 {
                return Err(SessionError::InvalidRequest(
                    "timer duration must be positive".into(),
                ));
            }
            let deadline = ctx.now.checked_add(duration.as_duration()).ok_or_else(|| {
                SessionError::InvalidRequest(format!("timer duration {duration} is too long"))
            })?;
            let generation = session.next_timer_generation();
            let mut effects = Vec::new();
            if session.timer.is_some() {
                effects.push(Effect::CancelTimer);
            }
            session.timer = Some(TimerState {
                generation,
                deadline,
                duration: *duration,
                warned: false,
                auto_end: *auto_end,
                announce: ctx.channel,
            });
            effects.push(Effect::ArmTimer {
                tag: TimerTag {
                    session: session.id(),
                    generation,
                },
                deadline,
            });
            let warns = !ctx.warning_lead.is_zero() && duration.as_duration() > ctx.warning_lead;
            Ok((
                Reply::TimerStarted {
                    duration: *duration,
                    auto_end: *auto_end,
                    warns,
                },
                Transition::effects(effects),
            ))
        }
        Command::TimerStop => {
            check(session, actor, Action::TimerStop)?;
            let was_running = session.timer.take().is_some();
            let effects = if was_running {
                vec![Effect::CancelTimer]
            } else {
                Vec::new()
            };
            Ok((Reply::TimerStopped { was_running }, Transition::effects(effects)))
        }
        Command::ApprovalDecision { decision } => resolve_approval(session, actor, *decision),
    }
}

fn check(session: &Session, actor: MemberId, action: Action) -> Result<Verdict, SessionError> {
    authorize(Some(session), actor, action)
        .into_result()
        .map_err(SessionError::from)
}

fn request_end(
    session: &mut Session,
    actor: MemberId,
    ctx: &Context,
) -> Result<(Reply, Transition), SessionError> {
    match check(session, actor, Action::End)? {
        Verdict::NeedsApproval => {
            let owner = session.owner();
            session.pending = Some(PendingApproval {
                requested_by: actor,
                requested_at: ctx.now,
                approver: owner,
            });
            let prompt = approval_prompt(session, actor, owner);
            Ok((
                Reply::ApprovalRequested { owner },
                Transition::effects(vec![prompt]),
            ))
        }
        _ => Ok((
            Reply::Ended {
                session: session.id(),
                reason: EndReason::Owner,
            },
            Transition::ended(finish(session, EndReason::Owner)),
        )),
    }
}

fn resolve_approval(
    session: &mut Session,
    actor: MemberId,
    decision: Decision,
) -> Result<(Reply, Transition), SessionError> {
    check(session, actor, Action::ResolveApproval)?;
    let pending = session.pending.take().ok_or(SessionError::NoPendingApproval)?;
    let outcome = Effect::Notify(Notice {
        audience: Audience::Member(pending.requested_by),
        body: NoticeBody::EndApprovalResolved {
            session: session.id(),
            decision,
        },
    });

    match decision {
        Decision::Approve => {
            let mut effects = vec![outcome];
            effects.extend(finish(session, EndReason::Approved));
            Ok((
                Reply::Ended {
                    session: session.id(),
                    reason: EndReason::Approved,
                },
                Transition::ended(effects),
            ))
        }
        Decision::Deny => Ok((
            Reply::ApprovalDenied {
                requested_by: pending.requested_by,
            },
            Transition::effects(vec![outcome]),
        )),
    }
}

fn move_member(
    session: &mut Session,
    actor: MemberId,
    target: MemberId,
    team: &TeamLabel,
    ctx: &Context,
) -> Result<(Reply, Transition), SessionError> {
    check(session, actor, Action::Move { target })?;
    let to = session
        .channels()
        .team_channel(team)
        .ok_or_else(|| SessionError::InvalidRequest(format!("unknown team {team}")))?;

    let joined = match session.team_of(target).cloned() {
        Some(current) if current == *team => {
            return Err(SessionError::InvalidRequest(format!(
                "{target} is already in {team}"
            )));
        }
        Some(_) => false,
        None => {
            session.origins.insert(target, ctx.join_origin);
            true
        }
    };
    session.assign(target, team);

    Ok((
        Reply::Moved {
            member: target,
            team: team.clone(),
            joined,
        },
        Transition::effects(vec![Effect::Relocate {
            member: target,
            to: Some(to),
        }]),
    ))
}

fn swap(
    session: &mut Session,
    actor: MemberId,
    user1: MemberId,
    user2: MemberId,
) -> Result<(Reply, Transition), SessionError> {
    check(session, actor, Action::Swap { user1, user2 })?;
    let (Some(team1), Some(team2)) = (
        session.team_of(user1).cloned(),
        session.team_of(user2).cloned(),
    ) else {
        // The policy already checked both are participants.
        return Err(SessionError::TargetNotInSession(user1));
    };
    if team1 == team2 {
        return Err(SessionError::InvalidRequest(format!(
            "{user1} and {user2} are both in {team1}"
        )));
    }

    session.assign(user1, &team2);
    session.assign(user2, &team1);
    let channels = session.channels();
    let effects = vec![
        Effect::Relocate {
            member: user1,
            to: channels.team_channel(&team2),
        },
        Effect::Relocate {
            member: user2,
            to: channels.team_channel(&team1),
        },
    ];

    Ok((
        Reply::Swapped {
            user1,
            user1_team: team2,
            user2,
            user2_team: team1,
        },
        Transition::effects(effects),
    ))
}

fn transfer(
    session: &mut Session,
    actor: MemberId,
    new_owner: MemberId,
) -> Result<(Reply, Transition), SessionError> {
    check(session, actor, Action::Transfer { new_owner })?;
    let from = session.owner();
    let effects = if from == new_owner {
        Vec::new()
    } else {
        hand_over(session, new_owner, TransferReason::Requested)
    };
    Ok((
        Reply::Transferred {
            from,
            to: new_owner,
        },
        Transition::effects(effects),
    ))
}

fn set_lock(
    session: &mut Session,
    actor: MemberId,
    locked: bool,
) -> Result<(Reply, Transition), SessionError> {
    check(session, actor, if locked { Action::Lock } else { Action::Unlock })?;
    let changed = session.locked != locked;
    session.locked = locked;
    Ok((Reply::LockChanged { locked, changed }, Transition::default()))
}

/// Snapshot for the status command.
pub fn status(session: &Session, now: Instant) -> StatusReport {
    StatusReport {
        session: session.id(),
        name: session.channels().name.clone(),
        owner: session.owner(),
        move_mode: session.move_mode(),
        locked: session.is_locked(),
        elapsed_minutes: now.saturating_duration_since(session.created_at()).as_secs() / 60,
        teams: session.roster(),
        timer: session.timer().map(|t| TimerStatus {
            remaining_secs: t.deadline.saturating_duration_since(now).as_secs(),
            warned: t.warned,
            auto_end: t.auto_end,
        }),
        pending_end: session.pending().map(|p| p.requested_by),
    }
}

// ---------------------------------------------------------------------------
// Internal events
// ---------------------------------------------------------------------------

/// Applies a countdown event.
///
/// Returns `None` when the event is stale: its tag doesn't match the
/// running timer (stopped, replaced, or a different session), or the
/// warning was already applied.
pub fn on_timer(
    session: &mut Session,
    tag: TimerTag,
    signal: TimerSignal,
    ctx: &Context,
) -> Option<Transition> {
    if session.timer_tag() != Some(tag) {
        return None;
    }
    let id = session.id();
    let audience = session.timer_audience();
    let timer = session.timer.as_mut()?;

    match signal {
        TimerSignal::Warning => {
            if timer.warned {
                return None;
            }
            timer.warned = true;
            let remaining_secs = timer.deadline.saturating_duration_since(ctx.now).as_secs();
            Some(Transition::effects(vec![Effect::Notify(Notice {
                audience,
                body: NoticeBody::TimerWarning {
                    session: id,
                    remaining_secs,
                },
            })]))
        }
        TimerSignal::Expiry => {
            let auto_end = timer.auto_end;
            let expired = Effect::Notify(Notice {
                audience,
                body: NoticeBody::TimerExpired {
                    session: id,
                    auto_end,
                },
            });
            session.timer = None;
            if auto_end {
                let mut effects = vec![expired];
                effects.extend(finish(session, EndReason::Timer));
                Some(Transition::ended(effects))
            } else {
                Some(Transition::effects(vec![expired]))
            }
        }
    }
}

/// Reacts to a member's voice location changing.
///
/// - While locked, anyone but the owner who ends up in a match location
///   other than their own team's is sent back: participants to their
///   team, everyone else to where they came from (or out of voice).
/// - When the owner leaves every match location, ownership goes to the
///   participant `pick` chooses from the others.
pub fn on_voice_state(
    session: &mut Session,
    member: MemberId,
    before: Option<ChannelId>,
    after: Option<ChannelId>,
    pick: impl FnOnce(&[MemberId]) -> Option<MemberId>,
) -> Transition {
    let in_match = |c: Option<ChannelId>| c.is_some_and(|c| session.channels().contains(c));
    let entered_match = in_match(after);
    let left_match = in_match(before) && !entered_match;
    let is_owner = session.is_owner(member);

    if session.is_locked() && entered_match && !is_owner {
        let home = session
            .team_of(member)
            .and_then(|team| session.channels().team_channel(team));
        let back = match home {
            Some(home) if after == Some(home) => return Transition::default(),
            Some(home) => Some(home),
            None if in_match(before) => None,
            None => before,
        };
        tracing::debug!(%member, ?back, "locked match, reverting voice move");
        return Transition::effects(vec![Effect::Relocate { member, to: back }]);
    }

    if is_owner && left_match {
        let candidates: Vec<MemberId> = session
            .participants()
            .into_iter()
            .filter(|m| *m != member)
            .collect();
        if let Some(to) = pick(&candidates).filter(|m| candidates.contains(m)) {
            tracing::info!(
                session = %session.id(),
                from = %member,
                %to,
                "owner left the match, handing over ownership"
            );
            return Transition::effects(hand_over(session, to, TransferReason::OwnerLeft));
        }
    }

    Transition::default()
}

// ---------------------------------------------------------------------------
// Shared sequences
// ---------------------------------------------------------------------------

/// The end sequence: stop the timer, send everyone back, delete the
/// voice locations, announce.
fn finish(session: &Session, reason: EndReason) -> Vec<Effect> {
    let mut effects = Vec::new();
    if session.timer().is_some() {
        effects.push(Effect::CancelTimer);
    }
    for member in session.participants() {
        effects.push(Effect::Relocate {
            member,
            to: session.origin_of(member).flatten(),
        });
    }
    effects.push(Effect::DeleteChannels(session.channels().clone()));
    effects.push(Effect::Notify(Notice {
        audience: session.announce_audience(),
        body: NoticeBody::MatchEnded {
            session: session.id(),
            reason,
        },
    }));
    effects
}

/// Makes `to` the owner and tells everyone concerned. A pending end
/// request is re-addressed to the new owner, or dropped if they made it.
fn hand_over(session: &mut Session, to: MemberId, reason: TransferReason) -> Vec<Effect> {
    let from = session.owner();
    session.owner = to;

    let body = NoticeBody::OwnershipTransferred {
        session: session.id(),
        from,
        to,
        reason,
    };
    let mut effects = vec![Effect::Notify(Notice {
        audience: Audience::Member(to),
        body: body.clone(),
    })];
    let announce = session.announce_audience();
    if announce != Audience::Member(to) {
        effects.push(Effect::Notify(Notice {
            audience: announce,
            body,
        }));
    }

    match session.pending.take() {
        Some(pending) if pending.requested_by == to => {}
        Some(mut pending) => {
            pending.approver = to;
            effects.push(approval_prompt(session, pending.requested_by, to));
            session.pending = Some(pending);
        }
        None => {}
    }
    effects
}

fn approval_prompt(session: &Session, requested_by: MemberId, approver: MemberId) -> Effect {
    Effect::Notify(Notice {
        audience: Audience::Member(approver),
        body: NoticeBody::EndApprovalRequested {
            session: session.id(),
            requested_by,
            actions: vec![Decision::Approve, Decision::Deny],
        },
    })
}
