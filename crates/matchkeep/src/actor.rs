//! Community actor: an isolated Tokio task that owns one community's
//! session store and match timer.
//!
//! Every request for a community goes through its actor's queue, so
//! transitions in one community never interleave. Timer events arrive on
//! a second channel and are handled in the same loop.
//!
//! Platform work a transition leaves behind goes to the community's
//! effect worker, a second task that runs it in commit order. It keeps
//! running when the requester stops waiting, and drains its queue after
//! the actor stops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use matchkeep_protocol::{
    ChannelId, Command, CommunityId, FailedOperation, MemberId, MoveMode, Reply, RosterSpec,
    TeamLabel, VoiceStateUpdate,
};
use matchkeep_session::machine::{self, Context, Effect, TimerSignal, Transition};
use matchkeep_session::{MatchChannels, SessionSeed, SessionStore, TimerTag, plan_roster};
use matchkeep_timer::{TimerEngine, TimerEvent, TimerEventKind, TimerHandle};
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::executor::execute;
use crate::platform::{Platform, bounded};
use crate::{CoordinatorConfig, MatchError};

/// A transition the actor committed. Its platform work is already
/// queued; `report` yields the failures once that work has run.
#[derive(Debug)]
pub(crate) struct Committed {
    pub(crate) reply: Reply,
    pub(crate) report: Option<oneshot::Receiver<Vec<FailedOperation>>>,
}

impl Committed {
    fn done(reply: Reply) -> Self {
        Self {
            reply,
            report: None,
        }
    }
}

/// One batch of effects for the effect worker.
struct EffectJob {
    effects: Vec<Effect>,
    report: Option<oneshot::Sender<Vec<FailedOperation>>>,
}

/// Commands sent to a community actor through its channel.
pub(crate) enum ActorCommand {
    /// A member's request. The reply channel gets the committed result.
    Request {
        actor: MemberId,
        channel: Option<ChannelId>,
        command: Command,
        reply: oneshot::Sender<Result<Committed, MatchError>>,
    },

    /// A voice-state change reported by the platform.
    VoiceState(VoiceStateUpdate),

    /// Stop the actor. A running timer is cancelled with it.
    Shutdown,
}

/// Handle to a running community actor. Cheap to clone.
#[derive(Clone)]
pub(crate) struct CommunityHandle {
    community: CommunityId,
    sender: mpsc::Sender<ActorCommand>,
}

impl CommunityHandle {
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) async fn request(
        &self,
        actor: MemberId,
        channel: Option<ChannelId>,
        command: Command,
    ) -> Result<Committed, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(ActorCommand::Request {
                actor,
                channel,
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MatchError::Unavailable(self.community))?;
        reply_rx
            .await
            .map_err(|_| MatchError::Unavailable(self.community))?
    }

    pub(crate) async fn voice_state(&self, update: VoiceStateUpdate) -> Result<(), MatchError> {
        self.sender
            .send(ActorCommand::VoiceState(update))
            .await
            .map_err(|_| MatchError::Unavailable(self.community))
    }

    pub(crate) async fn shutdown(&self) {
        let _ = self.sender.send(ActorCommand::Shutdown).await;
    }
}

/// Spawns a community actor and returns a handle to it.
pub(crate) fn spawn_community<P: Platform>(
    community: CommunityId,
    platform: Arc<P>,
    config: Arc<CoordinatorConfig>,
) -> CommunityHandle {
    let (sender, receiver) = mpsc::channel(config.command_buffer);
    let (timers, timer_events) = TimerEngine::channel(config.timer());
    let (jobs, queue) = mpsc::unbounded_channel();
    tokio::spawn(run_effects(
        Arc::clone(&platform),
        community,
        config.platform_timeout,
        queue,
    ));

    let actor = CommunityActor {
        community,
        store: SessionStore::new(community),
        platform,
        config,
        timers,
        timer_events,
        running: None,
        jobs,
        receiver,
    };
    tokio::spawn(actor.run());

    CommunityHandle { community, sender }
}

/// The internal actor state. Runs inside a Tokio task.
struct CommunityActor<P: Platform> {
    community: CommunityId,
    store: SessionStore,
    platform: Arc<P>,
    config: Arc<CoordinatorConfig>,
    timers: TimerEngine<TimerTag>,
    timer_events: mpsc::UnboundedReceiver<TimerEvent<TimerTag>>,
    /// The countdown of the current session's timer, if one is armed.
    running: Option<TimerHandle>,
    jobs: mpsc::UnboundedSender<EffectJob>,
    receiver: mpsc::Receiver<ActorCommand>,
}

/// The effect worker: executes queued batches one after another until
/// the actor drops its end of the queue.
async fn run_effects<P: Platform>(
    platform: Arc<P>,
    community: CommunityId,
    limit: Duration,
    mut queue: mpsc::UnboundedReceiver<EffectJob>,
) {
    while let Some(EffectJob { effects, report }) = queue.recv().await {
        let failures = execute(&*platform, community, limit, effects).await;
        if let Some(report) = report {
            let _ = report.send(failures);
        }
    }
    tracing::debug!(%community, "effect worker stopped");
}

impl<P: Platform> CommunityActor<P> {
    async fn run(mut self) {
        tracing::info!(community = %self.community, "community actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(ActorCommand::Request { actor, channel, command, reply }) => {
                        let result = self.handle_request(actor, channel, command).await;
                        let _ = reply.send(result);
                    }
                    Some(ActorCommand::VoiceState(update)) => self.handle_voice_state(update),
                    Some(ActorCommand::Shutdown) | None => break,
                },
                Some(event) = self.timer_events.recv() => self.handle_timer(event),
            }
        }

        if let Some(handle) = self.running.take() {
            self.timers.cancel(handle);
        }
        tracing::info!(community = %self.community, "community actor stopped");
    }

    async fn handle_request(
        &mut self,
        actor: MemberId,
        channel: Option<ChannelId>,
        command: Command,
    ) -> Result<Committed, MatchError> {
        if let Command::Start { roster, move_mode } = &command {
            return self.start(actor, channel, roster, *move_mode).await;
        }

        let join_origin = self.join_origin(actor, &command).await;
        let ctx = Context {
            now: Instant::now(),
            warning_lead: self.config.warning_lead,
            channel,
            join_origin,
        };

        let (reply, transition) = self
            .store
            .mutate(|session| machine::apply(session, actor, &command, &ctx))
            .inspect_err(|error| {
                tracing::debug!(
                    community = %self.community,
                    %actor,
                    command = command.name(),
                    %error,
                    "command rejected"
                );
            })?;

        let effects = self.commit(transition);
        Ok(Committed {
            reply,
            report: self.enqueue(effects),
        })
    }

    /// For a self-move that would join the match, where the member is
    /// now. A failed lookup counts as "not in voice".
    async fn join_origin(&self, actor: MemberId, command: &Command) -> Option<ChannelId> {
        let Command::Move { target, .. } = command else {
            return None;
        };
        let session = self.store.current()?;
        if !session.would_join(actor, target.unwrap_or(actor)) {
            return None;
        }
        bounded(
            self.config.platform_timeout,
            "voice_location",
            self.platform.voice_location(self.community, actor),
        )
        .await
        .unwrap_or_else(|error| {
            tracing::warn!(community = %self.community, %actor, %error, "voice lookup failed");
            None
        })
    }

    /// Start runs its platform work here, inside the actor, so two starts
    /// for one community can't both pass the vacancy check.
    async fn start(
        &mut self,
        owner: MemberId,
        announce: Option<ChannelId>,
        roster: &RosterSpec,
        move_mode: MoveMode,
    ) -> Result<Committed, MatchError> {
        self.store.ensure_vacant()?;
        let teams = plan_roster(roster, self.config.roster_limits())?;
        // Origins are read from the platform, so the last match's cleanup
        // has to land first.
        self.drain_effects().await;
        let community = self.community;
        let limit = self.config.platform_timeout;
        let platform = Arc::clone(&self.platform);

        let members: Vec<MemberId> = teams.values().flatten().copied().collect();
        let lookups = members.iter().map(|member| {
            bounded(
                limit,
                "voice_location",
                platform.voice_location(community, *member),
            )
        });
        let mut origins = HashMap::new();
        for (member, location) in members.iter().zip(join_all(lookups).await) {
            origins.insert(*member, location?);
        }

        let suffix: u16 = rand::rng().random_range(1000..=9999);
        let name = format!("{}-{suffix}", self.config.channel_prefix);
        let labels: Vec<TeamLabel> = teams.keys().cloned().collect();
        let channels = bounded(
            limit,
            "create_channels",
            platform.create_channels(community, &name, &labels),
        )
        .await?;

        let seed = SessionSeed {
            id: SessionStore::next_session_id(),
            community,
            owner,
            move_mode,
            channels: channels.clone(),
            teams,
            origins: origins.clone(),
            announce,
            created_at: Instant::now(),
        };
        let (session, relocations) = match machine::begin(seed) {
            Ok(begun) => begun,
            Err(error) => {
                self.roll_back(&channels, &[], &origins).await;
                return Err(error.into());
            }
        };

        let moves: Vec<(MemberId, Option<ChannelId>)> = relocations
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Relocate { member, to } => Some((member, to)),
                _ => None,
            })
            .collect();
        let results = join_all(moves.iter().map(|(member, to)| {
            bounded(limit, "relocate", platform.relocate(community, *member, *to))
        }))
        .await;

        let mut moved = Vec::new();
        let mut first_error = None;
        for ((member, _), result) in moves.iter().zip(results) {
            match result {
                Ok(()) => moved.push(*member),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        if let Some(error) = first_error {
            tracing::warn!(%community, %error, moved = moved.len(), "start failed, rolling back");
            self.roll_back(&channels, &moved, &origins).await;
            return Err(error.into());
        }

        let session = self.store.create(session)?;
        tracing::info!(
            %community,
            session = %session.id(),
            name = %session.channels().name,
            participants = session.participants().len(),
            "match started"
        );
        Ok(Committed::done(machine::started_reply(session)))
    }

    /// Undoes a half-done start: members already moved go back, then the
    /// channels are deleted. Failures here are only logged.
    async fn roll_back(
        &self,
        channels: &MatchChannels,
        moved: &[MemberId],
        origins: &HashMap<MemberId, Option<ChannelId>>,
    ) {
        let effects = moved
            .iter()
            .map(|member| Effect::Relocate {
                member: *member,
                to: origins.get(member).copied().flatten(),
            })
            .chain([Effect::DeleteChannels(channels.clone())])
            .collect();
        let failures = execute(
            &*self.platform,
            self.community,
            self.config.platform_timeout,
            effects,
        )
        .await;
        if !failures.is_empty() {
            tracing::warn!(
                community = %self.community,
                failed = failures.len(),
                "rollback left platform leftovers"
            );
        }
    }

    fn handle_voice_state(&mut self, update: VoiceStateUpdate) {
        if !self.store.is_active() {
            return;
        }
        let VoiceStateUpdate {
            member,
            before,
            after,
            ..
        } = update;
        let result = self.store.mutate(|session| {
            Ok(machine::on_voice_state(
                session,
                member,
                before,
                after,
                |candidates| candidates.choose(&mut rand::rng()).copied(),
            ))
        });
        if let Ok(transition) = result {
            let effects = self.commit(transition);
            self.enqueue(effects);
        }
    }

    fn handle_timer(&mut self, event: TimerEvent<TimerTag>) {
        let signal = match event.kind {
            TimerEventKind::Warning { .. } => TimerSignal::Warning,
            TimerEventKind::Expiry => TimerSignal::Expiry,
        };
        let ctx = Context::at(Instant::now(), self.config.warning_lead);
        let applied = self
            .store
            .mutate(|session| Ok(machine::on_timer(session, event.tag, signal, &ctx)));

        match applied {
            Ok(Some(transition)) => {
                if signal == TimerSignal::Expiry {
                    self.running = None;
                }
                let effects = self.commit(transition);
                self.enqueue(effects);
            }
            _ => tracing::debug!(community = %self.community, tag = ?event.tag, "stale timer event dropped"),
        }
    }

    /// Applies timer effects and session removal; returns the effects
    /// meant for the platform.
    fn commit(&mut self, transition: Transition) -> Vec<Effect> {
        let mut platform = Vec::with_capacity(transition.effects.len());
        for effect in transition.effects {
            match effect {
                Effect::ArmTimer { tag, deadline } => {
                    self.running = Some(self.timers.arm(tag, deadline));
                }
                Effect::CancelTimer => {
                    if let Some(handle) = self.running.take() {
                        self.timers.cancel(handle);
                    }
                }
                other => platform.push(other),
            }
        }

        if transition.ended {
            if let Some(handle) = self.running.take() {
                self.timers.cancel(handle);
            }
            self.store.destroy();
        }
        platform
    }

    /// Queues effects behind everything committed before them. The
    /// receiver reports the failures; dropping it doesn't stop the work.
    fn enqueue(&self, effects: Vec<Effect>) -> Option<oneshot::Receiver<Vec<FailedOperation>>> {
        if effects.is_empty() {
            return None;
        }
        let (report, failures) = oneshot::channel();
        let job = EffectJob {
            effects,
            report: Some(report),
        };
        if self.jobs.send(job).is_err() {
            tracing::error!(community = %self.community, "effect worker gone, effects dropped");
            return None;
        }
        Some(failures)
    }

    /// Waits until every effect queued so far has run.
    async fn drain_effects(&self) {
        let (report, done) = oneshot::channel();
        let barrier = EffectJob {
            effects: Vec::new(),
            report: Some(report),
        };
        if self.jobs.send(barrier).is_ok() {
            let _ = done.await;
        }
    }
}
