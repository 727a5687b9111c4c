//! Recording mock platform shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use matchkeep::prelude::*;

pub const OWNER: MemberId = MemberId(1);
pub const A: MemberId = MemberId(10);
pub const B: MemberId = MemberId(11);
pub const C: MemberId = MemberId(12);
pub const D: MemberId = MemberId(13);
pub const E: MemberId = MemberId(14);

pub const GUILD: CommunityId = CommunityId(1);
pub const OTHER_GUILD: CommunityId = CommunityId(2);
/// Where A sits before the match starts.
pub const A_ORIGIN: ChannelId = ChannelId(7);
/// The text location commands are issued from.
pub const TEXT: ChannelId = ChannelId(500);

/// One call the dispatcher made on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Created(String),
    Relocated(MemberId, Option<ChannelId>),
    Deleted(ChannelId),
    Notified(Notice),
}

#[derive(Default)]
struct MockState {
    voice: HashMap<MemberId, ChannelId>,
    calls: Vec<Call>,
    fail_relocate: HashSet<MemberId>,
    fail_create: bool,
    relocate_delay: Option<Duration>,
    next_channel: u64,
}

/// Records every call and keeps a tiny voice model. Failures are
/// injected per member or per operation.
#[derive(Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        let platform = Self::default();
        platform.put_in_voice(A, A_ORIGIN);
        Arc::new(platform)
    }

    pub fn put_in_voice(&self, member: MemberId, channel: ChannelId) {
        self.state.lock().unwrap().voice.insert(member, channel);
    }

    pub fn location(&self, member: MemberId) -> Option<ChannelId> {
        self.state.lock().unwrap().voice.get(&member).copied()
    }

    pub fn fail_relocations_of(&self, member: MemberId) {
        self.state.lock().unwrap().fail_relocate.insert(member);
    }

    /// Every relocation takes `delay` before it lands.
    pub fn slow_relocations(&self, delay: Duration) {
        self.state.lock().unwrap().relocate_delay = Some(delay);
    }

    pub fn fail_channel_creation(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Notified(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Deleted(_)))
            .count()
    }

    pub fn created_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Created(_)))
            .count()
    }
}

impl Platform for MockPlatform {
    async fn voice_location(
        &self,
        _community: CommunityId,
        member: MemberId,
    ) -> Result<Option<ChannelId>, PlatformError> {
        Ok(self.location(member))
    }

    async fn create_channels(
        &self,
        _community: CommunityId,
        name: &str,
        teams: &[TeamLabel],
    ) -> Result<MatchChannels, PlatformError> {
        // Give a concurrent request the chance to interleave.
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(PlatformError::Forbidden("manage channels".into()));
        }
        state.calls.push(Call::Created(name.to_string()));
        state.next_channel += 1000;
        let base = state.next_channel;
        Ok(MatchChannels {
            name: name.to_string(),
            category: ChannelId(base),
            lobby: ChannelId(base + 1),
            teams: teams
                .iter()
                .zip(2..)
                .map(|(label, offset)| (label.clone(), ChannelId(base + offset)))
                .collect::<BTreeMap<_, _>>(),
        })
    }

    async fn relocate(
        &self,
        _community: CommunityId,
        member: MemberId,
        to: Option<ChannelId>,
    ) -> Result<(), PlatformError> {
        let delay = self.state.lock().unwrap().relocate_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_relocate.contains(&member) {
            return Err(PlatformError::NotFound(format!("{member} is not in voice")));
        }
        state.calls.push(Call::Relocated(member, to));
        match to {
            Some(channel) => state.voice.insert(member, channel),
            None => state.voice.remove(&member),
        };
        Ok(())
    }

    async fn delete_channels(
        &self,
        _community: CommunityId,
        channels: &MatchChannels,
    ) -> Result<(), PlatformError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::Deleted(channels.category));
        Ok(())
    }

    async fn notify(&self, _community: CommunityId, notice: &Notice) -> Result<(), PlatformError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::Notified(notice.clone()));
        Ok(())
    }
}

pub fn dispatcher(platform: &Arc<MockPlatform>) -> Dispatcher<MockPlatform> {
    Dispatcher::with_shared(Arc::clone(platform), CoordinatorConfig::default())
}

pub fn request(actor: MemberId, command: Command) -> Request {
    Request {
        community: GUILD,
        actor,
        channel: Some(TEXT),
        command,
    }
}

pub fn team(n: usize) -> TeamLabel {
    TeamLabel::numbered(n)
}

/// team1 = {A, B}, team2 = {C, D}.
pub fn start_two_teams(move_mode: MoveMode) -> Command {
    Command::Start {
        roster: RosterSpec::Explicit {
            teams: BTreeMap::from([(team(1), vec![A, B]), (team(2), vec![C, D])]),
        },
        move_mode,
    }
}

pub fn move_to(target: MemberId, n: usize) -> Command {
    Command::Move {
        target: Some(target),
        team: team(n),
    }
}

/// Lets spawned effect tasks run to completion.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn code_of(result: Result<Outcome, MatchError>) -> ErrorCode {
    match result {
        Ok(outcome) => panic!("expected an error, got {:?}", outcome.reply),
        Err(error) => error.code(),
    }
}
