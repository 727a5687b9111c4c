use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use matchkeep::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Console platform
// ---------------------------------------------------------------------------

/// Prints every platform call and keeps just enough voice state to make
/// origins meaningful.
#[derive(Default)]
struct ConsolePlatform {
    voice: Mutex<HashMap<MemberId, ChannelId>>,
    next_channel: Mutex<u64>,
}

impl ConsolePlatform {
    fn put(&self, member: MemberId, channel: ChannelId) {
        if let Ok(mut voice) = self.voice.lock() {
            voice.insert(member, channel);
        }
    }
}

impl Platform for ConsolePlatform {
    async fn voice_location(
        &self,
        _community: CommunityId,
        member: MemberId,
    ) -> Result<Option<ChannelId>, PlatformError> {
        let voice = self.voice.lock().map_err(|_| PlatformError::Other("poisoned".into()))?;
        Ok(voice.get(&member).copied())
    }

    async fn create_channels(
        &self,
        community: CommunityId,
        name: &str,
        teams: &[TeamLabel],
    ) -> Result<MatchChannels, PlatformError> {
        let mut next = self
            .next_channel
            .lock()
            .map_err(|_| PlatformError::Other("poisoned".into()))?;
        *next += 100;
        let base = *next;
        println!("[{community}] create category {name:?} with lobby + {} teams", teams.len());
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
        community: CommunityId,
        member: MemberId,
        to: Option<ChannelId>,
    ) -> Result<(), PlatformError> {
        let mut voice = self.voice.lock().map_err(|_| PlatformError::Other("poisoned".into()))?;
        match to {
            Some(channel) => {
                println!("[{community}] move {member} -> {channel}");
                voice.insert(member, channel);
            }
            None => {
                println!("[{community}] disconnect {member}");
                voice.remove(&member);
            }
        }
        Ok(())
    }

    async fn delete_channels(
        &self,
        community: CommunityId,
        channels: &MatchChannels,
    ) -> Result<(), PlatformError> {
        println!("[{community}] delete {} ({})", channels.name, channels.category);
        Ok(())
    }

    async fn notify(&self, community: CommunityId, notice: &Notice) -> Result<(), PlatformError> {
        let body = serde_json::to_string(&notice.body).unwrap_or_default();
        println!("[{community}] notify {:?}: {body}", notice.audience);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

const GUILD: CommunityId = CommunityId(1);
const TEXT: ChannelId = ChannelId(42);
const HOST: MemberId = MemberId(1);

fn say(actor: MemberId, command: Command) -> Request {
    Request {
        community: GUILD,
        actor,
        channel: Some(TEXT),
        command,
    }
}

async fn run(dispatcher: &Dispatcher<ConsolePlatform>, request: Request) {
    let name = request.command.name();
    match dispatcher.handle(request).await {
        Ok(outcome) => {
            let reply = serde_json::to_string(&outcome.reply).unwrap_or_default();
            println!("> {name}: {reply}");
            for failure in outcome.failures {
                println!("  ! {:?}: {}", failure.operation, failure.error);
            }
        }
        Err(error) => println!("> {name}: {} ({error})", serde_json::json!(error.code())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => CoordinatorConfig::from_json(&std::fs::read(path)?)?,
        None => CoordinatorConfig::default(),
    };

    let platform = ConsolePlatform::default();
    let players: Vec<MemberId> = (10..16).map(MemberId).collect();
    for (member, channel) in players.iter().zip([7, 7, 8]) {
        platform.put(*member, ChannelId(channel));
    }
    let dispatcher = Dispatcher::new(platform, config);

    run(
        &dispatcher,
        say(
            HOST,
            Command::Start {
                roster: RosterSpec::Shuffle {
                    pool: players.clone(),
                    teams: Some(2),
                },
                move_mode: MoveMode::Allow,
            },
        ),
    )
    .await;
    run(&dispatcher, say(MemberId(20), Command::Move { target: None, team: TeamLabel::numbered(1) })).await;
    run(&dispatcher, say(HOST, Command::Swap { user1: players[0], user2: players[1] })).await;
    run(&dispatcher, say(HOST, Command::Lock)).await;
    run(&dispatcher, say(players[2], Command::Move { target: None, team: TeamLabel::numbered(2) })).await;
    run(&dispatcher, say(HOST, Command::Unlock)).await;
    run(&dispatcher, say(HOST, Command::Status)).await;

    run(
        &dispatcher,
        say(
            HOST,
            Command::TimerStart {
                duration: "2s".parse()?,
                auto_end: false,
            },
        ),
    )
    .await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    run(&dispatcher, say(players[3], Command::End)).await;
    run(&dispatcher, say(players[4], Command::End)).await;
    run(
        &dispatcher,
        say(HOST, Command::ApprovalDecision { decision: Decision::Approve }),
    )
    .await;
    run(&dispatcher, say(HOST, Command::Status)).await;

    dispatcher.shutdown().await;
    tracing::info!("script finished");
    Ok(())
}
