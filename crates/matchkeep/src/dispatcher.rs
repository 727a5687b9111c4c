//! The command dispatcher: the entry point for everything a platform
//! adapter feeds in.
//!
//! It ties the layers together: protocol → community actor (policy,
//! state machine, store, timer) → platform effects.

use std::collections::HashMap;
use std::sync::Arc;

use matchkeep_protocol::{
    Codec, Command, CommunityId, ErrorCode, FailedOperation, Inbound, JsonCodec, Reply, Request,
    Response, VoiceStateUpdate,
};
use matchkeep_session::SessionError;
use tokio::sync::Mutex;

use crate::actor::{CommunityHandle, spawn_community};
use crate::{CoordinatorConfig, MatchError, Platform};

/// What a committed request produced: the reply, plus every platform
/// operation that failed afterwards. Failures don't undo the transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    pub failures: Vec<FailedOperation>,
}

impl Outcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl From<Outcome> for Response {
    fn from(outcome: Outcome) -> Self {
        Response::Ok {
            reply: outcome.reply,
            failures: outcome.failures,
        }
    }
}

impl From<MatchError> for Response {
    fn from(error: MatchError) -> Self {
        Response::Error {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Routes requests to per-community actors and runs the resulting
/// platform effects.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = Dispatcher::new(my_platform, CoordinatorConfig::default());
/// let outcome = dispatcher.handle(request).await?;
/// ```
pub struct Dispatcher<P: Platform> {
    platform: Arc<P>,
    config: Arc<CoordinatorConfig>,
    /// Community actors, spawned on first use.
    communities: Mutex<HashMap<CommunityId, CommunityHandle>>,
    codec: JsonCodec,
}

impl<P: Platform> Dispatcher<P> {
    /// Creates a dispatcher. `config` is validated first.
    pub fn new(platform: P, config: CoordinatorConfig) -> Self {
        Self::with_shared(Arc::new(platform), config)
    }

    /// Like [`new`](Self::new), for a platform the caller keeps a handle to.
    pub fn with_shared(platform: Arc<P>, config: CoordinatorConfig) -> Self {
        Self {
            platform,
            config: Arc::new(config.validated()),
            communities: Mutex::new(HashMap::new()),
            codec: JsonCodec,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Returns the community's actor. Only a start spawns one; for any
    /// other command a community without a live actor has no session.
    async fn community(&self, community: CommunityId, spawn: bool) -> Option<CommunityHandle> {
        let mut communities = self.communities.lock().await;
        match communities.get(&community) {
            Some(handle) if !handle.is_closed() => Some(handle.clone()),
            _ if !spawn => None,
            _ => {
                communities.retain(|_, handle| !handle.is_closed());
                let handle = spawn_community(
                    community,
                    Arc::clone(&self.platform),
                    Arc::clone(&self.config),
                );
                communities.insert(community, handle.clone());
                Some(handle)
            }
        }
    }

    /// Handles one member request.
    ///
    /// The transition is committed before any platform effect runs;
    /// effects then run in commit order, each bounded by the platform
    /// timeout. Dropping the returned future doesn't cancel them.
    ///
    /// # Errors
    /// Authorization and validation failures (nothing changed), platform
    /// failures during a start (rolled back), or an unavailable actor.
    pub async fn handle(&self, request: Request) -> Result<Outcome, MatchError> {
        let Request {
            community,
            actor,
            channel,
            command,
        } = request;

        let starts = matches!(command, Command::Start { .. });
        let handle = self
            .community(community, starts)
            .await
            .ok_or(SessionError::NoActiveSession)?;
        let committed = handle.request(actor, channel, command).await?;
        let failures = match committed.report {
            Some(report) => report
                .await
                .map_err(|_| MatchError::Unavailable(community))?,
            None => Vec::new(),
        };

        Ok(Outcome {
            reply: committed.reply,
            failures,
        })
    }

    /// Feeds a voice-state change to the community's actor. Communities
    /// that never had an actor have no match to react for.
    ///
    /// # Errors
    /// [`MatchError::Unavailable`] if the actor stopped.
    pub async fn voice_state_changed(&self, update: VoiceStateUpdate) -> Result<(), MatchError> {
        let handle = self.communities.lock().await.get(&update.community).cloned();
        match handle {
            Some(handle) => handle.voice_state(update).await,
            None => Ok(()),
        }
    }

    /// Handles a decoded inbound message. Requests get a response;
    /// voice-state updates don't.
    pub async fn handle_inbound(&self, inbound: Inbound) -> Option<Response> {
        match inbound {
            Inbound::Request(request) => Some(match self.handle(request).await {
                Ok(outcome) => outcome.into(),
                Err(error) => error.into(),
            }),
            Inbound::VoiceState(update) => {
                if let Err(error) = self.voice_state_changed(update).await {
                    tracing::warn!(%error, "voice-state update not delivered");
                }
                None
            }
        }
    }

    /// Handles a JSON-encoded [`Inbound`] and returns the JSON-encoded
    /// [`Response`], if the message calls for one. Undecodable input gets
    /// a `PROTOCOL` error response.
    pub async fn handle_raw(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let response = match self.codec.decode::<Inbound>(bytes) {
            Ok(inbound) => self.handle_inbound(inbound).await?,
            Err(error) => {
                tracing::debug!(%error, "undecodable inbound message");
                Response::Error {
                    code: ErrorCode::Protocol,
                    message: error.to_string(),
                }
            }
        };

        match self.codec.encode(&response) {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                tracing::error!(%error, "failed to encode response");
                None
            }
        }
    }

    /// Stops every community actor. Running timers stop with them.
    pub async fn shutdown(&self) {
        let handles: Vec<CommunityHandle> = self
            .communities
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use matchkeep_protocol::{ChannelId, MemberId, MoveMode, Notice, RosterSpec, TeamLabel};

    use super::*;
    use crate::{MatchChannels, PlatformError};

    /// Every call succeeds and nobody is ever in voice.
    struct Vacant;

    impl Platform for Vacant {
        async fn voice_location(
            &self,
            _community: CommunityId,
            _member: MemberId,
        ) -> Result<Option<ChannelId>, PlatformError> {
            Ok(None)
        }

        async fn create_channels(
            &self,
            _community: CommunityId,
            name: &str,
            teams: &[TeamLabel],
        ) -> Result<MatchChannels, PlatformError> {
            Ok(MatchChannels {
                name: name.to_string(),
                category: ChannelId(1),
                lobby: ChannelId(2),
                teams: teams
                    .iter()
                    .zip(3..)
                    .map(|(label, id)| (label.clone(), ChannelId(id)))
                    .collect(),
            })
        }

        async fn relocate(
            &self,
            _community: CommunityId,
            _member: MemberId,
            _to: Option<ChannelId>,
        ) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn delete_channels(
            &self,
            _community: CommunityId,
            _channels: &MatchChannels,
        ) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn notify(
            &self,
            _community: CommunityId,
            _notice: &Notice,
        ) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn request(community: u64, command: Command) -> Request {
        Request {
            community: CommunityId(community),
            actor: MemberId(1),
            channel: None,
            command,
        }
    }

    async fn registered(dispatcher: &Dispatcher<Vacant>) -> usize {
        dispatcher.communities.lock().await.len()
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_a_start_spawns_an_actor() {
        let dispatcher = Dispatcher::new(Vacant, CoordinatorConfig::default());

        for id in 1..=50 {
            let error = dispatcher.handle(request(id, Command::Status)).await.unwrap_err();
            assert_eq!(error.code(), ErrorCode::NoActiveSession);
        }
        dispatcher
            .voice_state_changed(VoiceStateUpdate {
                community: CommunityId(7),
                member: MemberId(3),
                before: None,
                after: Some(ChannelId(9)),
            })
            .await
            .unwrap();
        assert_eq!(registered(&dispatcher).await, 0);

        let start = Command::Start {
            roster: RosterSpec::Explicit {
                teams: BTreeMap::from([
                    (TeamLabel::numbered(1), vec![MemberId(10)]),
                    (TeamLabel::numbered(2), vec![MemberId(11)]),
                ]),
            },
            move_mode: MoveMode::Deny,
        };
        let outcome = dispatcher.handle(request(1, start)).await.unwrap();
        assert!(matches!(outcome.reply, Reply::Started { .. }));
        assert_eq!(registered(&dispatcher).await, 1);

        dispatcher.shutdown().await;
        assert_eq!(registered(&dispatcher).await, 0);
    }
}
