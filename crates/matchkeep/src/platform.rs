//! The platform collaborator: the chat service that hosts voice
//! locations and delivers messages.
//!
//! Matchkeep never talks to a chat service directly. It asks a
//! [`Platform`] implementation to look up, create, move, delete and
//! notify, and treats every call as fallible and possibly slow: each one
//! is bounded by [`CoordinatorConfig::platform_timeout`](crate::CoordinatorConfig).
//!
//! # Why return `impl Future + Send`?
//!
//! Effects run on spawned Tokio tasks, so the futures must be `Send`.
//! Implementors can still write plain `async fn` in their `impl` block.

use std::future::Future;
use std::time::Duration;

use matchkeep_protocol::{ChannelId, CommunityId, MemberId, Notice, TeamLabel};
use matchkeep_session::MatchChannels;

/// A failed platform call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The call didn't finish within the configured timeout.
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        operation: &'static str,
        after: Duration,
    },

    /// The bot lacks the rights for this operation.
    #[error("missing permission: {0}")]
    Forbidden(String),

    /// The member or location doesn't exist (anymore).
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else the platform reported.
    #[error("platform error: {0}")]
    Other(String),
}

/// What Matchkeep needs from the chat service.
///
/// # Example
///
/// ```rust
/// use std::collections::BTreeMap;
///
/// use matchkeep::{MatchChannels, Platform, PlatformError};
/// use matchkeep_protocol::{ChannelId, CommunityId, MemberId, Notice, TeamLabel};
///
/// /// Pretends everything works and nobody is ever in voice.
/// struct NullPlatform;
///
/// impl Platform for NullPlatform {
///     async fn voice_location(
///         &self,
///         _community: CommunityId,
///         _member: MemberId,
///     ) -> Result<Option<ChannelId>, PlatformError> {
///         Ok(None)
///     }
///
///     async fn create_channels(
///         &self,
///         _community: CommunityId,
///         name: &str,
///         teams: &[TeamLabel],
///     ) -> Result<MatchChannels, PlatformError> {
///         Ok(MatchChannels {
///             name: name.to_string(),
///             category: ChannelId(1),
///             lobby: ChannelId(2),
///             teams: teams
///                 .iter()
///                 .zip(3..)
///                 .map(|(label, id)| (label.clone(), ChannelId(id)))
///                 .collect::<BTreeMap<_, _>>(),
///         })
///     }
///
///     async fn relocate(
///         &self,
///         _community: CommunityId,
///         _member: MemberId,
///         _to: Option<ChannelId>,
///     ) -> Result<(), PlatformError> {
///         Ok(())
///     }
///
///     async fn delete_channels(
///         &self,
///         _community: CommunityId,
///         _channels: &MatchChannels,
///     ) -> Result<(), PlatformError> {
///         Ok(())
///     }
///
///     async fn notify(
///         &self,
///         _community: CommunityId,
///         _notice: &Notice,
///     ) -> Result<(), PlatformError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Platform: Send + Sync + 'static {
    /// The voice location `member` is connected to, if any.
    fn voice_location(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> impl Future<Output = Result<Option<ChannelId>, PlatformError>> + Send;

    /// Creates a category named `name` holding a lobby and one voice
    /// location per team label.
    fn create_channels(
        &self,
        community: CommunityId,
        name: &str,
        teams: &[TeamLabel],
    ) -> impl Future<Output = Result<MatchChannels, PlatformError>> + Send;

    /// Moves `member` into `to`; `None` disconnects them from voice.
    fn relocate(
        &self,
        community: CommunityId,
        member: MemberId,
        to: Option<ChannelId>,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Deletes every location in `channels`, category last.
    fn delete_channels(
        &self,
        community: CommunityId,
        channels: &MatchChannels,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Delivers a notice. Approval prompts carry their actions in the
    /// notice body; rendering them as buttons is up to the platform.
    fn notify(
        &self,
        community: CommunityId,
        notice: &Notice,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}

/// Runs `call`, failing with [`PlatformError::TimedOut`] after `limit`.
pub(crate) async fn bounded<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T, PlatformError>>,
) -> Result<T, PlatformError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(PlatformError::TimedOut {
            operation,
            after: limit,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_passes_results_through() {
        let ok = bounded(Duration::from_secs(1), "noop", async { Ok::<_, PlatformError>(7) });
        assert_eq!(ok.await, Ok(7));

        let err = bounded(Duration::from_secs(1), "noop", async {
            Err::<(), _>(PlatformError::Forbidden("move members".into()))
        });
        assert_eq!(
            err.await,
            Err(PlatformError::Forbidden("move members".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let slow = bounded(Duration::from_secs(10), "relocate", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, PlatformError>(())
        });
        assert_eq!(
            slow.await,
            Err(PlatformError::TimedOut {
                operation: "relocate",
                after: Duration::from_secs(10),
            })
        );
    }
}
