//! Runs committed platform effects against a [`Platform`].

use std::time::Duration;

use matchkeep_protocol::{CommunityId, FailedOperation, Operation};
use matchkeep_session::Effect;

use crate::platform::{Platform, bounded};

/// Executes `effects` in order, each bounded by `limit`.
///
/// A failed effect doesn't stop the ones after it; every failure is
/// returned. Timer effects belong to the actor and are skipped here.
pub(crate) async fn execute<P: Platform>(
    platform: &P,
    community: CommunityId,
    limit: Duration,
    effects: Vec<Effect>,
) -> Vec<FailedOperation> {
    let mut failures = Vec::new();

    for effect in effects {
        let (operation, result) = match effect {
            Effect::Relocate { member, to } => (
                Operation::Relocate { member, to },
                bounded(limit, "relocate", platform.relocate(community, member, to)).await,
            ),
            Effect::DeleteChannels(channels) => (
                Operation::DeleteChannels {
                    category: channels.category,
                },
                bounded(
                    limit,
                    "delete_channels",
                    platform.delete_channels(community, &channels),
                )
                .await,
            ),
            Effect::Notify(notice) => (
                Operation::Notify {
                    to: notice.audience,
                },
                bounded(limit, "notify", platform.notify(community, &notice)).await,
            ),
            Effect::ArmTimer { .. } | Effect::CancelTimer => continue,
        };

        if let Err(error) = result {
            tracing::warn!(%community, ?operation, %error, "platform operation failed");
            failures.push(FailedOperation {
                operation,
                error: error.to_string(),
            });
        }
    }

    failures
}
