//! Who may do what to a session.
//!
//! [`authorize`] is a pure function of the session, the actor, and the
//! requested [`Action`]. It checks rights and the lock; structural checks
//! (unknown team labels, same-team moves) belong to the state machine.

use matchkeep_protocol::{MemberId, MoveMode};

use crate::Session;

/// An operation on an existing session, as seen by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    End,
    Move { target: MemberId },
    Swap { user1: MemberId, user2: MemberId },
    Transfer { new_owner: MemberId },
    Lock,
    Unlock,
    Status,
    TimerStart,
    TimerStop,
    ResolveApproval,
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    SessionLocked,
    NoActiveSession,
    TargetNotInSession(MemberId),
    AlreadyPending(MemberId),
}

/// The policy's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Not refused, but the owner has to approve it first (end requests
    /// from non-owners).
    NeedsApproval,
    Deny(DenyReason),
}

/// Decides whether `actor` may perform `action` on `session`.
pub fn authorize(session: Option<&Session>, actor: MemberId, action: Action) -> Verdict {
    let Some(session) = session else {
        return Verdict::Deny(DenyReason::NoActiveSession);
    };
    let is_owner = session.is_owner(actor);

    let deny = |reason| Verdict::Deny(reason);

    match action {
        Action::Status => Verdict::Allow,

        Action::End => {
            if is_owner {
                Verdict::Allow
            } else if let Some(pending) = session.pending() {
                deny(DenyReason::AlreadyPending(pending.requested_by))
            } else {
                Verdict::NeedsApproval
            }
        }

        // The lock is checked before ownership: while locked nobody moves.
        Action::Move { target } => {
            if session.is_locked() {
                return deny(DenyReason::SessionLocked);
            }
            let self_move = target == actor;
            match session.move_mode() {
                MoveMode::Allow if self_move => Verdict::Allow,
                _ if !is_owner => deny(DenyReason::NotOwner),
                _ if !session.is_participant(target) => {
                    deny(DenyReason::TargetNotInSession(target))
                }
                _ => Verdict::Allow,
            }
        }

        Action::Swap { user1, user2 } => {
            if session.is_locked() {
                return deny(DenyReason::SessionLocked);
            }
            if !is_owner {
                return deny(DenyReason::NotOwner);
            }
            match [user1, user2].into_iter().find(|m| !session.is_participant(*m)) {
                Some(absent) => deny(DenyReason::TargetNotInSession(absent)),
                None => Verdict::Allow,
            }
        }

        Action::Transfer { new_owner } => {
            if !is_owner {
                deny(DenyReason::NotOwner)
            } else if !session.is_participant(new_owner) && new_owner != actor {
                deny(DenyReason::TargetNotInSession(new_owner))
            } else {
                Verdict::Allow
            }
        }

        Action::Lock
        | Action::Unlock
        | Action::TimerStart
        | Action::TimerStop
        | Action::ResolveApproval => {
            if is_owner {
                Verdict::Allow
            } else {
                deny(DenyReason::NotOwner)
            }
        }
    }
}

impl Verdict {
    /// `Allow` and `NeedsApproval` pass; `Deny` becomes an error.
    pub fn into_result(self) -> Result<Verdict, DenyReason> {
        match self {
            Verdict::Deny(reason) => Err(reason),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixtures::*;

    fn deny(reason: DenyReason) -> Verdict {
        Verdict::Deny(reason)
    }

    #[test]
    fn test_everything_without_a_session_is_no_active_session() {
        for action in [Action::Status, Action::End, Action::Lock, Action::TimerStop] {
            assert_eq!(
                authorize(None, OWNER, action),
                deny(DenyReason::NoActiveSession)
            );
        }
    }

    #[tokio::test]
    async fn test_status_is_open_to_anyone() {
        let s = session(MoveMode::Deny);
        assert_eq!(authorize(Some(&s), OUTSIDER, Action::Status), Verdict::Allow);
    }

    #[tokio::test]
    async fn test_end_by_owner_is_allowed_and_others_need_approval() {
        let s = session(MoveMode::Deny);
        assert_eq!(authorize(Some(&s), OWNER, Action::End), Verdict::Allow);
        assert_eq!(authorize(Some(&s), A, Action::End), Verdict::NeedsApproval);
    }

    #[tokio::test]
    async fn test_second_end_request_is_already_pending() {
        let mut s = session(MoveMode::Deny);
        s.pending = Some(crate::PendingApproval {
            requested_by: A,
            requested_at: tokio::time::Instant::now(),
            approver: OWNER,
        });
        assert_eq!(
            authorize(Some(&s), B, Action::End),
            deny(DenyReason::AlreadyPending(A))
        );
        // The owner can still end directly.
        assert_eq!(authorize(Some(&s), OWNER, Action::End), Verdict::Allow);
    }

    #[tokio::test]
    async fn test_allow_mode_self_moves() {
        let s = session(MoveMode::Allow);
        assert_eq!(authorize(Some(&s), A, Action::Move { target: A }), Verdict::Allow);
        // Joining is a self-move too.
        assert_eq!(
            authorize(Some(&s), OUTSIDER, Action::Move { target: OUTSIDER }),
            Verdict::Allow
        );
        assert_eq!(
            authorize(Some(&s), A, Action::Move { target: B }),
            deny(DenyReason::NotOwner)
        );
        assert_eq!(authorize(Some(&s), OWNER, Action::Move { target: B }), Verdict::Allow);
    }

    #[tokio::test]
    async fn test_deny_mode_moves_are_owner_only() {
        let s = session(MoveMode::Deny);
        assert_eq!(
            authorize(Some(&s), A, Action::Move { target: A }),
            deny(DenyReason::NotOwner)
        );
        assert_eq!(authorize(Some(&s), OWNER, Action::Move { target: D }), Verdict::Allow);
        assert_eq!(
            authorize(Some(&s), OWNER, Action::Move { target: OUTSIDER }),
            deny(DenyReason::TargetNotInSession(OUTSIDER))
        );
    }

    #[tokio::test]
    async fn test_lock_blocks_moves_and_swaps_for_everyone() {
        let mut s = session(MoveMode::Allow);
        s.locked = true;
        assert_eq!(
            authorize(Some(&s), A, Action::Move { target: A }),
            deny(DenyReason::SessionLocked)
        );
        assert_eq!(
            authorize(Some(&s), OWNER, Action::Move { target: A }),
            deny(DenyReason::SessionLocked)
        );
        assert_eq!(
            authorize(Some(&s), OWNER, Action::Swap { user1: A, user2: C }),
            deny(DenyReason::SessionLocked)
        );
        // Unlock and ending are exempt.
        assert_eq!(authorize(Some(&s), OWNER, Action::Unlock), Verdict::Allow);
        assert_eq!(authorize(Some(&s), OWNER, Action::End), Verdict::Allow);
    }

    #[tokio::test]
    async fn test_swap_requires_both_participants() {
        let s = session(MoveMode::Deny);
        assert_eq!(
            authorize(Some(&s), OWNER, Action::Swap { user1: A, user2: OUTSIDER }),
            deny(DenyReason::TargetNotInSession(OUTSIDER))
        );
        assert_eq!(
            authorize(Some(&s), A, Action::Swap { user1: A, user2: C }),
            deny(DenyReason::NotOwner)
        );
    }

    #[tokio::test]
    async fn test_transfer_target_must_be_participant() {
        let s = session(MoveMode::Deny);
        assert_eq!(
            authorize(Some(&s), OWNER, Action::Transfer { new_owner: C }),
            Verdict::Allow
        );
        assert_eq!(
            authorize(Some(&s), OWNER, Action::Transfer { new_owner: OUTSIDER }),
            deny(DenyReason::TargetNotInSession(OUTSIDER))
        );
        assert_eq!(
            authorize(Some(&s), C, Action::Transfer { new_owner: C }),
            deny(DenyReason::NotOwner)
        );
    }

    #[tokio::test]
    async fn test_owner_only_actions() {
        let s = session(MoveMode::Allow);
        for action in [
            Action::Lock,
            Action::Unlock,
            Action::TimerStart,
            Action::TimerStop,
            Action::ResolveApproval,
        ] {
            assert_eq!(authorize(Some(&s), OWNER, action), Verdict::Allow);
            assert_eq!(authorize(Some(&s), A, action), deny(DenyReason::NotOwner));
        }
    }

    #[test]
    fn test_into_result() {
        assert_eq!(Verdict::NeedsApproval.into_result(), Ok(Verdict::NeedsApproval));
        assert_eq!(
            Verdict::Deny(DenyReason::NotOwner).into_result(),
            Err(DenyReason::NotOwner)
        );
    }
}
