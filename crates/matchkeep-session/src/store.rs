//! The session store: the single slot holding a community's match.
//!
//! # Concurrency note
//!
//! `SessionStore` is NOT thread-safe by itself. Each community's store
//! is owned by that community's actor task, which processes one command
//! or timer event at a time; that ownership is what serializes
//! transitions. Keeping the store a plain struct keeps it trivially
//! testable.

use std::sync::atomic::{AtomicU64, Ordering};

use matchkeep_protocol::{CommunityId, SessionId};

use crate::{Session, SessionError};

/// Counter for process-unique session ids.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Holds at most one [`Session`] for one community.
///
/// ```text
/// create() ──→ [Active] ──mutate()──→ [Active] ──destroy()──→ [Empty]
///    ▲                                                           │
///    └───────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug)]
pub struct SessionStore {
    community: CommunityId,
    current: Option<Session>,
}

impl SessionStore {
    pub fn new(community: CommunityId) -> Self {
        Self {
            community,
            current: None,
        }
    }

    /// Issues a fresh session id. Ids are never reused within a process.
    pub fn next_session_id() -> SessionId {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn community(&self) -> CommunityId {
        self.community
    }

    /// Fails with [`SessionError::AlreadyActive`] if a session exists.
    pub fn ensure_vacant(&self) -> Result<(), SessionError> {
        match &self.current {
            Some(existing) => Err(SessionError::AlreadyActive(existing.id())),
            None => Ok(()),
        }
    }

    /// Stores a new session.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyActive`] if one already exists; the
    /// existing session is left untouched.
    pub fn create(&mut self, session: Session) -> Result<&Session, SessionError> {
        self.ensure_vacant()?;
        tracing::info!(
            community = %self.community,
            session = %session.id(),
            owner = %session.owner(),
            "session created"
        );
        Ok(&*self.current.insert(session))
    }

    /// The active session.
    ///
    /// # Errors
    /// Returns [`SessionError::NoActiveSession`] if there is none.
    pub fn get(&self) -> Result<&Session, SessionError> {
        self.current.as_ref().ok_or(SessionError::NoActiveSession)
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Applies `transition` to the active session, all or nothing.
    ///
    /// The closure works on a copy. Only when it returns `Ok` does the
    /// copy replace the stored session; on `Err` the stored session is
    /// exactly as before.
    ///
    /// # Errors
    /// [`SessionError::NoActiveSession`] if there is no session, or
    /// whatever the closure returns.
    pub fn mutate<T>(
        &mut self,
        transition: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let current = self.current.as_ref().ok_or(SessionError::NoActiveSession)?;
        let mut working = current.clone();
        let out = transition(&mut working)?;
        self.current = Some(working);
        Ok(out)
    }

    /// Removes the session, returning it.
    pub fn destroy(&mut self) -> Option<Session> {
        let removed = self.current.take();
        if let Some(session) = &removed {
            tracing::info!(
                community = %self.community,
                session = %session.id(),
                "session destroyed"
            );
        }
        removed
    }
}
