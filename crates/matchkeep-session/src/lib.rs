//! Match sessions for Matchkeep.
//!
//! This crate owns everything about a match that doesn't touch the
//! outside world:
//!
//! 1. **Model**: what a match is ([`Session`], [`MatchChannels`])
//! 2. **Store**: at most one match per community ([`SessionStore`])
//! 3. **Policy**: who may do what ([`authorize`])
//! 4. **State machine**: how commands and events change a match
//!    ([`machine`]), expressed as [`Effect`]s for the caller to execute
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← runs transitions, executes effects on the platform
//!     ↕
//! Session Layer (this crate)  ← decides, never performs
//!     ↕
//! Protocol Layer (below)  ← ids, commands, replies, notices
//! ```

mod error;
pub mod machine;
mod policy;
mod roster;
mod session;
mod store;

pub use error::SessionError;
pub use machine::{Context, Effect, TimerSignal, Transition};
pub use policy::{Action, DenyReason, Verdict, authorize};
pub use roster::{RosterLimits, plan_roster};
pub use session::{MatchChannels, PendingApproval, Session, SessionSeed, TimerState, TimerTag};
pub use store::SessionStore;
