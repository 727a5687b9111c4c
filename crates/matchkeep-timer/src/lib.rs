//! Match countdown timers for matchkeep.
//!
//! A [`TimerEngine`] arms one Tokio task per countdown. Each task emits at
//! most two [`TimerEvent`]s into the engine's channel:
//!
//! - `Warning` at `deadline - warning_lead`, only when the countdown was
//!   armed with more than `warning_lead` remaining;
//! - `Expiry` at `deadline`.
//!
//! Cancelling (or dropping) the [`TimerHandle`] aborts the task, so no
//! further events are produced. Events that were already queued before
//! the cancel are still delivered; every event carries the tag given at
//! arming time so the consumer can recognize and drop stale ones.
//!
//! # Integration
//!
//! The engine is meant to sit next to a command queue in an actor's
//! `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         Some(event) = timer_rx.recv() => {
//!             if event.tag == current_tag { /* apply */ }
//!         }
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`TimerEngine`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// How long before the deadline the warning fires. Zero disables
    /// warnings. Default: 5 minutes.
    pub warning_lead: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            warning_lead: Duration::from_secs(5 * 60),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What happened to an armed countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEventKind {
    /// The deadline is `remaining` away.
    Warning { remaining: Duration },
    /// The deadline has been reached.
    Expiry,
}

/// An event emitted by an armed countdown, tagged with the caller's tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent<T> {
    pub tag: T,
    pub kind: TimerEventKind,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A running countdown. Dropping it cancels the countdown.
#[must_use = "dropping a TimerHandle cancels the countdown"]
pub struct TimerHandle {
    task: JoinHandle<()>,
    deadline: Instant,
    warns: bool,
}

impl TimerHandle {
    /// When the expiry fires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether this countdown emits a warning before expiring.
    pub fn warns(&self) -> bool {
        self.warns
    }

    /// Whether both events have been emitted (or the task was aborted).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("deadline", &self.deadline)
            .field("warns", &self.warns)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Arms countdowns that report into a single event channel.
pub struct TimerEngine<T> {
    config: TimerConfig,
    events: mpsc::UnboundedSender<TimerEvent<T>>,
}

impl<T> TimerEngine<T>
where
    T: Clone + Send + fmt::Debug + 'static,
{
    /// Creates an engine that reports into `events`.
    pub fn new(config: TimerConfig, events: mpsc::UnboundedSender<TimerEvent<T>>) -> Self {
        Self { config, events }
    }

    /// Creates an engine together with the receiving end of its channel.
    pub fn channel(config: TimerConfig) -> (Self, mpsc::UnboundedReceiver<TimerEvent<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(config, tx), rx)
    }

    /// Whether a countdown armed now for `deadline` would warn first.
    pub fn would_warn(&self, deadline: Instant) -> bool {
        let lead = self.config.warning_lead;
        !lead.is_zero() && deadline.saturating_duration_since(Instant::now()) > lead
    }

    /// Arms a countdown that expires at `deadline`.
    ///
    /// Arming never touches other countdowns: replacing a running timer
    /// means cancelling its handle first.
    pub fn arm(&self, tag: T, deadline: Instant) -> TimerHandle {
        let lead = self.config.warning_lead;
        let warns = self.would_warn(deadline);
        let warn_at = warns.then(|| deadline - lead);
        let events = self.events.clone();

        debug!(
            ?tag,
            in_secs = deadline.saturating_duration_since(Instant::now()).as_secs(),
            warns,
            "timer armed"
        );

        let task = tokio::spawn(async move {
            if let Some(at) = warn_at {
                time::sleep_until(at).await;
                trace!(?tag, "timer warning");
                let _ = events.send(TimerEvent {
                    tag: tag.clone(),
                    kind: TimerEventKind::Warning { remaining: lead },
                });
            }
            time::sleep_until(deadline).await;
            trace!(?tag, "timer expired");
            let _ = events.send(TimerEvent {
                tag,
                kind: TimerEventKind::Expiry,
            });
        });

        TimerHandle {
            task,
            deadline,
            warns,
        }
    }

    /// Cancels a countdown. Events it has not emitted yet never will be.
    pub fn cancel(&self, handle: TimerHandle) {
        debug!(finished = handle.is_finished(), "timer cancelled");
        drop(handle);
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }
}
