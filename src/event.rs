//! Lifecycle events, status reports, and the sink they flow through.
//!
//! The engine does not know who consumes its output.  It talks to an
//! [`EventSink`] with two logical channels — entity lifecycle and fetch
//! status — and the integration layer decides where those go.  The provided
//! [`ChannelSink`] forwards everything over a std [`mpsc`] channel as
//! [`FeedMsg`] values, which is all the bundled binary needs.

use std::sync::{mpsc, Mutex};

use chrono::{DateTime, Utc};

/// A single observed state change, emitted at most once per change.
///
/// Carries only the external ID; consumers that need the payload look it up
/// in the engine's store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The entry appeared for the first time.
    Created(String),
    /// The entry is still present but its payload changed.
    Updated(String),
    /// The entry disappeared from the feed.
    Removed(String),
}

impl LifecycleEvent {
    /// The external ID this event is about.
    pub fn external_id(&self) -> &str {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Removed(id) => id,
        }
    }
}

/// Outcome of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Error,
}

/// The result of the most recent reconcile attempt.
///
/// Overwritten on every attempt, success or failure — never accumulated.
/// A sustained outage is visible only as repeated `Error` reports (plus the
/// growing `consecutive_failures` streak); no entry data is evicted because
/// of failures alone.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub outcome: FetchOutcome,
    /// When this attempt finished.
    pub last_update: DateTime<Utc>,
    /// Entries in the store after the cycle.  `None` on failure.
    pub total: Option<usize>,
    pub created: Option<usize>,
    pub updated: Option<usize>,
    pub removed: Option<usize>,
    /// Human-readable fetch error, on failure.
    pub error: Option<String>,
    /// Failed attempts since the last success.  Zero on success.
    pub consecutive_failures: u32,
}

impl StatusInfo {
    pub fn success(total: usize, created: usize, updated: usize, removed: usize) -> Self {
        Self {
            outcome: FetchOutcome::Success,
            last_update: Utc::now(),
            total: Some(total),
            created: Some(created),
            updated: Some(updated),
            removed: Some(removed),
            error: None,
            consecutive_failures: 0,
        }
    }

    pub fn error(message: impl Into<String>, consecutive_failures: u32) -> Self {
        Self {
            outcome: FetchOutcome::Error,
            last_update: Utc::now(),
            total: None,
            created: None,
            updated: None,
            removed: None,
            error: Some(message.into()),
            consecutive_failures,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == FetchOutcome::Success
    }
}

/// Where the engine sends its output.
///
/// Implementations receive calls from the scheduler's background thread
/// while the engine is shared across threads, so they must be
/// `Send + Sync`.  Both methods are fire-and-forget: the engine neither
/// retries nor observes delivery.
pub trait EventSink: Send + Sync {
    /// An entity lifecycle change.
    fn lifecycle(&self, event: LifecycleEvent);

    /// The outcome of a reconcile attempt (every attempt, pass or fail).
    fn status(&self, status: StatusInfo);
}

/// Messages a [`ChannelSink`] sends to its receiver.
#[derive(Debug, Clone)]
pub enum FeedMsg {
    Lifecycle(LifecycleEvent),
    Status(StatusInfo),
}

/// An [`EventSink`] that forwards everything over a std [`mpsc`] channel.
///
/// If the receiver has been dropped the consumer is gone (normally because
/// the process is shutting down) and sends are silently discarded.
pub struct ChannelSink {
    // `Sender` is !Sync, and the sink has to be shareable across threads.
    tx: Mutex<mpsc::Sender<FeedMsg>>,
}

impl ChannelSink {
    /// Create a sink and the receiver the consumer should drain.
    pub fn new() -> (Self, mpsc::Receiver<FeedMsg>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }

    fn send(&self, msg: FeedMsg) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(msg);
        }
    }
}

impl EventSink for ChannelSink {
    fn lifecycle(&self, event: LifecycleEvent) {
        self.send(FeedMsg::Lifecycle(event));
    }

    fn status(&self, status: StatusInfo) {
        self.send(FeedMsg::Status(status));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
