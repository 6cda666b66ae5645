//! Periodic reconcile scheduling.
//!
//! Runs on a dedicated thread, firing [`Engine::reconcile`] at a fixed
//! interval.  The first tick fires after the first interval elapses — there
//! is no eager initial call; a caller that wants fresh data immediately
//! reconciles once itself before starting the scheduler.
//!
//! ## Overlap policy
//!
//! Ticks for one engine never overlap: the single scheduler thread does not
//! start waiting for the next tick until the current reconcile has returned,
//! so an interval that elapses mid-cycle is skipped rather than queued.
//! Direct `reconcile()` callers racing a tick serialize inside the engine.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::engine::Engine;

/// Handle for a running periodic schedule.
///
/// Dropping the handle stops the schedule: no further ticks are fired, but
/// an in-flight reconcile is allowed to finish (stopping never interrupts a
/// fetch).
pub struct Scheduler {
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start firing `engine.reconcile()` every `interval`.
    ///
    /// The first tick fires after `interval` elapses.
    pub fn start(engine: Arc<Engine>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            debug!(?interval, "scheduler started");
            loop {
                // The stop channel doubles as the timer: a timeout is a tick,
                // a message (or a dropped sender) is a stop request.
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        engine.reconcile();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("scheduler stopped");
                        return;
                    }
                }
            }
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Stop the schedule and wait for the scheduler thread to exit.
    ///
    /// If a reconcile is in flight, this blocks until it finishes; no new
    /// tick is fired after `stop` is called.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
