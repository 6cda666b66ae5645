//! The reconciliation engine.
//!
//! One [`Engine`] owns one feed instance: its source, its entry store, and
//! its sink.  Each [`reconcile`](Engine::reconcile) cycle fetches a snapshot,
//! diffs it against the store, emits lifecycle events for every observed
//! change, and reports the attempt's status — success or failure — to the
//! sink.  A fetch failure never escapes the cycle and never touches the
//! store; the engine just tries again on the next tick.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, FeedConfig};
use crate::event::{EventSink, LifecycleEvent, StatusInfo};
use crate::source::{FeedEntry, FeedSource};
use crate::store::EntryStore;

/// Reconciles a feed source against an in-memory entry store.
///
/// Engines for different sources are fully independent; within one engine,
/// cycles are serialized by an internal lock, so a `reconcile()` call racing
/// the scheduler (or another direct caller) waits instead of interleaving
/// with the in-flight cycle.
pub struct Engine {
    config: FeedConfig,
    source: Box<dyn FeedSource>,
    sink: Box<dyn EventSink>,
    store: EntryStore,
    last_status: Mutex<Option<StatusInfo>>,
    /// Failed attempts since the last success.
    failures: AtomicU32,
    /// Held for the duration of one reconcile cycle.
    cycle: Mutex<()>,
}

impl Engine {
    /// Build an engine for a configured source.
    ///
    /// The config is validated here; an invalid config means no engine
    /// exists, so nothing can ever be registered with a scheduler.
    pub fn new(
        config: FeedConfig,
        source: Box<dyn FeedSource>,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            sink,
            store: EntryStore::new(),
            last_status: Mutex::new(None),
            failures: AtomicU32::new(0),
            cycle: Mutex::new(()),
        })
    }

    /// The validated config this engine was built with.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// The entry store, for consumers that want to look up payloads when a
    /// lifecycle event arrives.
    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Look up an entry by external ID.
    pub fn entry(&self, external_id: &str) -> Option<FeedEntry> {
        self.store.get(external_id)
    }

    /// The status of the most recent reconcile attempt, if any.
    pub fn status_info(&self) -> Option<StatusInfo> {
        self.last_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run one reconcile cycle: fetch, diff, emit, report.
    ///
    /// Called by the scheduler on every tick, and directly by callers that
    /// want an immediate refresh (e.g. once at startup).  Never panics on a
    /// failed fetch and never returns an error — the outcome is the returned
    /// [`StatusInfo`], which is also forwarded to the sink.
    pub fn reconcile(&self) -> StatusInfo {
        let _cycle = self.cycle.lock().unwrap_or_else(|e| e.into_inner());

        let status = match self.source.fetch() {
            Ok(entries) => {
                let diff = self.store.replace_all(entries);

                // Category order matters downstream: a consumer must see an
                // entry created before it receives updates for it.  Order
                // within a category is unspecified.
                for id in &diff.added {
                    self.sink.lifecycle(LifecycleEvent::Created(id.clone()));
                }
                for id in &diff.changed {
                    self.sink.lifecycle(LifecycleEvent::Updated(id.clone()));
                }
                for id in &diff.removed {
                    self.sink.lifecycle(LifecycleEvent::Removed(id.clone()));
                }

                self.failures.store(0, Ordering::Relaxed);
                let status = StatusInfo::success(
                    self.store.len(),
                    diff.added.len(),
                    diff.changed.len(),
                    diff.removed.len(),
                );
                if diff.is_empty() {
                    debug!(
                        source = self.source.name(),
                        total = self.store.len(),
                        "reconcile complete, no changes"
                    );
                } else {
                    info!(
                        source = self.source.name(),
                        total = self.store.len(),
                        created = diff.added.len(),
                        updated = diff.changed.len(),
                        removed = diff.removed.len(),
                        "reconcile complete"
                    );
                }
                status
            }
            Err(e) => {
                let streak = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    source = self.source.name(),
                    error = %e,
                    consecutive_failures = streak,
                    "fetch failed, keeping previous entries"
                );
                StatusInfo::error(e.to_string(), streak)
            }
        };

        *self
            .last_status
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(status.clone());
        self.sink.status(status.clone());
        status
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChannelSink, FeedMsg, FetchOutcome};
    use crate::source::FetchError;
    use chrono::{TimeZone, Utc};
    use std::collections::{HashSet, VecDeque};
    use std::sync::mpsc::{Receiver, TryRecvError};
    use std::sync::Arc;

    fn make_entry(external_id: &str, magnitude: f64) -> FeedEntry {
        FeedEntry {
            external_id: external_id.to_string(),
            locality: "somewhere".to_string(),
            magnitude,
            mmi: 4,
            depth_km: 10.0,
            latitude: -41.0,
            longitude: 174.0,
            distance_km: 12.5,
            time: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
            quality: None,
        }
    }

    /// A source that plays back a fixed script of fetch results.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<FeedEntry>, FetchError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<FeedEntry>, FetchError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl FeedSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Feed("script exhausted".into())))
        }
    }

    fn engine_with_script(
        script: Vec<Result<Vec<FeedEntry>, FetchError>>,
    ) -> (Engine, Receiver<FeedMsg>) {
        let (sink, rx) = ChannelSink::new();
        let engine = Engine::new(
            FeedConfig::new(-41.29, 174.78),
            Box::new(ScriptedSource::new(script)),
            Box::new(sink),
        )
        .unwrap();
        (engine, rx)
    }

    /// Drain everything currently buffered in the sink channel.
    fn drain(rx: &Receiver<FeedMsg>) -> (Vec<LifecycleEvent>, Vec<StatusInfo>) {
        let mut events = Vec::new();
        let mut statuses = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(FeedMsg::Lifecycle(e)) => events.push(e),
                Ok(FeedMsg::Status(s)) => statuses.push(s),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        (events, statuses)
    }

    fn id_set(events: &[LifecycleEvent]) -> HashSet<String> {
        events.iter().map(|e| e.external_id().to_string()).collect()
    }

    // -- construction --------------------------------------------------------

    #[test]
    fn invalid_config_fails_construction() {
        let (sink, _rx) = ChannelSink::new();
        let result = Engine::new(
            FeedConfig::new(95.0, 0.0),
            Box::new(ScriptedSource::new(vec![])),
            Box::new(sink),
        );
        assert!(matches!(result, Err(ConfigError::LatitudeOutOfRange(_))));
    }

    // -- lifecycle scenarios -------------------------------------------------

    #[test]
    fn first_fetch_creates_all_entries() {
        let (engine, rx) =
            engine_with_script(vec![Ok(vec![make_entry("a", 4.0), make_entry("b", 5.0)])]);

        let status = engine.reconcile();

        let (events, statuses) = drain(&rx);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|e| matches!(e, LifecycleEvent::Created(_))));
        assert_eq!(id_set(&events), HashSet::from(["a".into(), "b".into()]));

        assert_eq!(statuses.len(), 1, "exactly one status per attempt");
        assert!(status.is_success());
        assert_eq!(status.total, Some(2));
        assert_eq!(status.created, Some(2));
    }

    #[test]
    fn identical_fetch_emits_no_events() {
        let snapshot = vec![make_entry("a", 4.0), make_entry("b", 5.0)];
        let (engine, rx) =
            engine_with_script(vec![Ok(snapshot.clone()), Ok(snapshot)]);

        engine.reconcile();
        drain(&rx);

        let status = engine.reconcile();
        let (events, statuses) = drain(&rx);

        assert!(events.is_empty(), "repeated identical fetches are idempotent");
        assert_eq!(statuses.len(), 1);
        assert!(status.is_success());
        assert_eq!(status.total, Some(2));
        assert_eq!(status.created, Some(0));
    }

    #[test]
    fn changed_payload_emits_single_update() {
        let (engine, rx) = engine_with_script(vec![
            Ok(vec![make_entry("a", 4.0), make_entry("b", 5.0)]),
            Ok(vec![make_entry("a", 4.7), make_entry("b", 5.0)]),
        ]);

        engine.reconcile();
        drain(&rx);

        let status = engine.reconcile();
        let (events, _) = drain(&rx);

        assert_eq!(events, vec![LifecycleEvent::Updated("a".into())]);
        assert_eq!(status.total, Some(2));
        assert_eq!(status.updated, Some(1));
    }

    #[test]
    fn missing_entry_emits_removal() {
        let (engine, rx) = engine_with_script(vec![
            Ok(vec![make_entry("a", 4.0), make_entry("b", 5.0)]),
            Ok(vec![make_entry("b", 5.0)]),
        ]);

        engine.reconcile();
        drain(&rx);

        let status = engine.reconcile();
        let (events, _) = drain(&rx);

        assert_eq!(events, vec![LifecycleEvent::Removed("a".into())]);
        assert_eq!(status.total, Some(1));
        assert_eq!(status.removed, Some(1));
        assert!(engine.entry("a").is_none());
        assert!(engine.entry("b").is_some());
    }

    #[test]
    fn categories_never_interleave() {
        // Second snapshot: "c" added, "a" changed, "b" removed.
        let (engine, rx) = engine_with_script(vec![
            Ok(vec![make_entry("a", 4.0), make_entry("b", 5.0)]),
            Ok(vec![make_entry("a", 4.9), make_entry("c", 3.0)]),
        ]);

        engine.reconcile();
        drain(&rx);

        engine.reconcile();
        let (events, _) = drain(&rx);

        assert_eq!(
            events,
            vec![
                LifecycleEvent::Created("c".into()),
                LifecycleEvent::Updated("a".into()),
                LifecycleEvent::Removed("b".into()),
            ],
            "all Created before all Updated before all Removed"
        );
    }

    // -- failure handling ----------------------------------------------------

    #[test]
    fn failed_fetch_leaves_store_untouched() {
        let (engine, rx) = engine_with_script(vec![
            Ok(vec![make_entry("a", 4.0), make_entry("b", 5.0)]),
            Err(FetchError::Feed("boom".into())),
        ]);

        engine.reconcile();
        drain(&rx);
        let ids_before: HashSet<String> = engine.store().external_ids().into_iter().collect();

        let status = engine.reconcile();
        let (events, statuses) = drain(&rx);

        assert!(events.is_empty(), "a failure emits no lifecycle events");
        assert_eq!(statuses.len(), 1, "exactly one error status");
        assert_eq!(status.outcome, FetchOutcome::Error);
        assert!(status.error.as_deref().unwrap().contains("boom"));

        let ids_after: HashSet<String> = engine.store().external_ids().into_iter().collect();
        assert_eq!(ids_before, ids_after, "no partial eviction on failure");
    }

    #[test]
    fn failure_streak_counts_and_resets() {
        let (engine, rx) = engine_with_script(vec![
            Err(FetchError::Feed("one".into())),
            Err(FetchError::Feed("two".into())),
            Ok(vec![make_entry("a", 4.0)]),
            Err(FetchError::Feed("three".into())),
        ]);

        assert_eq!(engine.reconcile().consecutive_failures, 1);
        assert_eq!(engine.reconcile().consecutive_failures, 2);
        assert_eq!(engine.reconcile().consecutive_failures, 0, "success resets");
        assert_eq!(engine.reconcile().consecutive_failures, 1);
        drain(&rx);
    }

    #[test]
    fn engine_recovers_after_failure() {
        let (engine, rx) = engine_with_script(vec![
            Err(FetchError::Feed("transient".into())),
            Ok(vec![make_entry("a", 4.0)]),
        ]);

        engine.reconcile();
        drain(&rx);

        let status = engine.reconcile();
        let (events, _) = drain(&rx);

        assert!(status.is_success());
        assert_eq!(events, vec![LifecycleEvent::Created("a".into())]);
    }

    #[test]
    fn status_info_tracks_latest_attempt() {
        let (engine, _rx) = engine_with_script(vec![
            Ok(vec![make_entry("a", 4.0)]),
            Err(FetchError::Feed("down".into())),
        ]);

        assert!(engine.status_info().is_none(), "nothing before the first attempt");

        engine.reconcile();
        assert!(engine.status_info().unwrap().is_success());

        engine.reconcile();
        let latest = engine.status_info().unwrap();
        assert_eq!(latest.outcome, FetchOutcome::Error, "overwritten, not accumulated");
    }

    // -- concurrency ---------------------------------------------------------

    /// A source that records how many fetches run at once.
    struct SlowSource {
        in_flight: std::sync::atomic::AtomicUsize,
        max_in_flight: std::sync::atomic::AtomicUsize,
    }

    impl SlowSource {
        fn new() -> Self {
            Self {
                in_flight: std::sync::atomic::AtomicUsize::new(0),
                max_in_flight: std::sync::atomic::AtomicUsize::new(0),
            }
        }
    }

    impl FeedSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![make_entry("a", 4.0), make_entry("b", 5.0)])
        }
    }

    #[test]
    fn concurrent_reconciles_serialize() {
        let (sink, rx) = ChannelSink::new();
        let source = Arc::new(SlowSource::new());

        struct Shared(Arc<SlowSource>);
        impl FeedSource for Shared {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
                self.0.fetch()
            }
        }

        let engine = Arc::new(
            Engine::new(
                FeedConfig::new(-41.29, 174.78),
                Box::new(Shared(source.clone())),
                Box::new(sink),
            )
            .unwrap(),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.reconcile())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            source.max_in_flight.load(Ordering::SeqCst),
            1,
            "cycles must not overlap"
        );
        assert_eq!(engine.store().len(), 2, "store holds exactly one snapshot");
        let (_, statuses) = drain(&rx);
        assert_eq!(statuses.len(), 4, "every attempt reported status");
    }
}
