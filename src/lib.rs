//! quakewatch — periodic feed reconciliation.
//!
//! Polls a geo feed on a fixed interval, diffs each snapshot against the
//! previously known entry set, and emits one lifecycle event per observed
//! change.  A fetch failure is reported as an error status and otherwise
//! changes nothing; the known set survives until the next successful fetch.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐  tick   ┌───────────┐  fetch()  ┌───────────┐
//! │ sched.rs │ ──────► │ engine.rs │ ────────► │ source/   │
//! │ (thread) │         │ (diff +   │           │ (GeoNet)  │
//! └──────────┘         │  emit)    │           └───────────┘
//!                      └─────┬─────┘
//!                            │ EventSink
//!                            ▼
//!                      ┌───────────┐
//!                      │ consumer  │
//!                      └───────────┘
//! ```
//!
//! * **`source/`** — the [`FeedSource`] trait and concrete implementations
//!   (currently GeoNet NZ only).
//! * **`store`** — the last-known entry set and snapshot diffing.
//! * **`event`** — lifecycle/status types and the [`EventSink`] seam.
//! * **`engine`** — one reconcile cycle: fetch, diff, emit, report.
//! * **`sched`** — fires the engine on a fixed interval, cancellable.
//! * **`config`** — per-feed configuration, validated once at construction.
//!
//! One [`Engine`] per configured feed; engines share nothing and may run in
//! parallel.  Within one engine, cycles never overlap.

pub mod config;
pub mod engine;
pub mod event;
pub mod sched;
pub mod source;
pub mod store;

pub use config::{ConfigError, FeedConfig, UnitSystem};
pub use engine::Engine;
pub use event::{ChannelSink, EventSink, FeedMsg, FetchOutcome, LifecycleEvent, StatusInfo};
pub use sched::Scheduler;
pub use source::{FeedEntry, FeedSource, FetchError, GeonetSource};
pub use store::{EntryStore, StoreDiff};
