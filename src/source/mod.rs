//! Feed source abstraction layer.
//!
//! This module defines the [`FeedSource`] trait, the common [`FeedEntry`]
//! type, and the [`FetchError`] taxonomy.  Concrete source implementations
//! live in sub-modules (currently only [`geonet`]).
//!
//! ## For contributors — adding a new source
//!
//! 1. Create a new file in this directory (e.g. `usgs.rs`).
//! 2. Define a struct (e.g. `UsgsSource`) and implement [`FeedSource`] for it.
//! 3. Add `mod usgs;` below and re-export your struct in the `pub use` block.
//! 4. Construct an instance in `main.rs` and hand it to the engine.
//!
//! The reconciliation, event emission, and scheduling are all source-agnostic.

mod entry;
mod geonet;

// Re-export the public API of this module so callers can write
// `use crate::source::{FeedSource, FeedEntry, GeonetSource};`
pub use entry::FeedEntry;
pub use geonet::GeonetSource;

use thiserror::Error;

/// A failed fetch attempt.
///
/// All variants are recoverable: the engine converts them into an error
/// status report and tries again on the next tick.  A network timeout
/// surfaces as [`FetchError::Http`] like any other transport failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request failed (connection, status, or timeout).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not a valid feed payload.
    #[error("failed to decode feed payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any other source-specific failure.
    #[error("feed error: {0}")]
    Feed(String),
}

/// Trait that every feed source must implement.
///
/// The engine calls [`fetch()`](FeedSource::fetch) from the scheduler's
/// background thread while other threads may be using the engine's
/// accessors, so implementations must be `Send + Sync`.  A source is
/// configured once at construction and never mutated afterwards.
pub trait FeedSource: Send + Sync {
    /// Human-readable label used in log output.
    fn name(&self) -> &str;

    /// Fetch the current snapshot of entries.
    ///
    /// Implementations perform their own HTTP/IO work, decode the payload,
    /// and apply any source-level filters.  Each call returns the complete
    /// current set — the engine derives created/updated/removed from the
    /// difference between consecutive snapshots.
    fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError>;
}
