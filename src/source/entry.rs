//! The core entry type shared across all feed sources.
//!
//! `FeedEntry` represents a single entry from any geo feed.  Every source
//! implementation converts its native format into `FeedEntry` values so the
//! store, engine, and scheduler can stay source-agnostic.
//!
//! ## For contributors
//!
//! If you are adding a new feed source you do **not** need to modify this
//! file unless your source requires extra fields.  Just construct `FeedEntry`
//! values in your source's `fetch()` implementation.

use chrono::{DateTime, Utc};

/// A single feed entry, normalised from any geo feed source.
///
/// ## Identity vs payload
///
/// `external_id` is the stable identity used for reconciliation; everything
/// else is the payload.  Two entries with the same `external_id` but any
/// differing payload field compare unequal, which is what flags them as an
/// update.  Equality is always a value comparison (`PartialEq`), never
/// identity — each fetch produces fresh `FeedEntry` values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// Stable identifier, unique within a source (e.g. the GeoNet publicID).
    pub external_id: String,

    /// Human-readable place description (e.g. "25 km east of Seddon").
    pub locality: String,

    /// Event magnitude.
    pub magnitude: f64,

    /// Modified Mercalli Intensity reported by the feed.
    pub mmi: i8,

    /// Focal depth in kilometres.
    pub depth_km: f64,

    /// Event latitude in degrees.
    pub latitude: f64,

    /// Event longitude in degrees.
    pub longitude: f64,

    /// Great-circle distance from the configured home coordinates, in
    /// kilometres.  Computed by the source at fetch time.
    pub distance_km: f64,

    /// When the event occurred.
    ///
    /// `None` means the feed did not provide a parseable time; such entries
    /// survive filtering (the source cannot tell how old they are).
    pub time: Option<DateTime<Utc>>,

    /// Feed quality flag, if the source provides one (e.g. "best", "preliminary").
    pub quality: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
