//! GeoNet NZ quake feed source.
//!
//! Fetches the GeoNet quake GeoJSON endpoint over HTTP and normalises its
//! features into [`FeedEntry`] values.  This module shows how to implement
//! the [`FeedSource`] trait for a concrete feed format — use it as a template
//! when adding another hazard feed.
//!
//! ## Filtering
//!
//! The endpoint only filters by MMI server-side; everything else happens
//! here after decoding:
//!
//! * entries farther than the configured radius from home are dropped,
//! * entries below the configured minimum magnitude are dropped,
//! * entries older than seven days are dropped (undated entries are kept —
//!   the source cannot tell how old they are).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{FeedEntry, FeedSource, FetchError};
use crate::config::FeedConfig;

/// GeoNet quake endpoint; the MMI threshold is appended as a query parameter.
const GEONET_API_URL: &str = "https://api.geonet.org.nz/quake";

/// Entries older than this are dropped during parsing.
const FILTER_WINDOW_DAYS: i64 = 7;

/// Mean Earth radius used for the great-circle distance, in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

// ---------------------------------------------------------------------------
// Wire format (GeoJSON subset)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// GeoJSON order: longitude first, then latitude.
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(rename = "publicID")]
    public_id: String,
    time: Option<String>,
    #[serde(default)]
    depth: f64,
    #[serde(default)]
    magnitude: f64,
    #[serde(default)]
    mmi: i8,
    #[serde(default)]
    locality: String,
    quality: Option<String>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A GeoNet NZ quake feed source.
///
/// Configured once from a validated [`FeedConfig`]; each [`fetch`] performs
/// one HTTP request with the configured timeout and returns the complete
/// filtered snapshot.
///
/// [`fetch`]: FeedSource::fetch
pub struct GeonetSource {
    url: String,
    home_latitude: f64,
    home_longitude: f64,
    radius_km: f64,
    minimum_magnitude: f64,
    mmi: i8,
    timeout: Duration,
}

impl GeonetSource {
    /// Create a source from a validated config.
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            url: GEONET_API_URL.to_string(),
            home_latitude: config.latitude,
            home_longitude: config.longitude,
            radius_km: config.radius_km(),
            minimum_magnitude: config.minimum_magnitude,
            mmi: config.mmi,
            timeout: config.fetch_timeout,
        }
    }

    /// Override the endpoint URL (tests and self-hosted mirrors).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Parse an already-fetched GeoJSON body into filtered [`FeedEntry`]s.
    ///
    /// This is a pure function (no I/O, `now` passed in) so that tests can
    /// exercise the decoding and filtering logic without hitting the network.
    pub fn parse_body(&self, body: &str, now: DateTime<Utc>) -> Result<Vec<FeedEntry>, FetchError> {
        let collection: FeatureCollection = serde_json::from_str(body)?;
        let cutoff = now - ChronoDuration::days(FILTER_WINDOW_DAYS);

        let entries = collection
            .features
            .into_iter()
            .filter_map(|feature| {
                // GeoJSON coordinate order is [longitude, latitude].
                let longitude = *feature.geometry.coordinates.first()?;
                let latitude = *feature.geometry.coordinates.get(1)?;

                let time = feature
                    .properties
                    .time
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|dt| dt.with_timezone(&Utc));

                let distance_km = haversine_km(
                    self.home_latitude,
                    self.home_longitude,
                    latitude,
                    longitude,
                );

                Some(FeedEntry {
                    external_id: feature.properties.public_id,
                    locality: feature.properties.locality,
                    magnitude: feature.properties.magnitude,
                    mmi: feature.properties.mmi,
                    depth_km: feature.properties.depth,
                    latitude,
                    longitude,
                    distance_km,
                    time,
                    quality: feature.properties.quality,
                })
            })
            .filter(|entry| entry.distance_km <= self.radius_km)
            .filter(|entry| entry.magnitude >= self.minimum_magnitude)
            .filter(|entry| entry.time.map(|t| t >= cutoff).unwrap_or(true))
            .collect();

        Ok(entries)
    }
}

impl FeedSource for GeonetSource {
    fn name(&self) -> &str {
        "geonet"
    }

    fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("quakewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let body = client
            .get(&self.url)
            .query(&[("MMI", self.mmi.to_string())])
            .send()?
            .error_for_status()?
            .text()?;

        let entries = self.parse_body(&body, Utc::now())?;
        debug!(count = entries.len(), "fetched geonet snapshot");
        Ok(entries)
    }
}

/// Great-circle distance between two coordinates, in kilometres.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
