//! Feed configuration and validation.
//!
//! A [`FeedConfig`] describes one configured feed instance: where "home" is,
//! how far out to look, which entries to keep, and how often to poll.  It is
//! validated once, at engine construction, and is immutable afterwards — a
//! bad value means the engine is never built, so it can never be registered
//! with a scheduler.

use std::time::Duration;

use thiserror::Error;

/// Kilometres per statute mile, for imperial radius conversion.
const KM_PER_MILE: f64 = 1.609_344;

/// Default search radius in kilometres.
pub const DEFAULT_RADIUS: f64 = 50.0;

/// Default minimum magnitude filter.
pub const DEFAULT_MINIMUM_MAGNITUDE: f64 = 0.0;

/// Default Modified Mercalli Intensity threshold requested from the feed.
pub const DEFAULT_MMI: i8 = 3;

/// Default poll interval.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(300);

/// Default per-fetch network timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by [`FeedConfig::validate`].
///
/// These are fatal: a config that fails validation never produces an engine.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
    #[error("radius {0} must be greater than zero")]
    InvalidRadius(f64),
    #[error("minimum magnitude {0} must not be negative")]
    InvalidMinimumMagnitude(f64),
    #[error("MMI {0} is outside -1..=8")]
    MmiOutOfRange(i8),
    #[error("scan interval must be greater than zero")]
    ZeroScanInterval,
    #[error("fetch timeout must be greater than zero")]
    ZeroFetchTimeout,
}

/// Unit system the radius was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    Metric,
    Imperial,
}

/// Configuration for one feed instance.
///
/// `radius` is interpreted in kilometres under [`UnitSystem::Metric`] and in
/// miles under [`UnitSystem::Imperial`]; [`FeedConfig::radius_km`] always
/// returns kilometres, which is what the feed filtering works in.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Latitude of the home coordinates, in degrees.
    pub latitude: f64,
    /// Longitude of the home coordinates, in degrees.
    pub longitude: f64,
    /// Search radius around the home coordinates (km or miles, see above).
    pub radius: f64,
    /// Entries below this magnitude are dropped.
    pub minimum_magnitude: f64,
    /// Modified Mercalli Intensity threshold passed to the feed (-1..=8).
    pub mmi: i8,
    /// How often the scheduler fires a reconcile.
    pub scan_interval: Duration,
    /// Network timeout for a single fetch.  Expiry is an ordinary fetch
    /// failure, not a distinct error class.
    pub fetch_timeout: Duration,
    /// Unit system the radius was entered in.
    pub unit_system: UnitSystem,
}

impl FeedConfig {
    /// Create a config for the given home coordinates with all other fields
    /// at their defaults.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius: DEFAULT_RADIUS,
            minimum_magnitude: DEFAULT_MINIMUM_MAGNITUDE,
            mmi: DEFAULT_MMI,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            unit_system: UnitSystem::Metric,
        }
    }

    /// Check every field against its allowed range.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::LongitudeOutOfRange(self.longitude));
        }
        if self.radius <= 0.0 {
            return Err(ConfigError::InvalidRadius(self.radius));
        }
        if self.minimum_magnitude < 0.0 {
            return Err(ConfigError::InvalidMinimumMagnitude(
                self.minimum_magnitude,
            ));
        }
        if !(-1..=8).contains(&self.mmi) {
            return Err(ConfigError::MmiOutOfRange(self.mmi));
        }
        if self.scan_interval.is_zero() {
            return Err(ConfigError::ZeroScanInterval);
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroFetchTimeout);
        }
        Ok(())
    }

    /// The search radius in kilometres, converting from miles if the config
    /// was entered under the imperial unit system.
    pub fn radius_km(&self) -> f64 {
        match self.unit_system {
            UnitSystem::Metric => self.radius,
            UnitSystem::Imperial => self.radius * KM_PER_MILE,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
