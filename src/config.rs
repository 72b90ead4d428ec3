//! Service endpoints and client tunables.
//!
//! All URLs derive from a single host name. Builds that set `API_HOST` at compile
//! time can use [`Endpoints::from_build_env`].

use std::fmt;
use std::time::Duration;

/// Compile-time host, if the build provided one.
const BUILD_API_HOST: Option<&str> = option_env!("API_HOST");

/// Default timeout for a single history request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Vector tile sources served next to the live endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileLayer {
    Routes,
    Stops,
    Statistics,
}

impl TileLayer {
    /// Path segment of the tile source, also the source-layer name inside the tile.
    pub fn name(&self) -> &'static str {
        match self {
            TileLayer::Routes => "routes",
            TileLayer::Stops => "stops",
            TileLayer::Statistics => "statistics",
        }
    }
}

impl fmt::Display for TileLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// URLs of the external services, built from one host.
///
/// # Example
/// ```
/// use transit_live::{Endpoints, TileLayer};
///
/// let endpoints = Endpoints::new("maps.example.org");
/// assert_eq!(endpoints.live_locations_url(), "wss://maps.example.org/live/locations/");
/// assert_eq!(
///     endpoints.tile_url(TileLayer::Stops, 11, 1165, 592),
///     "https://maps.example.org/tiles/stops/11/1165/592"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    host: String,
}

impl Endpoints {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Endpoints for the host baked in at build time through `API_HOST`.
    pub fn from_build_env() -> Option<Self> {
        BUILD_API_HOST
            .filter(|host| !host.is_empty())
            .map(Self::new)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Streaming endpoint for live vehicle positions.
    pub fn live_locations_url(&self) -> String {
        format!("wss://{}/live/locations/", self.host)
    }

    /// Request-response endpoint for the positions of one past trip.
    pub fn history_url(&self) -> String {
        format!("https://{}/live/histlocations/", self.host)
    }

    pub fn tile_url(&self, layer: TileLayer, z: u32, x: u32, y: u32) -> String {
        format!("https://{}/tiles/{}/{}/{}/{}", self.host, layer.name(), z, x, y)
    }
}

/// Configuration for the history client.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Total time allowed for one request, including the body download.
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}
