//! # Transit Live
//!
//! Live vehicle position reconciliation and trip history playback for transit maps.
//!
//! This library provides:
//! - An identity-keyed feature store whose features are mutated in place
//! - A reconciler that applies streamed position updates to the store
//! - A stream lifecycle manager that ties the live connection to layer visibility
//! - A history loader that fetches a selected vehicle's past trip into a separate store
//!
//! Rendering (tile layers, styling, hit-testing at the pixel level) is left to the
//! map renderer, which reads the stores.
//!
//! ## Features
//!
//! - **`live`** - Enable the WebSocket stream manager
//! - **`http`** - Enable the HTTP history loader
//!
//! Both are enabled by default; [`MapSession`] needs both.
//!
//! ## Quick Start
//!
//! ```rust
//! use transit_live::{FeatureId, FeatureStore, LiveReconciler, VehicleUpdate};
//!
//! let reconciler = LiveReconciler::new();
//! let mut store: FeatureStore<VehicleUpdate> = FeatureStore::new();
//!
//! reconciler.handle(&mut store, r#"{"VP":{"route":"5","veh":42,"long":24.9,"lat":60.2,"spd":10.0,"tsi":1000}}"#);
//! reconciler.handle(&mut store, r#"{"VP":{"route":"5","veh":42,"long":25.0,"lat":60.3,"spd":12.0,"tsi":1001}}"#);
//!
//! let bus = store.lookup(&FeatureId::new("5/42")).unwrap();
//! assert_eq!(store.len(), 1);
//! assert_eq!(bus.attributes().spd, Some(12.0));
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

pub mod config;
pub use config::{Endpoints, HistoryConfig, TileLayer};

pub mod error;
pub use error::{HistoryError, PayloadError, StreamError};

pub mod projection;
pub use projection::{project, unproject};

pub mod store;
pub use store::{Feature, FeatureStore};
#[cfg(feature = "tokio")]
pub use store::{shared, SharedStore};

pub mod payload;
pub use payload::{
    AreaStatistic, HistoricalPoint, HistorySample, MapPayload, RouteMetadata, SelectionKey,
    StopMetadata, StreamMessage, VehicleUpdate,
};

pub mod attributes;
pub use attributes::AttributeRow;

pub mod reconciler;
pub use reconciler::{LiveReconciler, ReconcileStats};

// Live stream of vehicle positions
#[cfg(feature = "live")]
pub mod stream;

#[cfg(feature = "live")]
pub use stream::{Connector, LiveConnection, StreamManager, WebSocketConnector};

// History fetching for a selected trip
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HistoryLoader, HistoryRequest, HistorySource, HttpHistorySource};

#[cfg(all(feature = "live", feature = "http"))]
pub mod session;

#[cfg(all(feature = "live", feature = "http"))]
pub use session::{Layer, LayerVisibility, MapSession, StaticLayer};

// ============================================================================
// Core Types
// ============================================================================

/// An upstream identifier as it appears on the wire.
///
/// The fleet feed is inconsistent: vehicle and journey numbers usually arrive as
/// JSON integers, route and operating day as strings, and some vehicles send
/// their number as a string. The original JSON form is kept so the identifier
/// can be echoed back to the history service unchanged.
///
/// # Example
/// ```
/// use transit_live::Ident;
/// let veh: Ident = serde_json::from_str("42").unwrap();
/// let route: Ident = serde_json::from_str("\"1055\"").unwrap();
/// assert_eq!(veh.to_string(), "42");
/// assert_eq!(route.to_string(), "1055");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ident {
    Number(i64),
    Text(String),
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ident::Number(n) => write!(f, "{}", n),
            Ident::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Ident {
    fn from(n: i64) -> Self {
        Ident::Number(n)
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident::Text(s.to_string())
    }
}

impl From<String> for Ident {
    fn from(s: String) -> Self {
        Ident::Text(s)
    }
}

/// Stable key of a map feature.
///
/// Live vehicles are keyed by `"{route}/{vehicle}"`: vehicle numbers collide
/// across routes in the fleet data, the pair does not.
///
/// # Panics
///
/// Construction panics on an empty identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(String);

impl FeatureId {
    /// Create an identity from an arbitrary non-empty string.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "feature identity must not be empty");
        Self(id)
    }

    /// Identity of a live vehicle running on `route`.
    ///
    /// # Example
    /// ```
    /// use transit_live::{FeatureId, Ident};
    /// let id = FeatureId::for_vehicle(&Ident::from("5"), &Ident::from(42));
    /// assert_eq!(id.as_str(), "5/42");
    /// ```
    pub fn for_vehicle(route: &Ident, vehicle: &Ident) -> Self {
        Self::new(format!("{}/{}", route, vehicle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FeatureId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_keeps_wire_form() {
        let number: Ident = serde_json::from_str("817").unwrap();
        let text: Ident = serde_json::from_str("\"817\"").unwrap();

        assert_eq!(number, Ident::Number(817));
        assert_eq!(text, Ident::Text("817".to_string()));
        assert_eq!(serde_json::to_string(&number).unwrap(), "817");
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"817\"");
    }

    #[test]
    fn test_vehicle_identity_is_route_then_vehicle() {
        let id = FeatureId::for_vehicle(&Ident::from("1055"), &Ident::from(817));
        assert_eq!(id.as_str(), "1055/817");
        assert_eq!(id.to_string(), "1055/817");
    }

    #[test]
    fn test_same_vehicle_number_on_two_routes() {
        let a = FeatureId::for_vehicle(&Ident::from("5"), &Ident::from(42));
        let b = FeatureId::for_vehicle(&Ident::from("7"), &Ident::from(42));
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_empty_identity_panics() {
        FeatureId::new("");
    }
}
