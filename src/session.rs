//! Composition of the live and historical layers behind user interactions.
//!
//! A [`MapSession`] is created once and handed to whatever wires up the UI.
//! It owns both stores, the stream manager, and the history loader; the
//! renderer reads the stores through [`MapSession::live_store`] and
//! [`MapSession::history_store`].

use crate::attributes::AttributeRow;
use crate::config::{Endpoints, HistoryConfig, TileLayer};
use crate::error::{HistoryError, PayloadError, StreamError};
use crate::http::{HistoryLoader, HistorySource, HttpHistorySource};
use crate::payload::{HistoricalPoint, MapPayload, SelectionKey, VehicleUpdate};
use crate::store::{shared, SharedStore};
use crate::stream::{Connector, StreamManager, WebSocketConnector};
use crate::FeatureId;
use geo::Coord;
use log::{debug, info};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Every layer the map shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Live,
    Routes,
    Stops,
    Areas,
    History,
}

/// Layers backed by vector tiles, toggled without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticLayer {
    Routes,
    Stops,
    Areas,
}

impl StaticLayer {
    pub fn tile_layer(&self) -> TileLayer {
        match self {
            StaticLayer::Routes => TileLayer::Routes,
            StaticLayer::Stops => TileLayer::Stops,
            StaticLayer::Areas => TileLayer::Statistics,
        }
    }
}

/// Visibility of the toggleable layers. All start hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerVisibility {
    pub live: bool,
    pub routes: bool,
    pub stops: bool,
    pub areas: bool,
}

impl LayerVisibility {
    pub fn is_visible(&self, layer: Layer) -> bool {
        match layer {
            Layer::Live => self.live,
            Layer::Routes => self.routes,
            Layer::Stops => self.stops,
            Layer::Areas => self.areas,
            Layer::History => true,
        }
    }

    fn flag_mut(&mut self, layer: StaticLayer) -> &mut bool {
        match layer {
            StaticLayer::Routes => &mut self.routes,
            StaticLayer::Stops => &mut self.stops,
            StaticLayer::Areas => &mut self.areas,
        }
    }
}

/// Live map state driven by toggles, clicks, and hovers.
pub struct MapSession {
    live: SharedStore<VehicleUpdate>,
    history: SharedStore<HistoricalPoint>,
    stream: StreamManager,
    loader: HistoryLoader,
    layers: LayerVisibility,
}

impl MapSession {
    pub fn new(connector: Arc<dyn Connector>, source: Arc<dyn HistorySource>) -> Self {
        let live = shared();
        let history = shared();
        Self {
            stream: StreamManager::new(connector, Arc::clone(&live)),
            loader: HistoryLoader::new(source, Arc::clone(&history)),
            live,
            history,
            layers: LayerVisibility::default(),
        }
    }

    /// Session talking to the real services at `endpoints`.
    pub fn connect(endpoints: &Endpoints, config: &HistoryConfig) -> Result<Self, HistoryError> {
        let connector = Arc::new(WebSocketConnector::from_endpoints(endpoints));
        let source = Arc::new(HttpHistorySource::from_endpoints(endpoints, config)?);
        Ok(Self::new(connector, source))
    }

    pub fn live_store(&self) -> &SharedStore<VehicleUpdate> {
        &self.live
    }

    pub fn history_store(&self) -> &SharedStore<HistoricalPoint> {
        &self.history
    }

    pub fn layers(&self) -> LayerVisibility {
        self.layers
    }

    pub fn stream(&self) -> &StreamManager {
        &self.stream
    }

    /// Show and subscribe, or unsubscribe and hide. Returns the new visibility.
    ///
    /// A stream that fails to open leaves the layer hidden, so toggling again retries.
    pub async fn toggle_live(&mut self) -> Result<bool, StreamError> {
        if self.layers.live {
            self.stream.deactivate().await;
            self.layers.live = false;
            return Ok(false);
        }

        self.layers.live = true;
        if let Err(e) = self.stream.activate().await {
            self.layers.live = false;
            return Err(e);
        }
        Ok(true)
    }

    /// Returns the new visibility.
    pub fn toggle_layer(&mut self, layer: StaticLayer) -> bool {
        let flag = self.layers.flag_mut(layer);
        *flag = !*flag;
        debug!("[MapSession] {:?} visible: {}", layer, *flag);
        *flag
    }

    /// Drop the replayed trip, e.g. on a layer-bar interaction.
    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Replay the trip of the live vehicle `id`.
    ///
    /// The previous trip is cleared first. Returns the number of points loaded,
    /// 0 when `id` is not a live vehicle.
    pub async fn select(&self, id: &FeatureId) -> Result<usize, HistoryError> {
        self.clear_history().await;

        let key = {
            let live = self.live.lock().await;
            let Some(feature) = live.lookup(id) else {
                debug!("[MapSession] Selection {} is not a live vehicle", id);
                return Ok(0);
            };
            SelectionKey::from_update(feature.attributes())
                .ok_or_else(|| HistoryError::MissingJourney(id.to_string()))?
        };

        info!("[MapSession] Selected {}", id);
        self.loader.load_history(&key).await
    }

    /// Vehicle nearest to `coordinate` within `tolerance`, if the live layer is shown.
    async fn live_hit(&self, coordinate: Coord<f64>, tolerance: f64) -> Option<(FeatureId, VehicleUpdate)> {
        if !self.layers.live {
            return None;
        }
        let live = self.live.lock().await;
        live.nearest(coordinate, tolerance)
            .and_then(|f| Some((f.id()?.clone(), f.attributes().clone())))
    }

    /// Replay the trip of the vehicle nearest to `coordinate`, if one is within `tolerance`.
    ///
    /// Hidden live vehicles are not hit.
    pub async fn select_at(&self, coordinate: Coord<f64>, tolerance: f64) -> Result<usize, HistoryError> {
        let hit = self.live_hit(coordinate, tolerance).await.map(|(id, _)| id);

        match hit {
            Some(id) => self.select(&id).await,
            None => {
                self.clear_history().await;
                Ok(0)
            }
        }
    }

    /// Attribute rows of the vehicle, or failing that the historical point, under the pointer.
    pub async fn describe_at(&self, coordinate: Coord<f64>, tolerance: f64) -> Option<Vec<AttributeRow>> {
        if let Some((_, vehicle)) = self.live_hit(coordinate, tolerance).await {
            return Some(MapPayload::Vehicle(vehicle).attribute_rows());
        }
        let history = self.history.lock().await;
        history
            .nearest(coordinate, tolerance)
            .map(|point| MapPayload::Historical(point.attributes().clone()).attribute_rows())
    }

    /// Attribute rows of a tile feature the renderer found under the pointer.
    pub fn describe_tile_feature(
        layer: &str,
        properties: Map<String, Value>,
    ) -> Result<Vec<AttributeRow>, PayloadError> {
        Ok(MapPayload::from_tile_properties(layer, properties)?.attribute_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HistoryRequest;
    use crate::payload::HistorySample;
    use crate::projection::project;
    use crate::stream::LiveConnection;
    use async_trait::async_trait;
    use futures::channel::mpsc;
    use futures::StreamExt;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Feed {
        senders: Mutex<Vec<mpsc::UnboundedSender<String>>>,
        refuse: bool,
    }

    struct FeedConnection(mpsc::UnboundedReceiver<String>);

    #[async_trait]
    impl LiveConnection for FeedConnection {
        async fn next_frame(&mut self) -> Option<Result<String, StreamError>> {
            self.0.next().await.map(Ok)
        }

        async fn close(&mut self) {
            self.0.close();
        }
    }

    #[async_trait]
    impl Connector for Feed {
        async fn connect(&self) -> Result<Box<dyn LiveConnection>, StreamError> {
            if self.refuse {
                return Err(StreamError::connect("refused"));
            }
            let (tx, rx) = mpsc::unbounded();
            self.senders.lock().unwrap().push(tx);
            Ok(Box::new(FeedConnection(rx)))
        }
    }

    impl Feed {
        fn send(&self, frame: &str) {
            let senders = self.senders.lock().unwrap();
            senders.last().unwrap().unbounded_send(frame.to_string()).unwrap();
        }
    }

    #[derive(Default)]
    struct Trips {
        requests: Mutex<Vec<HistoryRequest>>,
    }

    #[async_trait]
    impl HistorySource for Trips {
        async fn fetch(&self, request: &HistoryRequest) -> Result<Vec<HistorySample>, HistoryError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(vec![
                HistorySample { long: 24.9, lat: 60.2, spd: Some(5.0), tsi: Some(1_000_000) },
                HistorySample { long: 24.95, lat: 60.25, spd: Some(6.0), tsi: None },
            ])
        }
    }

    const BUS: &str = r#"{"VP":{"route":"5","veh":42,"long":25.0,"lat":60.3,"spd":12,"tsi":1001,"jrn":"A","oday":"20240101"}}"#;
    const NO_TRIP: &str = r#"{"VP":{"route":"7","veh":9,"long":24.0,"lat":60.0}}"#;

    async fn session_with(frames: &[&str]) -> (MapSession, Arc<Feed>, Arc<Trips>) {
        let feed = Arc::new(Feed::default());
        let trips = Arc::new(Trips::default());
        let mut session = MapSession::new(feed.clone(), trips.clone());

        assert_eq!(session.toggle_live().await.unwrap(), true);
        for frame in frames {
            feed.send(frame);
        }
        for _ in 0..200 {
            if session.live_store().lock().await.len() == frames.len() {
                return (session, feed, trips);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("frames never applied");
    }

    #[tokio::test]
    async fn test_layers_start_hidden() {
        let session = MapSession::new(Arc::new(Feed::default()), Arc::new(Trips::default()));
        let layers = session.layers();
        assert!(!layers.is_visible(Layer::Live));
        assert!(!layers.is_visible(Layer::Stops));
        assert!(layers.is_visible(Layer::History));
    }

    #[tokio::test]
    async fn test_toggle_live_couples_visibility_and_stream() {
        let (mut session, _feed, _trips) = session_with(&[BUS]).await;
        assert!(session.layers().live);
        assert!(session.stream().is_active());

        assert_eq!(session.toggle_live().await.unwrap(), false);
        assert!(!session.layers().live);
        assert!(!session.stream().is_active());

        // Hidden, not cleared
        assert_eq!(session.live_store().lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_activation_stays_hidden() {
        let feed = Arc::new(Feed { refuse: true, ..Default::default() });
        let mut session = MapSession::new(feed, Arc::new(Trips::default()));

        assert!(session.toggle_live().await.is_err());
        assert!(!session.layers().live);
        assert!(!session.stream().is_active());
    }

    #[tokio::test]
    async fn test_static_layer_toggles() {
        let mut session = MapSession::new(Arc::new(Feed::default()), Arc::new(Trips::default()));
        assert!(session.toggle_layer(StaticLayer::Routes));
        assert!(session.toggle_layer(StaticLayer::Areas));
        assert!(!session.toggle_layer(StaticLayer::Routes));

        let layers = session.layers();
        assert!(!layers.routes && layers.areas && !layers.stops);
        assert_eq!(StaticLayer::Areas.tile_layer(), TileLayer::Statistics);
    }

    #[tokio::test]
    async fn test_select_loads_trip() {
        let (session, _feed, trips) = session_with(&[BUS]).await;

        let count = session.select(&FeatureId::new("5/42")).await.unwrap();
        assert_eq!(count, 2);

        let history = session.history_store().lock().await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|f| f.attributes().veh == crate::Ident::from(42)));

        let requests = trips.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].jrn, crate::Ident::from("A"));
    }

    #[tokio::test]
    async fn test_select_without_vehicle_only_clears() {
        let (session, _feed, trips) = session_with(&[BUS]).await;
        session.select(&FeatureId::new("5/42")).await.unwrap();

        let count = session.select(&FeatureId::new("nothing/here")).await.unwrap();
        assert_eq!(count, 0);
        assert!(session.history_store().lock().await.is_empty());
        assert_eq!(trips.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_vehicle_without_trip() {
        let (session, _feed, _trips) = session_with(&[NO_TRIP]).await;
        let result = session.select(&FeatureId::new("7/9")).await;
        assert!(matches!(result, Err(HistoryError::MissingJourney(_))));
    }

    #[tokio::test]
    async fn test_select_at_and_clear() {
        let (session, _feed, _trips) = session_with(&[BUS, NO_TRIP]).await;

        let bus = project(25.0, 60.3);
        let near = Coord { x: bus.x + 3.0, y: bus.y - 2.0 };
        assert_eq!(session.select_at(near, 10.0).await.unwrap(), 2);

        session.clear_history().await;
        assert!(session.history_store().lock().await.is_empty());

        // Clicking empty map clears too
        session.select(&FeatureId::new("5/42")).await.unwrap();
        assert_eq!(session.select_at(project(0.0, 0.0), 10.0).await.unwrap(), 0);
        assert!(session.history_store().lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_describe_prefers_live_vehicle() {
        let (session, _feed, _trips) = session_with(&[BUS]).await;
        session.select(&FeatureId::new("5/42")).await.unwrap();

        let rows = session.describe_at(project(25.0, 60.3), 5.0).await.unwrap();
        assert_eq!(rows[0].label, "Vehicle ID");
        assert_eq!(rows[0].value, "42");

        let rows = session.describe_at(project(24.9, 60.2), 5.0).await.unwrap();
        assert_eq!(rows.last().unwrap().label, "Speed (km/H)");

        assert!(session.describe_at(project(0.0, 0.0), 5.0).await.is_none());
    }

    #[tokio::test]
    async fn test_hidden_live_vehicles_are_not_hit() {
        let (mut session, _feed, trips) = session_with(&[BUS]).await;
        assert_eq!(session.toggle_live().await.unwrap(), false);
        assert_eq!(session.live_store().lock().await.len(), 1);

        let bus = project(25.0, 60.3);
        assert!(session.describe_at(bus, 5.0).await.is_none());
        assert_eq!(session.select_at(bus, 5.0).await.unwrap(), 0);
        assert!(trips.requests.lock().unwrap().is_empty());
        assert!(session.history_store().lock().await.is_empty());
    }

    #[test]
    fn test_describe_tile_feature() {
        let mut props = Map::new();
        props.insert("stop_code".into(), Value::from("H2045"));
        let rows = MapSession::describe_tile_feature("stops", props).unwrap();
        assert_eq!(rows, vec![AttributeRow { label: "Stop Code", value: "H2045".into() }]);

        assert!(MapSession::describe_tile_feature("routes", Map::new()).unwrap().is_empty());
    }
}
