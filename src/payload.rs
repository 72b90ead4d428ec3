//! Wire records and the payload variants a map feature can carry.
//!
//! Everything entering the crate is discriminated here, once: live frames by
//! their top-level event key, tile features by their source layer.

use crate::error::PayloadError;
use crate::{FeatureId, Ident};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One text frame of the live stream.
///
/// The feed wraps each event in an object with a single key naming the event
/// type. Only vehicle positions (`VP`) are consumed; any other key fails to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamMessage {
    #[serde(rename = "VP")]
    VehiclePosition(VehicleUpdate),
}

impl StreamMessage {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn into_update(self) -> VehicleUpdate {
        match self {
            StreamMessage::VehiclePosition(update) => update,
        }
    }
}

/// Latest known state of one vehicle, kept verbatim as the live feature's attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub route: Ident,
    pub veh: Ident,
    /// WGS84 longitude in degrees
    pub long: f64,
    /// WGS84 latitude in degrees
    pub lat: f64,
    /// Speed in meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spd: Option<f64>,
    /// Seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsi: Option<i64>,
    /// Offset from the timetable in seconds. `Some(None)` when sent as `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub dl: Option<Option<f64>>,
    /// Next stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Ident>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jrn: Option<Ident>,
    /// Operating day of the trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oday: Option<Ident>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<Ident>,
    /// Heading in degrees clockwise from north
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdg: Option<f64>,
    /// Acceleration in m/s^2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<f64>,
    /// Passenger occupancy, 0 to 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occu: Option<i64>,
    /// Scheduled start time of the trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Fields not modelled above, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VehicleUpdate {
    pub fn feature_id(&self) -> FeatureId {
        FeatureId::for_vehicle(&self.route, &self.veh)
    }
}

/// Marks a field that appeared on the wire, even as `null`. Absent fields fall back to `default`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Identifies the trip to replay when a live vehicle is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionKey {
    pub route: Ident,
    pub jrn: Ident,
    pub oday: Ident,
    pub veh: Ident,
}

impl SelectionKey {
    /// `None` when the update carries no journey or operating day.
    pub fn from_update(update: &VehicleUpdate) -> Option<Self> {
        Some(Self {
            route: update.route.clone(),
            jrn: update.jrn.clone()?,
            oday: update.oday.clone()?,
            veh: update.veh.clone(),
        })
    }
}

/// One record of the history response.
///
/// The service echoes zeroed identity fields alongside the position; they are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistorySample {
    pub long: f64,
    pub lat: f64,
    #[serde(default)]
    pub spd: Option<f64>,
    #[serde(default)]
    pub tsi: Option<i64>,
}

/// A past position of the selected trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalPoint {
    pub long: f64,
    pub lat: f64,
    pub spd: Option<f64>,
    /// Milliseconds since the Unix epoch
    pub tsi: Option<i64>,
    pub route: Ident,
    pub jrn: Ident,
    pub oday: Ident,
    pub veh: Ident,
}

impl HistoricalPoint {
    /// Attach the selection's identity to a sample that lacks it.
    pub fn from_sample(sample: HistorySample, key: &SelectionKey) -> Self {
        Self {
            long: sample.long,
            lat: sample.lat,
            spd: sample.spd,
            tsi: sample.tsi,
            route: key.route.clone(),
            jrn: key.jrn.clone(),
            oday: key.oday.clone(),
            veh: key.veh.clone(),
        }
    }
}

/// Properties of a feature in the `stops` tile layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StopMetadata {
    #[serde(default)]
    pub stop_code: Option<Ident>,
    #[serde(default)]
    pub stop_name: Option<Ident>,
    #[serde(default)]
    pub zone: Option<Ident>,
}

/// Properties of a feature in the `routes` tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMetadata {
    pub properties: Map<String, Value>,
}

/// Per-neighborhood aggregate from the `statistics` tile layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AreaStatistic {
    /// Neighborhood name
    #[serde(default)]
    pub nimi: Option<String>,
    #[serde(default)]
    pub spd: Option<f64>,
    #[serde(default)]
    pub dl: Option<f64>,
}

/// Everything a feature under the pointer can be.
#[derive(Debug, Clone, PartialEq)]
pub enum MapPayload {
    Vehicle(VehicleUpdate),
    Stop(StopMetadata),
    Route(RouteMetadata),
    AreaStatistic(AreaStatistic),
    Historical(HistoricalPoint),
}

impl MapPayload {
    /// Discriminate a vector tile feature by the source layer it came from.
    pub fn from_tile_properties(
        layer: &str,
        properties: Map<String, Value>,
    ) -> Result<Self, PayloadError> {
        match layer {
            "stops" => Ok(MapPayload::Stop(serde_json::from_value(Value::Object(properties))?)),
            "statistics" => Ok(MapPayload::AreaStatistic(serde_json::from_value(Value::Object(
                properties,
            ))?)),
            "routes" => Ok(MapPayload::Route(RouteMetadata { properties })),
            other => Err(PayloadError::UnknownLayer(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FLEET_FRAME: &str = r#"{"VP":{"desi":"55","dir":"1","oper":22,"veh":1226,"tst":"2021-04-24T16:20:00.123Z","tsi":1619281200,"spd":7.83,"hdg":91,"lat":60.192059,"long":24.934145,"acc":0.37,"dl":-22,"odo":null,"drst":0,"oday":"2021-04-24","jrn":334,"line":122,"start":"19:05","loc":"GPS","stop":1201228,"route":"1055","occu":0}}"#;

    #[test]
    fn test_parse_fleet_frame() {
        let update = StreamMessage::parse(FLEET_FRAME).unwrap().into_update();

        assert_eq!(update.route, Ident::from("1055"));
        assert_eq!(update.veh, Ident::from(1226));
        assert_eq!(update.jrn, Some(Ident::from(334)));
        assert_eq!(update.oday, Some(Ident::from("2021-04-24")));
        assert_eq!(update.dl, Some(Some(-22.0)));
        assert_eq!(update.stop, Some(Ident::from(1201228)));
        assert_eq!(update.feature_id().as_str(), "1055/1226");
        assert_eq!(update.extra.get("desi"), Some(&json!("55")));
        assert_eq!(update.extra.get("odo"), Some(&Value::Null));
    }

    #[test]
    fn test_minimal_frame() {
        let raw = r#"{"VP":{"route":"5","veh":"42","long":24.9,"lat":60.2}}"#;
        let update = StreamMessage::parse(raw).unwrap().into_update();
        assert_eq!(update.spd, None);
        assert_eq!(update.dl, None);
        assert!(update.extra.is_empty());
    }

    #[test]
    fn test_null_delay_differs_from_absent() {
        let raw = r#"{"VP":{"route":"5","veh":42,"long":24.9,"lat":60.2,"dl":null}}"#;
        let update = StreamMessage::parse(raw).unwrap().into_update();
        assert_eq!(update.dl, Some(None));
        assert!(!update.extra.contains_key("dl"));

        let echoed = serde_json::to_value(&update).unwrap();
        assert_eq!(echoed["dl"], Value::Null);
        assert!(echoed.as_object().unwrap().contains_key("dl"));
    }

    #[test]
    fn test_other_event_types_rejected() {
        let raw = r#"{"DOO":{"route":"5","veh":42,"long":24.9,"lat":60.2}}"#;
        assert!(matches!(StreamMessage::parse(raw), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_missing_position_rejected() {
        let raw = r#"{"VP":{"route":"5","veh":42,"long":null,"lat":null}}"#;
        assert!(StreamMessage::parse(raw).is_err());
        assert!(StreamMessage::parse("not json").is_err());
    }

    #[test]
    fn test_selection_key_requires_journey() {
        let mut update = StreamMessage::parse(FLEET_FRAME).unwrap().into_update();
        let key = SelectionKey::from_update(&update).unwrap();
        assert_eq!(key.jrn, Ident::from(334));
        assert_eq!(key.veh, Ident::from(1226));

        update.oday = None;
        assert!(SelectionKey::from_update(&update).is_none());
    }

    #[test]
    fn test_history_sample_ignores_echoed_identity() {
        let raw = r#"[{"jrn":0,"oday":"","veh":0,"tsi":1619281200000,"lat":60.19,"long":24.93,"spd":5.5,"route":""},{"long":24.94,"lat":60.2}]"#;
        let samples: Vec<HistorySample> = serde_json::from_str(raw).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].tsi, Some(1_619_281_200_000));
        assert_eq!(samples[1].spd, None);

        let key = SelectionKey {
            route: Ident::from("5"),
            jrn: Ident::from("A"),
            oday: Ident::from("20240101"),
            veh: Ident::from(42),
        };
        let point = HistoricalPoint::from_sample(samples[0].clone(), &key);
        assert_eq!(point.route, Ident::from("5"));
        assert_eq!(point.jrn, Ident::from("A"));
        assert_eq!(point.veh, Ident::from(42));
    }

    #[test]
    fn test_tile_payloads_by_layer() {
        let stop = json!({"stop_code": "H2045", "stop_name": "Kamppi", "zone": "A"});
        let Value::Object(props) = stop else { unreachable!() };
        match MapPayload::from_tile_properties("stops", props).unwrap() {
            MapPayload::Stop(s) => assert_eq!(s.stop_name, Some(Ident::from("Kamppi"))),
            other => panic!("unexpected {:?}", other),
        }

        let Value::Object(props) = json!({"nimi": "Kallio", "spd": 6.1, "dl": 40.0}) else { unreachable!() };
        assert!(matches!(
            MapPayload::from_tile_properties("statistics", props),
            Ok(MapPayload::AreaStatistic(_))
        ));

        assert!(matches!(
            MapPayload::from_tile_properties("routes", Map::new()),
            Ok(MapPayload::Route(_))
        ));
        assert!(matches!(
            MapPayload::from_tile_properties("landuse", Map::new()),
            Err(PayloadError::UnknownLayer(_))
        ));
    }
}
