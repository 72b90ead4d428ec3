//! Human-readable attribute rows for a hovered feature.
//!
//! Each payload kind has a fixed set of labelled rows. Rows for absent optional
//! fields are left out. Markup is the renderer's business.

use crate::payload::{AreaStatistic, HistoricalPoint, MapPayload, StopMetadata, VehicleUpdate};

/// One label/value line of a feature description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    pub label: &'static str,
    pub value: String,
}

impl AttributeRow {
    fn new(label: &'static str, value: impl ToString) -> Self {
        Self { label, value: value.to_string() }
    }
}

impl MapPayload {
    /// Rows describing this payload, in display order.
    pub fn attribute_rows(&self) -> Vec<AttributeRow> {
        match self {
            MapPayload::Vehicle(v) => vehicle_rows(v),
            MapPayload::Historical(h) => historical_rows(h),
            MapPayload::Stop(s) => stop_rows(s),
            MapPayload::AreaStatistic(a) => statistic_rows(a),
            // Route lines are drawn but never described
            MapPayload::Route(_) => Vec::new(),
        }
    }
}

fn vehicle_rows(v: &VehicleUpdate) -> Vec<AttributeRow> {
    let mut rows = vec![
        AttributeRow::new("Vehicle ID", &v.veh),
        AttributeRow::new("Route ID", &v.route),
    ];
    if let Some(tsi) = v.tsi {
        rows.push(AttributeRow::new("Last Update (UTC)", clock_time(tsi)));
    }
    if let Some(spd) = v.spd {
        rows.push(AttributeRow::new("Current Speed (km/H)", kmh(spd)));
    }
    if let Some(stop) = &v.stop {
        rows.push(AttributeRow::new("Approaching Stop", stop));
    }
    if let Some(dl) = v.dl {
        // An explicit null reads as no offset
        rows.push(AttributeRow::new("Behind Schedule", schedule_delay(dl.unwrap_or(0.0))));
    }
    rows
}

fn historical_rows(h: &HistoricalPoint) -> Vec<AttributeRow> {
    let mut rows = vec![
        AttributeRow::new("Vehicle ID", &h.veh),
        AttributeRow::new("Route ID", &h.route),
    ];
    if let Some(tsi) = h.tsi {
        // History timestamps are in milliseconds
        rows.push(AttributeRow::new("Last Update (UTC)", clock_time(tsi.div_euclid(1000))));
    }
    if let Some(spd) = h.spd {
        rows.push(AttributeRow::new("Speed (km/H)", kmh(spd)));
    }
    rows
}

fn stop_rows(s: &StopMetadata) -> Vec<AttributeRow> {
    [
        ("Stop Code", &s.stop_code),
        ("Name", &s.stop_name),
        ("Zone", &s.zone),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.as_ref().map(|v| AttributeRow::new(label, v)))
    .collect()
}

fn statistic_rows(a: &AreaStatistic) -> Vec<AttributeRow> {
    let mut rows = Vec::new();
    if let Some(name) = &a.nimi {
        rows.push(AttributeRow::new("Neighborhood", name));
    }
    if let Some(spd) = a.spd {
        rows.push(AttributeRow::new("Current Speed (km/H)", kmh(spd)));
    }
    match a.dl {
        Some(dl) if dl != 0.0 => rows.push(AttributeRow::new("Average Delay ", duration(dl))),
        _ => {}
    }
    rows
}

/// Meters per second to kilometers per hour.
pub fn kmh(mps: f64) -> f64 {
    mps * 3600.0 / 1000.0
}

/// Schedule offset as shown to riders.
///
/// A positive offset reads "On-Time"; anything else is shown as the magnitude of
/// the offset. This sign convention is the feed consumer's established display and
/// is kept unchanged.
pub fn schedule_delay(dl: f64) -> String {
    if dl > 0.0 {
        return "On-Time".to_string();
    }
    duration(dl)
}

/// `HH:MM:SS` of the magnitude of `seconds`, wrapping at a day.
fn duration(seconds: f64) -> String {
    clock_time(seconds.abs().trunc() as i64)
}

/// `HH:MM:SS` UTC time of day for seconds since the epoch.
pub fn clock_time(epoch_seconds: i64) -> String {
    let secs = epoch_seconds.rem_euclid(86_400);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
