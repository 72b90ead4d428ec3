//! # Coordinate Transform
//!
//! Conversion between WGS84 longitude/latitude and the map's projected space.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`project`] | WGS84 degrees to spherical Web Mercator meters (EPSG:3857) |
//! | [`unproject`] | Web Mercator meters back to WGS84 degrees |
//!
//! Live vehicles and historical points both go through [`project`], so the two
//! layers line up exactly.
//!
//! ## Example
//!
//! ```rust
//! use transit_live::projection;
//!
//! let helsinki = projection::project(24.9384, 60.1699);
//! assert!((helsinki.x - 2_776_130.0).abs() < 1.0);
//! assert!((helsinki.y - 8_437_662.0).abs() < 1.0);
//! ```

use geo::Coord;
use std::f64::consts::PI;

/// Radius of the Web Mercator sphere in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the width of the projected square; `y` is clamped to this.
pub const HALF_SIZE: f64 = PI * EARTH_RADIUS;

/// Project a WGS84 position to Web Mercator.
///
/// Total for finite input: latitudes at or beyond the poles clamp to the edge
/// of the projected square instead of diverging.
#[inline]
pub fn project(longitude: f64, latitude: f64) -> Coord<f64> {
    let x = EARTH_RADIUS * longitude.to_radians();
    let latitude = latitude.clamp(-90.0, 90.0);
    let y = EARTH_RADIUS * (PI * (latitude + 90.0) / 360.0).tan().ln();
    Coord {
        x,
        y: y.clamp(-HALF_SIZE, HALF_SIZE),
    }
}

/// Inverse of [`project`]. Returns `(longitude, latitude)` in degrees.
#[inline]
pub fn unproject(coord: Coord<f64>) -> (f64, f64) {
    let longitude = (coord.x / EARTH_RADIUS).to_degrees();
    let latitude = 360.0 * (coord.y / EARTH_RADIUS).exp().atan() / PI - 90.0;
    (longitude, latitude)
}
