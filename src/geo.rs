use serde::{Deserialize, Serialize};

use crate::domain::Reading;

/// mean earth radius used by the haversine formula, meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// map center used when a reading has no usable coordinate
pub const DEFAULT_POSITION: GeoPoint = GeoPoint { lat: 45.4642, lon: 9.19 };

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// offset by meters north/east (small distances only)
    pub fn offset_m(&self, north_m: f64, east_m: f64) -> Self {
        let dlat = (north_m / EARTH_RADIUS_M).to_degrees();
        let dlon = (east_m / (EARTH_RADIUS_M * self.lat.to_radians().cos())).to_degrees();
        Self::new(self.lat + dlat, self.lon + dlon)
    }
}

/// great-circle distance in meters
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// where to draw a reading; zero or non-finite coordinates fall back per axis
pub fn map_position(reading: &Reading) -> GeoPoint {
    let pick = |v: f64, fallback: f64| if v.is_finite() && v != 0.0 { v } else { fallback };
    GeoPoint::new(pick(reading.lat, DEFAULT_POSITION.lat), pick(reading.lon, DEFAULT_POSITION.lon))
}
