//! Geographic primitives
//!
//! Great-circle distance on a spherical earth. The spherical model is off by
//! at most ~0.5% against WGS-84.

use serde::{Deserialize, Serialize};

/// Mean earth radius used by the haversine formula
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters per degree of latitude on the spherical model
pub const METERS_PER_DEGREE_LATITUDE: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_METERS / 360.0;

/// A position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographicPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeographicPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeographicPoint {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite numbers (no NaN, no infinity)
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &GeographicPoint) -> f64 {
        haversine_distance(self, other)
    }

    /// Point displaced by `north` and `east` meters.
    ///
    /// Equirectangular approximation, only good for offsets of a few
    /// kilometers away from the poles. Useful for placing points at a known
    /// distance from a geofence center.
    pub fn offset_meters(&self, north: f64, east: f64) -> GeographicPoint {
        let lat = self.latitude + north / METERS_PER_DEGREE_LATITUDE;
        let lon = self.longitude + east / meters_per_degree_longitude(self.latitude);
        GeographicPoint::new(lat, lon)
    }
}

/// Meters per degree of longitude at the given latitude
pub fn meters_per_degree_longitude(latitude: f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * latitude.to_radians().cos()
}

/// Haversine great-circle distance between two points, in meters
pub fn haversine_distance(a: &GeographicPoint, b: &GeographicPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}
