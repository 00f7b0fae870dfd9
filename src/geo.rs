//! Geodesic helpers.
//!
//! Platform-agnostic module for distances, small circles and bounding
//! boxes. All coordinates use WGS84 (lat/lon in degrees).

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Earth radius in meters (WGS84 mean).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A closed polygon ring: the last point repeats the first.
pub type Ring = Vec<Coordinate>;

impl Coordinate {
    /// Build a coordinate, rejecting values outside the WGS84 ranges.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let c = Self { latitude, longitude };
        if c.is_valid() {
            Ok(c)
        } else {
            Err(NavError::InvalidInput(format!(
                "coordinate out of range: ({latitude}, {longitude})"
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// `[lon, lat]` pair, the GeoJSON axis order.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Haversine distance between two points in meters.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Approximate a circle of `radius_m` around `center` as a closed ring.
///
/// Returns `segments` evenly spaced vertices followed by a copy of the
/// first one. Offsets are computed with an equirectangular small-angle
/// projection around the center, which keeps vertices within centimeters
/// of the true radius for circles up to a few hundred meters. Larger
/// radii drift noticeably. Circles reaching a pole or crossing the
/// antimeridian are rejected.
pub fn circular_polygon(center: &Coordinate, radius_m: f64, segments: usize) -> Result<Ring> {
    if segments < 3 {
        return Err(NavError::InvalidInput(format!(
            "a polygon needs at least 3 segments, got {segments}"
        )));
    }
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(NavError::InvalidInput(format!("invalid radius: {radius_m}")));
    }

    let lat_rad_per_m = 1.0 / EARTH_RADIUS_M;
    let lon_rad_per_m = 1.0 / (EARTH_RADIUS_M * center.latitude.to_radians().cos());

    let mut ring = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let theta = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
        ring.push(Coordinate {
            latitude: center.latitude + (radius_m * theta.sin() * lat_rad_per_m).to_degrees(),
            longitude: center.longitude + (radius_m * theta.cos() * lon_rad_per_m).to_degrees(),
        });
    }
    if let Some(v) = ring.iter().find(|v| !v.is_valid()) {
        return Err(NavError::InvalidInput(format!(
            "circle of {radius_m} m around ({}, {}) leaves coordinate range at ({}, {})",
            center.latitude, center.longitude, v.latitude, v.longitude
        )));
    }
    ring.push(ring[0]);

    Ok(ring)
}

/// Axis-aligned lat/lon box, used to restrict datasets to the visible map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Span used when the map region does not report its deltas.
    pub const DEFAULT_DELTA: f64 = 0.05;

    /// Box of a map region given by its center and full lat/lon spans.
    pub fn from_region(center: &Coordinate, lat_delta: Option<f64>, lon_delta: Option<f64>) -> Self {
        let half_lat = lat_delta.unwrap_or(Self::DEFAULT_DELTA) / 2.0;
        let half_lon = lon_delta.unwrap_or(Self::DEFAULT_DELTA) / 2.0;

        Self {
            min_lon: center.longitude - half_lon,
            min_lat: center.latitude - half_lat,
            max_lon: center.longitude + half_lon,
            max_lat: center.latitude + half_lat,
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, c: &Coordinate) -> bool {
        c.longitude >= self.min_lon
            && c.longitude <= self.max_lon
            && c.latitude >= self.min_lat
            && c.latitude <= self.max_lat
    }

    /// `minLon,minLat,maxLon,maxLat`, the dataset API's `bbox` parameter.
    pub fn to_query(&self) -> String {
        format!("{},{},{},{}", self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}
