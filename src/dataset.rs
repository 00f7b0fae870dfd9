//! Point dataset intake.
//!
//! Reads the bike-parking API envelope
//! `{ success, count, data: [{ id, nombre, coordonnees: {..} }] }` into
//! [`ClusterPoint`]s. Records without usable coordinates are skipped.
//! Coordinates published in Lambert-93 are converted to WGS84.

use serde::Deserialize;
use serde_json::Value;

use crate::cluster::{cluster, Cluster, ClusterPoint};
use crate::convert::{lambert93_to_wgs84, looks_projected};
use crate::error::{NavError, Result};
use crate::geo::{BoundingBox, Coordinate};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<RawRecord>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    nombre: Option<i64>,
    #[serde(default)]
    coordonnees: Option<RawCoordinates>,
}

#[derive(Debug, Deserialize)]
struct RawCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
}

impl RawCoordinates {
    fn resolve(&self) -> Option<Coordinate> {
        // The backend copies projected x/y into longitude/latitude for
        // some layers, so both pairs go through the same check.
        let (x, y) = match (self.longitude, self.latitude, self.x, self.y) {
            (Some(lon), Some(lat), _, _) => (lon, lat),
            (_, _, Some(x), Some(y)) => (x, y),
            _ => return None,
        };
        if !x.is_finite() || !y.is_finite() {
            return None;
        }

        let c = if looks_projected(x, y) {
            lambert93_to_wgs84(x, y)
        } else {
            Coordinate { latitude: y, longitude: x }
        };
        c.is_valid().then_some(c)
    }
}

fn record_id(id: &Value, index: usize) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => format!("#{index}"),
    }
}

/// Parse the API envelope into weighted points.
///
/// The weight of a record is its rack count, at least 1.
pub fn parse_points(json: &str) -> Result<Vec<ClusterPoint>> {
    let envelope: Envelope = serde_json::from_str(json)
        .map_err(|e| NavError::InvalidDataset(format!("JSON parse error: {e}")))?;

    if !envelope.success {
        return Err(NavError::InvalidDataset(
            envelope.message.unwrap_or_else(|| "dataset API reported failure".to_string()),
        ));
    }

    let total = envelope.data.len();
    let points: Vec<ClusterPoint> = envelope
        .data
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let location = r.coordonnees.as_ref()?.resolve()?;
            Some(ClusterPoint {
                id: record_id(&r.id, i),
                location,
                weight: r.nombre.unwrap_or(0).clamp(1, i64::from(u32::MAX)) as u32,
            })
        })
        .collect();

    if points.len() < total {
        log::warn!("skipped {} records without usable coordinates", total - points.len());
    }
    Ok(points)
}

/// Keep the points inside `bbox`, preserving order.
pub fn within(points: Vec<ClusterPoint>, bbox: &BoundingBox) -> Vec<ClusterPoint> {
    points.into_iter().filter(|p| bbox.contains(&p.location)).collect()
}

/// Parse, cluster and serialize in one go. Convenience wrapper for JNI.
pub fn cluster_json(json: &str, radius_m: f64) -> Result<String> {
    let clusters: Vec<Cluster> = cluster(&parse_points(json)?, radius_m)?;
    serde_json::to_string(&clusters)
        .map_err(|e| NavError::InvalidDataset(format!("JSON serialize error: {e}")))
}
