//! Route acquisition from the external routing provider.
//!
//! Builds one directions request per computation (origin, destination and
//! optional avoidance polygons), and normalizes the GeoJSON answer into a
//! [`Route`]. Expected failures come back as [`RouteError`] values. No
//! retries happen here: callers decide whether to retry, report or keep
//! their previous route.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use geojson::{Feature, FeatureCollection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::{NavError, RouteError};
use crate::geo::{distance_m, Coordinate, Ring};
use crate::instructions::{simplify, SimplifiedInstruction};

/// Closest origin/destination pair the provider can route between.
const MIN_ENDPOINT_SEPARATION_M: f64 = 0.5;

/// Provider error bodies are truncated to this many characters.
const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// A raw step as produced by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance_m: f64,
    /// Provider maneuver tag.
    pub step_type: u32,
    /// Index into the route polyline where the step begins.
    pub way_point_index: usize,
    pub name: Option<String>,
    /// Roundabout exit, when the provider knows it.
    pub exit_number: Option<u32>,
}

/// A normalized route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Polyline, at least two points.
    pub coordinates: Vec<Coordinate>,
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub steps: Vec<RouteStep>,
    pub instructions: Vec<SimplifiedInstruction>,
}

impl Route {
    /// Assemble a route and derive its instructions.
    pub fn new(
        coordinates: Vec<Coordinate>,
        total_distance_m: f64,
        total_duration_s: f64,
        steps: Vec<RouteStep>,
    ) -> Result<Self, RouteError> {
        if coordinates.len() < 2 {
            return Err(NavError::InvalidInput(format!(
                "route geometry has {} point(s), need at least 2",
                coordinates.len()
            )));
        }
        let instructions = simplify(&steps, &coordinates)?;

        Ok(Self {
            coordinates,
            total_distance_m,
            total_duration_s,
            steps,
            instructions,
        })
    }

    pub fn origin(&self) -> Coordinate {
        self.coordinates[0]
    }

    pub fn destination(&self) -> Coordinate {
        self.coordinates[self.coordinates.len() - 1]
    }

    /// Total distance in kilometers with one decimal, e.g. `"3.4"`.
    pub fn display_distance_km(&self) -> String {
        format!("{:.1}", self.total_distance_m / 1000.0)
    }

    /// Total duration rounded to the nearest minute.
    pub fn duration_minutes(&self) -> u64 {
        (self.total_duration_s / 60.0).round().max(0.0) as u64
    }
}

/// Anything able to compute a cycling route.
///
/// Implementations must always resolve, successfully or not; the
/// navigation state machine waits for the result.
pub trait RouteProvider {
    fn compute_route(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
        avoidance: &[Ring],
    ) -> Result<Route, RouteError>;
}

/// Reject endpoints the provider cannot route, before any request.
pub fn validate_endpoints(origin: &Coordinate, destination: &Coordinate) -> Result<(), RouteError> {
    for (name, c) in [("origin", origin), ("destination", destination)] {
        if !c.is_valid() {
            return Err(NavError::InvalidInput(format!(
                "{name} out of range: ({}, {})",
                c.latitude, c.longitude
            )));
        }
    }
    if distance_m(origin, destination) < MIN_ENDPOINT_SEPARATION_M {
        return Err(NavError::InvalidInput(
            "origin and destination are the same point".to_string(),
        ));
    }
    Ok(())
}

/// JSON body of a directions request.
///
/// Avoidance rings travel as one GeoJSON MultiPolygon in `[lon, lat]`
/// order; the option is omitted when there is nothing to avoid.
pub fn build_request_body(
    origin: &Coordinate,
    destination: &Coordinate,
    avoidance: &[Ring],
    language: &str,
) -> Value {
    let mut body = json!({
        "coordinates": [origin.lon_lat(), destination.lon_lat()],
        "instructions": true,
        "units": "m",
        "language": language,
    });

    if !avoidance.is_empty() {
        body["options"] = json!({ "avoid_polygons": avoid_polygons(avoidance) });
    }

    body
}

fn avoid_polygons(avoidance: &[Ring]) -> geojson::Geometry {
    let polygons = avoidance
        .iter()
        .map(|ring| vec![ring.iter().map(|c| vec![c.longitude, c.latitude]).collect()])
        .collect();
    geojson::Geometry::new(geojson::Value::MultiPolygon(polygons))
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    #[serde(default)]
    distance: f64,
    #[serde(rename = "type", default)]
    step_type: u32,
    #[serde(default)]
    instruction: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    way_points: Vec<usize>,
    #[serde(default)]
    exit_number: Option<u32>,
}

fn provider_error(status: u16, message: impl Into<String>) -> RouteError {
    NavError::Provider {
        status,
        message: message.into(),
    }
}

/// Best-effort message out of an error body.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        match &v["error"] {
            Value::String(s) => Some(s.clone()),
            Value::Object(o) => o.get("message").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    });

    from_json.unwrap_or_else(|| body.chars().take(MAX_ERROR_MESSAGE_LEN).collect())
}

/// Typed view of one entry of a feature's properties.
fn property<T: DeserializeOwned>(feature: &Feature, key: &str, status: u16) -> Result<Option<T>, RouteError> {
    feature
        .property(key)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| provider_error(status, format!("malformed {key}: {e}")))
}

/// Normalize a directions response.
pub fn parse_response(status: u16, body: &str) -> Result<Route, RouteError> {
    if !(200..300).contains(&status) {
        return Err(provider_error(status, error_message(body)));
    }

    let collection: FeatureCollection = serde_json::from_str(body)
        .map_err(|e| provider_error(status, format!("malformed body: {e}")))?;

    let Some(feature) = collection.features.into_iter().next() else {
        return Err(NavError::EmptyRoute);
    };

    let line = match feature.geometry.as_ref().map(|g| &g.value) {
        Some(geojson::Value::LineString(line)) => line,
        _ => return Err(provider_error(status, "route geometry is not a LineString")),
    };
    let coordinates = line
        .iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] => Coordinate::new(*lat, *lon)
                .map_err(|e| provider_error(status, format!("bad polyline vertex: {e}"))),
            _ => Err(provider_error(status, "polyline vertex without lon/lat")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let segments: Vec<Segment> = property(&feature, "segments", status)?.unwrap_or_default();
    let (mut distance, mut duration) = segments
        .iter()
        .fold((0.0, 0.0), |(d, t), s| (d + s.distance, t + s.duration));
    if segments.is_empty() {
        if let Some(summary) = property::<Summary>(&feature, "summary", status)? {
            distance = summary.distance;
            duration = summary.duration;
        }
    }

    let steps = segments
        .into_iter()
        .flat_map(|s| s.steps)
        .enumerate()
        .map(|(index, s)| {
            let Some(&way_point_index) = s.way_points.first() else {
                return Err(NavError::MalformedStep {
                    index,
                    reason: "no way points".to_string(),
                });
            };
            Ok(RouteStep {
                instruction: s.instruction,
                distance_m: s.distance,
                step_type: s.step_type,
                way_point_index,
                name: s.name.filter(|n| !n.is_empty() && n != "-"),
                exit_number: s.exit_number,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if coordinates.len() < 2 {
        return Err(provider_error(
            status,
            format!("route geometry has {} point(s)", coordinates.len()),
        ));
    }

    Route::new(coordinates, distance, duration, steps)
}

/// OpenRouteService directions client.
pub struct OrsClient {
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl OrsClient {
    pub fn new(config: ClientConfig) -> Result<Self, RouteError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| NavError::Network(e.to_string()))?;

        if config.api_key.is_none() {
            warn!("no routing API key configured");
        }
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl RouteProvider for OrsClient {
    fn compute_route(
        &self,
        origin: &Coordinate,
        destination: &Coordinate,
        avoidance: &[Ring],
    ) -> Result<Route, RouteError> {
        validate_endpoints(origin, destination)?;

        let body = build_request_body(origin, destination, avoidance, &self.config.language);
        let url = self.config.directions_url();
        info!(
            "requesting route ({:.5},{:.5}) -> ({:.5},{:.5}) avoiding {} area(s)",
            origin.latitude,
            origin.longitude,
            destination.latitude,
            destination.longitude,
            avoidance.len()
        );

        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json, application/geo+json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, key.as_str());
        }

        let response = request.send().map_err(|e| {
            warn!("routing request failed: {e}");
            NavError::Network(e.to_string())
        })?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| NavError::Network(e.to_string()))?;
        debug!("routing provider answered {status} ({} bytes)", text.len());

        let route = parse_response(status, &text);
        match &route {
            Ok(r) => info!(
                "route: {} km, {} min, {} instructions",
                r.display_distance_km(),
                r.duration_minutes(),
                r.instructions.len()
            ),
            Err(e) => warn!("routing failed: {e}"),
        }
        route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::IconClass;

    fn pt(lat: f64, lon: f64) -> Coordinate {
        Coordinate { latitude: lat, longitude: lon }
    }

    const RESPONSE: &str = r#"{
      "type": "FeatureCollection",
      "features": [{
        "type": "Feature",
        "bbox": [-0.58, 44.837, -0.57, 44.84],
        "properties": {
          "segments": [{
            "distance": 1012.6,
            "duration": 250.3,
            "steps": [
              { "distance": 420.1, "duration": 100.0, "type": 11,
                "instruction": "Head east on Rue Sainte-Catherine",
                "name": "Rue Sainte-Catherine", "way_points": [0, 1] },
              { "distance": 592.5, "duration": 150.3, "type": 1,
                "instruction": "Turn right onto Cours de l'Intendance",
                "name": "-", "way_points": [1, 2] },
              { "distance": 0.0, "duration": 0.0, "type": 10,
                "instruction": "Arrive at Cours de l'Intendance",
                "name": "-", "way_points": [2, 2] }
            ]
          }],
          "summary": { "distance": 1012.6, "duration": 250.3 },
          "way_points": [0, 2]
        },
        "geometry": {
          "type": "LineString",
          "coordinates": [[-0.58, 44.837], [-0.575, 44.8385], [-0.57, 44.84]]
        }
      }]
    }"#;

    #[test]
    fn parse_normalizes_route() {
        let route = parse_response(200, RESPONSE).unwrap();

        assert_eq!(route.coordinates.len(), 3);
        assert_eq!(route.origin(), pt(44.837, -0.58));
        assert_eq!(route.destination(), pt(44.84, -0.57));
        assert_eq!(route.total_distance_m, 1012.6);
        assert_eq!(route.total_duration_s, 250.3);
        assert_eq!(route.display_distance_km(), "1.0");
        assert_eq!(route.duration_minutes(), 4);

        assert_eq!(route.steps.len(), 3);
        assert_eq!(route.steps[0].name.as_deref(), Some("Rue Sainte-Catherine"));
        assert_eq!(route.steps[1].name, None);
        assert_eq!(route.steps[1].way_point_index, 1);

        assert_eq!(route.instructions.len(), 3);
        assert_eq!(route.instructions[1].icon, IconClass::TurnRight);
        assert_eq!(route.instructions[1].anchor, pt(44.8385, -0.575));
        assert_eq!(route.instructions[2].icon, IconClass::Arrive);
    }

    #[test]
    fn non_success_status_is_provider_error() {
        let body = r#"{"error":{"code":2010,"message":"Could not find routable point"}}"#;
        assert_eq!(
            parse_response(404, body),
            Err(NavError::Provider {
                status: 404,
                message: "Could not find routable point".to_string()
            })
        );

        let err = parse_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, NavError::Provider { status: 502, .. }));
    }

    #[test]
    fn malformed_body_is_provider_error() {
        assert!(matches!(
            parse_response(200, "{ not json"),
            Err(NavError::Provider { status: 200, .. })
        ));
        let one_point = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "properties":{"segments":[]},
            "geometry":{"type":"LineString","coordinates":[[-0.58, 44.837]]}}]}"#;
        assert!(matches!(
            parse_response(200, one_point),
            Err(NavError::Provider { .. })
        ));
    }

    #[test]
    fn non_line_geometry_is_provider_error() {
        let body = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "properties":{},
            "geometry":{"type":"Point","coordinates":[-0.58, 44.837]}}]}"#;
        assert!(matches!(
            parse_response(200, body),
            Err(NavError::Provider { status: 200, .. })
        ));
    }

    #[test]
    fn totals_fall_back_to_summary() {
        let body = r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "properties":{"summary":{"distance":812.0,"duration":190.0}},
            "geometry":{"type":"LineString","coordinates":[[-0.58, 44.837],[-0.57, 44.84]]}}]}"#;
        let route = parse_response(200, body).unwrap();

        assert_eq!(route.total_distance_m, 812.0);
        assert_eq!(route.total_duration_s, 190.0);
        assert!(route.steps.is_empty());
    }

    #[test]
    fn zero_features_is_empty_route() {
        let body = r#"{"type":"FeatureCollection","features":[]}"#;
        assert_eq!(parse_response(200, body), Err(NavError::EmptyRoute));
    }

    #[test]
    fn request_without_avoidance_has_no_options() {
        let body = build_request_body(&pt(44.8370, -0.5800), &pt(44.8400, -0.5700), &[], "fr");

        assert_eq!(body["coordinates"], json!([[-0.58, 44.837], [-0.57, 44.84]]));
        assert_eq!(body["instructions"], json!(true));
        assert!(body.get("options").is_none());
    }

    #[test]
    fn request_carries_avoid_polygons() {
        let ring = crate::geo::circular_polygon(&pt(44.8385, -0.5750), 20.0, 12).unwrap();
        let body = build_request_body(&pt(44.8370, -0.5800), &pt(44.8400, -0.5700), &[ring.clone()], "fr");

        let polygons = &body["options"]["avoid_polygons"];
        assert_eq!(polygons["type"], "MultiPolygon");
        let coords = polygons["coordinates"].as_array().unwrap();
        assert_eq!(coords.len(), 1);
        let outer = coords[0][0].as_array().unwrap();
        assert_eq!(outer.len(), 13);
        assert_eq!(outer[0], outer[12]);
        assert_eq!(outer[0][0], json!(ring[0].longitude));
        assert_eq!(outer[0][1], json!(ring[0].latitude));
        assert!(polygons.get("bbox").is_none());
    }

    #[test]
    fn endpoints_are_validated() {
        let a = pt(44.8370, -0.5800);
        assert!(validate_endpoints(&a, &pt(44.8400, -0.5700)).is_ok());
        assert!(matches!(validate_endpoints(&a, &a), Err(NavError::InvalidInput(_))));
        assert!(matches!(
            validate_endpoints(&a, &pt(95.0, 0.0)),
            Err(NavError::InvalidInput(_))
        ));
    }

    #[test]
    fn client_rejects_invalid_input_before_network() {
        let client = OrsClient::new(ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        let a = pt(44.8370, -0.5800);
        assert!(matches!(client.compute_route(&a, &a, &[]), Err(NavError::InvalidInput(_))));
    }
}
