//! Hazard reports and the avoidance geometry derived from them.
//!
//! The model only holds the current snapshot of reports. Fetching and
//! pushing reports, and resolving them, happens elsewhere.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::{circular_polygon, Coordinate, Ring};

/// Radius of the avoidance circle around each hazard, in meters.
pub const DEFAULT_AVOIDANCE_RADIUS_M: f64 = 20.0;

/// Vertices per avoidance circle, excluding the closing point.
pub const DEFAULT_AVOIDANCE_SEGMENTS: usize = 12;

/// Kind of obstruction a rider reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    BlockedRoad,
    DegradedPath,
    BikeObstruction,
}

impl HazardKind {
    /// Identifier used by the report store.
    pub fn id(self) -> &'static str {
        match self {
            HazardKind::BlockedRoad => "blocked_road",
            HazardKind::DegradedPath => "degraded_path",
            HazardKind::BikeObstruction => "bike_obstruction",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            HazardKind::BlockedRoad => "Route bloquée",
            HazardKind::DegradedPath => "Piste dégradée",
            HazardKind::BikeObstruction => "Voie cyclable obstruée",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardStatus {
    Active,
    Resolved,
}

/// A user-submitted hazard, as delivered by the report store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardReport {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HazardKind,
    pub latitude: f64,
    pub longitude: f64,
    pub status: HazardStatus,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub created_at_ms: i64,
}

impl HazardReport {
    pub fn location(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == HazardStatus::Active
    }
}

/// Current set of hazard reports.
#[derive(Debug, Clone, Default)]
pub struct HazardModel {
    reports: Vec<HazardReport>,
}

impl HazardModel {
    pub fn new(reports: Vec<HazardReport>) -> Self {
        Self { reports }
    }

    /// Parse a snapshot of store records (a JSON array).
    pub fn from_json(json: &str) -> Result<Self> {
        let reports: Vec<HazardReport> = serde_json::from_str(json)
            .map_err(|e| NavError::InvalidDataset(format!("hazard reports: {e}")))?;
        Ok(Self::new(reports))
    }

    pub fn active_hazards(&self) -> Vec<&HazardReport> {
        self.reports.iter().filter(|r| r.is_active()).collect()
    }

    /// One closed ring per active hazard with a valid location.
    pub fn avoidance_geometry(&self, radius_m: f64) -> Vec<Ring> {
        self.avoidance_geometry_with(radius_m, DEFAULT_AVOIDANCE_SEGMENTS)
    }

    pub fn avoidance_geometry_with(&self, radius_m: f64, segments: usize) -> Vec<Ring> {
        self.active_hazards()
            .into_iter()
            .filter_map(|r| {
                let location = r.location();
                if !location.is_valid() {
                    log::warn!("ignoring hazard {} with invalid location", r.id);
                    return None;
                }
                match circular_polygon(&location, radius_m, segments) {
                    Ok(ring) => Some(ring),
                    Err(e) => {
                        log::warn!("no avoidance ring for hazard {}: {e}", r.id);
                        None
                    }
                }
            })
            .collect()
    }

    /// Replace the snapshot.
    ///
    /// Returns whether the set of active hazards changed, which is what
    /// callers with a live route need to recompute it.
    pub fn on_reports_changed(&mut self, new_reports: Vec<HazardReport>) -> bool {
        let before: Vec<HazardReport> = self.active_hazards().into_iter().cloned().collect();
        self.reports = new_reports;
        let after = self.active_hazards();

        before.len() != after.len() || before.iter().zip(after).any(|(a, b)| a != b)
    }
}
