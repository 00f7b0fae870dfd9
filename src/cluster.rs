//! Greedy spatial clustering of weighted points.
//!
//! Dense point datasets (bike parking racks) are merged into map-scale
//! markers. The pass is single and greedy: each point joins the first
//! existing cluster whose running centroid lies closer than the radius,
//! so the output depends on input order.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::{distance_m, Coordinate};

/// A weighted input point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPoint {
    pub id: String,
    pub location: Coordinate,
    /// Number of items at this location, at least 1.
    pub weight: u32,
}

/// An aggregate marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Absorbed point ids, in absorption order.
    pub member_ids: Vec<String>,
    /// Weighted running average of absorbed locations.
    pub centroid: Coordinate,
    pub total_weight: u64,
}

impl Cluster {
    fn singleton(point: &ClusterPoint) -> Self {
        Self {
            member_ids: vec![point.id.clone()],
            centroid: point.location,
            total_weight: u64::from(point.weight),
        }
    }

    fn absorb(&mut self, point: &ClusterPoint) {
        let w_old = self.total_weight as f64;
        let w_new = f64::from(point.weight);
        let total = w_old + w_new;

        self.centroid = Coordinate {
            latitude: (self.centroid.latitude * w_old + point.location.latitude * w_new) / total,
            longitude: (self.centroid.longitude * w_old + point.location.longitude * w_new) / total,
        };
        self.total_weight += u64::from(point.weight);
        self.member_ids.push(point.id.clone());
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// Cluster `points` in input order with first-match merging.
///
/// Points with zero weight or an invalid location are rejected, since
/// the datasets come from outside. A non-positive radius yields one
/// cluster per point.
pub fn cluster(points: &[ClusterPoint], radius_m: f64) -> Result<Vec<Cluster>> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for point in points {
        if point.weight == 0 {
            return Err(NavError::InvalidDataset(format!("point {} has zero weight", point.id)));
        }
        if !point.location.is_valid() {
            return Err(NavError::InvalidDataset(format!(
                "point {} has an invalid location",
                point.id
            )));
        }

        let target = clusters
            .iter_mut()
            .find(|c| distance_m(&c.centroid, &point.location) < radius_m);

        match target {
            Some(c) => c.absorb(point),
            None => clusters.push(Cluster::singleton(point)),
        }
    }

    log::debug!("clustered {} points into {} clusters", points.len(), clusters.len());
    Ok(clusters)
}
