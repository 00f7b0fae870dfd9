//! Configuration for the routing client and the navigation session.
//!
//! Both structs deserialize from JSON with every field optional, so the
//! host app only sends what it wants to override.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::hazard::{DEFAULT_AVOIDANCE_RADIUS_M, DEFAULT_AVOIDANCE_SEGMENTS};

/// Environment variables checked for the provider API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["ORS_API_KEY", "EXPO_PUBLIC_ORS_API_KEY"];

/// Settings of the routing provider transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Provider routing profile.
    pub profile: String,
    pub api_key: Option<String>,
    /// Language of the instruction texts.
    pub language: String,
    /// Whole-request timeout. Guarantees that every computation resolves.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openrouteservice.org".to_string(),
            profile: "cycling-regular".to_string(),
            api_key: None,
            language: "fr".to_string(),
            timeout_secs: 15,
            connect_timeout_secs: 10,
            user_agent: concat!("velonav/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| NavError::InvalidInput(format!("client config: {e}")))
    }

    /// Fill a missing API key from the environment.
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = API_KEY_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()));
        }
        self
    }

    /// Directions endpoint returning GeoJSON.
    pub fn directions_url(&self) -> String {
        format!(
            "{}/v2/directions/{}/geojson",
            self.base_url.trim_end_matches('/'),
            self.profile
        )
    }
}

/// Thresholds of the navigation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Distance to the current instruction anchor that counts as reached.
    pub advance_radius_m: f64,
    pub hazard_radius_m: f64,
    pub hazard_segments: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            advance_radius_m: 25.0,
            hazard_radius_m: DEFAULT_AVOIDANCE_RADIUS_M,
            hazard_segments: DEFAULT_AVOIDANCE_SEGMENTS,
        }
    }
}
