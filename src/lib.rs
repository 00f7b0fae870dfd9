//! Cycling turn-by-turn navigation core.
//!
//! Route acquisition from an external routing provider, a navigation
//! state machine tracking the rider along the route, hazard-driven
//! rerouting, and clustering of dense point datasets for the map.

pub mod android_jni;
pub mod cluster;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod geo;
pub mod hazard;
pub mod instructions;
pub mod navigator;
pub mod route;
pub mod session;

pub use error::{NavError, RouteError};
pub use geo::Coordinate;
pub use navigator::Navigator;
pub use route::{OrsClient, Route, RouteProvider};
pub use session::{NavigationEvent, NavigationSession, SessionState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
