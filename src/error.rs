//! Error type shared by every component.
//!
//! Expected failures (unreachable provider, bad input, malformed data from
//! outside) are values, never panics. The type is `Clone` so that it can be
//! carried inside [`NavigationEvent`](crate::session::NavigationEvent)s.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// The routing provider could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with an error status or a body we cannot use.
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// The provider answered successfully but without any route feature.
    #[error("provider returned no route")]
    EmptyRoute,

    /// Rejected before any request was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation needs a route and the session has none.
    #[error("no active route")]
    NoActiveRoute,

    #[error("malformed step {index}: {reason}")]
    MalformedStep { index: usize, reason: String },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
}

/// Failure kinds of a route computation.
pub type RouteError = NavError;

pub type Result<T, E = NavError> = std::result::Result<T, E>;
