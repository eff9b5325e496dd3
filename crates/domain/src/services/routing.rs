//! Driving-route lookup abstraction.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Coordinates;

/// Errors returned by a routing client. None of them are retried by the client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    #[error("Routing service is disabled")]
    Disabled,

    #[error("Routing service URL not configured")]
    NotConfigured,

    #[error("Circuit breaker is open, routing temporarily unavailable")]
    CircuitOpen,

    #[error("Routing rate limit exceeded")]
    RateLimited,

    #[error("Routing request timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Transport(String),

    #[error("Invalid response from routing service: {0}")]
    InvalidResponse(String),

    #[error("Routing service error: {0}")]
    Service(String),

    #[error("No route found between the given points")]
    NoRoute,
}

impl RoutingError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingError::Disabled => "disabled",
            RoutingError::NotConfigured => "not_configured",
            RoutingError::CircuitOpen => "circuit_open",
            RoutingError::RateLimited => "rate_limited",
            RoutingError::Timeout(_) => "timeout",
            RoutingError::Transport(_) => "transport",
            RoutingError::InvalidResponse(_) => "invalid_response",
            RoutingError::Service(_) => "service",
            RoutingError::NoRoute => "no_route",
        }
    }
}

/// A driving route summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    pub distance_km: f64,
    pub duration_min: f64,
}

/// Looks up a driving route between two points with a single bounded request.
#[async_trait]
pub trait RoutingClient: Send + Sync {
    async fn route(&self, origin: Coordinates, destination: Coordinates)
        -> Result<Route, RoutingError>;
}

/// Routing client that always refuses. Used when routing is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRoutingClient;

#[async_trait]
impl RoutingClient for DisabledRoutingClient {
    async fn route(&self, _origin: Coordinates, _destination: Coordinates) -> Result<Route, RoutingError> {
        Err(RoutingError::Disabled)
    }
}
