//! Health check endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
    pub routing: RoutingHealth,
    pub tracking: TrackingHealth,
}

/// Database health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Routing service health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RoutingHealth {
    /// Whether routing is configured and enabled.
    pub enabled: bool,
    /// Whether lookups are currently attempted (circuit not open).
    pub available: bool,
    pub circuit_state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackingHealth {
    pub active_sessions: usize,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

async fn routing_health(state: &AppState) -> RoutingHealth {
    match &state.routing {
        Some(client) => {
            let circuit = client.circuit_state().await;
            RoutingHealth {
                enabled: client.is_available(),
                available: client.is_available()
                    && circuit != crate::services::routing::CircuitState::Open,
                circuit_state: circuit.as_str().to_string(),
            }
        }
        None => RoutingHealth {
            enabled: false,
            available: false,
            circuit_state: "disabled".to_string(),
        },
    }
}

/// Full health check endpoint.
///
/// The service is healthy when the database answers. Routing problems only
/// degrade ETAs to the straight-line fallback, so they are reported but do
/// not fail the check.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();
    let db_connected = persistence::db::ping(&state.pool).await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    let response = HealthResponse {
        status: if db_connected { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            connected: db_connected,
            latency_ms: db_connected.then_some(latency_ms),
        },
        routing: routing_health(&state).await,
        tracking: TrackingHealth {
            active_sessions: state.registry.len().await,
        },
    };

    let status = if db_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Liveness probe endpoint.
///
/// Returns 200 OK if the process is running.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 OK if the service can accept traffic (database connected).
pub async fn ready(State(state): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    if persistence::db::ping(&state.pool).await.is_ok() {
        Ok(Json(StatusResponse {
            status: "ready".to_string(),
        }))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
