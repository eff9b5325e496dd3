//! Remaining distance and ETA estimation.

use std::sync::Arc;

use crate::models::{Coordinates, EtaSource, PositionSample};
use crate::services::routing::RoutingClient;

/// Tunables for the haversine fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaSettings {
    /// Assumed speed when the vehicle reports no usable speed.
    pub fallback_cruise_speed_kmh: f64,
    /// Reported speeds at or below this are treated as stationary.
    pub moving_speed_floor_mps: f64,
}

impl Default for EtaSettings {
    fn default() -> Self {
        Self {
            fallback_cruise_speed_kmh: 60.0,
            moving_speed_floor_mps: 3.0,
        }
    }
}

/// Result of one estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaEstimate {
    pub distance_km: f64,
    /// 0 only when `source` is `Unavailable`.
    pub eta_minutes: i64,
    pub source: EtaSource,
    /// Distance covered since the previous estimate, when one was given.
    pub progress_km: Option<f64>,
}

impl EtaEstimate {
    pub fn unavailable() -> Self {
        Self {
            distance_km: 0.0,
            eta_minutes: 0,
            source: EtaSource::Unavailable,
            progress_km: None,
        }
    }
}

/// Combines the routing service with a great-circle fallback. Never fails.
#[derive(Clone)]
pub struct EtaEstimator {
    routing: Arc<dyn RoutingClient>,
    settings: EtaSettings,
}

impl EtaEstimator {
    pub fn new(routing: Arc<dyn RoutingClient>, settings: EtaSettings) -> Self {
        Self { routing, settings }
    }

    pub fn settings(&self) -> &EtaSettings {
        &self.settings
    }

    pub async fn estimate(
        &self,
        current: Option<&PositionSample>,
        destination: Option<Coordinates>,
        prior_distance_km: Option<f64>,
    ) -> EtaEstimate {
        let (current, destination) = match (current, destination) {
            (Some(current), Some(destination)) => (current, destination),
            _ => return EtaEstimate::unavailable(),
        };

        let mut estimate = match self.routing.route(current.coordinates(), destination).await {
            Ok(route) => EtaEstimate {
                distance_km: route.distance_km,
                eta_minutes: computed_minutes(route.duration_min),
                source: EtaSource::Routing,
                progress_km: None,
            },
            Err(e) => {
                tracing::debug!(error = %e, "Routing unavailable, using haversine fallback");
                self.fallback(current, destination)
            }
        };

        estimate.progress_km = prior_distance_km.map(|prior| prior - estimate.distance_km);
        estimate
    }

    /// Haversine distance with a speed-based ETA.
    pub fn fallback(&self, current: &PositionSample, destination: Coordinates) -> EtaEstimate {
        let distance_km = current.coordinates().distance_km(&destination);

        let minutes = match current.speed {
            Some(speed) if speed > self.settings.moving_speed_floor_mps => {
                distance_km * 1000.0 / speed / 60.0
            }
            _ => distance_km / self.settings.fallback_cruise_speed_kmh * 60.0,
        };

        EtaEstimate {
            distance_km,
            eta_minutes: computed_minutes(minutes),
            source: EtaSource::Haversine,
            progress_km: None,
        }
    }
}

/// Rounds to whole minutes; a computed 0 is reported as 1 since 0 means "not computed".
fn computed_minutes(minutes: f64) -> i64 {
    (minutes.round() as i64).max(1)
}
