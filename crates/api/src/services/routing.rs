//! OSRM route lookups for ETA estimation.
//!
//! Every call is a single bounded request. Refusals from the local budget or
//! the circuit breaker surface as ordinary [`RoutingError`]s so the estimator
//! falls back to straight-line distance.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::models::Coordinates;
use domain::services::{Route, RoutingClient, RoutingError};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::{counter, gauge, histogram};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RoutingConfig;

/// OSRM Route API response structure.
#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

impl OsrmRouteResponse {
    fn into_route(self) -> Result<Route, RoutingError> {
        match self.code.as_str() {
            "Ok" => {}
            "NoRoute" | "NoSegment" => return Err(RoutingError::NoRoute),
            _ => {
                return Err(RoutingError::Service(
                    self.message.unwrap_or_else(|| self.code.clone()),
                ))
            }
        }

        let route = self
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoutingError::InvalidResponse("Empty routes array".into()))?;

        if !route.distance.is_finite() || !route.duration.is_finite() || route.distance < 0.0 {
            return Err(RoutingError::InvalidResponse(
                "Non-finite route summary".into(),
            ));
        }

        Ok(Route {
            distance_km: route.distance / 1000.0,
            duration_min: route.duration / 60.0,
        })
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker for external service protection.
struct CircuitBreaker {
    is_open: AtomicBool,
    /// Consecutive failure count.
    failure_count: AtomicU32,
    failure_threshold: u32,
    /// Time to stay open before a half-open retry.
    reset_timeout: Duration,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    fn new(failure_threshold: u32, reset_timeout_secs: u64) -> Self {
        Self {
            is_open: AtomicBool::new(false),
            failure_count: AtomicU32::new(0),
            failure_threshold: failure_threshold.max(1),
            reset_timeout: Duration::from_secs(reset_timeout_secs),
            opened_at: RwLock::new(None),
        }
    }

    async fn is_allowed(&self) -> bool {
        self.state().await != CircuitState::Open
    }

    async fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if self.is_open.swap(false, Ordering::Relaxed) {
            info!("Routing circuit breaker closed after successful request");
            *self.opened_at.write().await = None;
            gauge!("routing_circuit_open").set(0.0);
        }
    }

    async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count < self.failure_threshold {
            return;
        }

        // A failed half-open probe restarts the open period.
        let was_open = self.is_open.swap(true, Ordering::Relaxed);
        *self.opened_at.write().await = Some(Instant::now());
        if !was_open {
            warn!(
                failure_count = count,
                threshold = self.failure_threshold,
                "Routing circuit breaker opened due to consecutive failures"
            );
            gauge!("routing_circuit_open").set(1.0);
        }
    }

    async fn state(&self) -> CircuitState {
        if !self.is_open.load(Ordering::Relaxed) {
            return CircuitState::Closed;
        }

        match *self.opened_at.read().await {
            Some(opened) if opened.elapsed() >= self.reset_timeout => CircuitState::HalfOpen,
            _ => CircuitState::Open,
        }
    }
}

/// OSRM-backed [`RoutingClient`].
pub struct OsrmRoutingClient {
    client: Client,
    config: RoutingConfig,
    /// Per-minute request budget. `None` when unlimited.
    budget: Option<DefaultDirectRateLimiter>,
    circuit_breaker: CircuitBreaker,
}

impl OsrmRoutingClient {
    pub fn new(config: RoutingConfig) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RoutingError::Transport(e.to_string()))?;

        let budget = NonZeroU32::new(config.rate_limit_per_minute)
            .map(|n| RateLimiter::direct(Quota::per_minute(n)));
        let circuit_breaker =
            CircuitBreaker::new(config.circuit_breaker_failures, config.circuit_breaker_reset_secs);

        Ok(Self {
            client,
            config,
            budget,
            circuit_breaker,
        })
    }

    /// Check if routing is enabled and configured.
    pub fn is_available(&self) -> bool {
        self.config.enabled && !self.config.url.is_empty()
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    fn route_url(&self, origin: Coordinates, destination: Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.config.url.trim_end_matches('/'),
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude
        )
    }

    async fn call_osrm_route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<Route, RoutingError> {
        let url = self.route_url(origin, destination);
        debug!(url = %url, "Calling OSRM Route API");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                RoutingError::Timeout(self.config.timeout_ms)
            } else {
                RoutingError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body: OsrmRouteResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(RoutingError::InvalidResponse(e.to_string()))
            }
            Err(_) => return Err(RoutingError::Service(format!("HTTP {}", status))),
        };

        // OSRM answers NoRoute with a 400 and a JSON body.
        body.into_route()
    }
}

#[async_trait]
impl RoutingClient for OsrmRoutingClient {
    async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<Route, RoutingError> {
        if !self.config.enabled {
            return Err(RoutingError::Disabled);
        }
        if self.config.url.is_empty() {
            return Err(RoutingError::NotConfigured);
        }
        if !self.circuit_breaker.is_allowed().await {
            counter!("routing_requests_total", "outcome" => "circuit_open").increment(1);
            return Err(RoutingError::CircuitOpen);
        }
        if let Some(budget) = &self.budget {
            if budget.check().is_err() {
                counter!("routing_requests_total", "outcome" => "rate_limited").increment(1);
                return Err(RoutingError::RateLimited);
            }
        }

        let start = Instant::now();
        let result = self.call_osrm_route(origin, destination).await;
        let elapsed = start.elapsed();
        histogram!("routing_request_duration_seconds").record(elapsed.as_secs_f64());

        match &result {
            Ok(route) => {
                self.circuit_breaker.record_success().await;
                counter!("routing_requests_total", "outcome" => "ok").increment(1);
                debug!(
                    distance_km = route.distance_km,
                    duration_min = route.duration_min,
                    duration_ms = elapsed.as_millis() as u64,
                    "Route lookup successful"
                );
            }
            // A definitive answer from a healthy service.
            Err(RoutingError::NoRoute) => {
                self.circuit_breaker.record_success().await;
                counter!("routing_requests_total", "outcome" => "no_route").increment(1);
            }
            Err(e) => {
                self.circuit_breaker.record_failure().await;
                counter!("routing_requests_total", "outcome" => e.kind()).increment(1);
                warn!(
                    error = %e,
                    duration_ms = elapsed.as_millis() as u64,
                    "Route lookup failed"
                );
            }
        }

        result
    }
}
