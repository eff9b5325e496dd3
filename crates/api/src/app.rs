use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{
    DisabledRoutingClient, EtaEstimator, LiveUpdateChannel, RoutingClient, RoutingError,
    SessionDeps, ShareLinkIssuer, TrackingSource,
};
use persistence::repositories::{
    MissionRepository, PublicTrackingLinkRepository, TrackingRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, trace_id, RateLimiterState,
};
use crate::routes::{health, public_tracking, share_links, tracking};
use crate::services::{OsrmRoutingClient, PublicLinkResolver, ShareTokenService, TrackingRegistry};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub registry: Arc<TrackingRegistry>,
    /// Mission lookups outside a session (share links).
    pub missions: Arc<dyn TrackingSource>,
    pub share_links: ShareLinkIssuer,
    pub links: Arc<dyn PublicLinkResolver>,
    /// Present when routing is enabled; used for health reporting.
    pub routing: Option<Arc<OsrmRoutingClient>>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the Postgres-backed collaborators.
    pub fn from_pool(
        config: Config,
        pool: PgPool,
        channel: Arc<dyn LiveUpdateChannel>,
    ) -> Result<Self, RoutingError> {
        let tracking_repo = Arc::new(TrackingRepository::new(pool.clone()));
        let tokens = ShareTokenService::new(
            PublicTrackingLinkRepository::new(pool.clone()),
            &config.share_links,
        );

        let routing = if config.routing.enabled {
            Some(Arc::new(OsrmRoutingClient::new(config.routing.clone())?))
        } else {
            tracing::info!("Routing disabled, ETAs use straight-line distance");
            None
        };
        let routing_client: Arc<dyn RoutingClient> = match &routing {
            Some(client) => client.clone() as Arc<dyn RoutingClient>,
            None => Arc::new(DisabledRoutingClient),
        };

        let deps = SessionDeps {
            source: tracking_repo.clone(),
            channel,
            estimator: EtaEstimator::new(routing_client, config.tracking.eta_settings()),
            config: config.tracking.session_config(),
        };
        let registry = Arc::new(TrackingRegistry::new(
            deps,
            Duration::from_millis(config.tracking.initial_load_wait_ms),
        )
        .with_idle_timeout(config.tracking.idle_session_timeout()));

        let share_links = ShareLinkIssuer::new(
            Arc::new(tokens.clone()),
            Arc::new(MissionRepository::new(pool.clone())),
            config.server.public_base_url.clone(),
        );
        let rate_limiter =
            RateLimiterState::new(config.security.public_rate_limit_per_minute).map(Arc::new);

        Ok(Self {
            pool,
            config: Arc::new(config),
            registry,
            missions: tracking_repo,
            share_links,
            links: Arc::new(tokens),
            routing,
            rate_limiter,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let mission_routes = Router::new()
        .route(
            "/api/v1/missions/:mission_id/tracking",
            get(tracking::get_tracking).delete(tracking::stop_tracking),
        )
        .route(
            "/api/v1/missions/:mission_id/tracking/refresh",
            post(tracking::refresh_tracking),
        )
        .route(
            "/api/v1/missions/:mission_id/share-link",
            post(share_links::create_share_link),
        );

    // Anonymous access by share token, limited per token
    let public_tracking_routes = Router::new()
        .route("/tracking/:token", get(public_tracking::get_public_tracking))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let ops_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(ops_routes)
        .merge(mission_routes)
        .merge(public_tracking_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
