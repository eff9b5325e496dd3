use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use domain::services::LiveUpdateHub;
use mission_tracking_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{
        ExpireTrackingLinksJob, JobScheduler, PoolMetricsJob, RateLimitPruneJob,
        TrackingResyncJob,
    },
    middleware::{init_metrics, logging::init_logging},
    services::ShareTokenService,
};
use persistence::repositories::PublicTrackingLinkRepository;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting Mission Tracking API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    if config.database.run_migrations {
        info!("Running database migrations...");
        persistence::db::run_migrations(&pool).await?;
        info!("Migrations completed");
    }

    let hub = Arc::new(LiveUpdateHub::new());
    let state = AppState::from_pool(config.clone(), pool.clone(), hub.clone())?;
    let registry = state.registry.clone();

    let mut scheduler = JobScheduler::new();
    scheduler.register(TrackingResyncJob::new(
        registry.clone(),
        config.tracking.resync_interval_secs,
    ));
    scheduler.register(ExpireTrackingLinksJob::new(ShareTokenService::new(
        PublicTrackingLinkRepository::new(pool.clone()),
        &config.share_links,
    )));
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    if let Some(limiter) = &state.rate_limiter {
        scheduler.register(RateLimitPruneJob::new(limiter.clone()));
    }
    scheduler.start();

    let listener_task = tokio::spawn(persistence::live_listener::run_live_listener(
        pool.clone(),
        hub.clone(),
        scheduler.shutdown_signal(),
    ));

    let app = create_app(state);
    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    scheduler.shutdown();
    registry.shutdown().await;
    hub.close().await;
    if let Err(e) = listener_task.await {
        tracing::warn!(error = %e, "Live listener task failed");
    }
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    pool.close().await;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
