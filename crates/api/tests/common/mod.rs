//! Common test utilities for HTTP-level tests.
//!
//! The router is wired against in-memory collaborators, so no database or
//! routing service is needed.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{DateTime, Utc};
use domain::models::{
    Coordinates, HistoryPosition, LinkAccessError, LivePosition, Mission, MissionStatus,
    PublicTrackingLink,
};
use domain::services::{
    DisabledRoutingClient, EtaEstimator, LiveUpdateHub, MissionLinkStore, SessionDeps,
    ShareLinkError, ShareLinkIssuer, ShareTokenIssuer, TrackingSource, TrackingSourceError,
};
use mission_tracking_api::{
    app::{create_app, AppState},
    config::Config,
    services::{LinkResolveError, PublicLinkResolver, TrackingRegistry},
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

pub const PUBLIC_ORIGIN: &str = "https://track.example.com";

/// Missions, positions and failures served by the stub source.
#[derive(Default)]
pub struct StubSource {
    pub missions: Mutex<HashMap<Uuid, Mission>>,
    pub history: Mutex<HashMap<Uuid, Vec<HistoryPosition>>>,
    pub live: Mutex<HashMap<Uuid, LivePosition>>,
    pub failing: Mutex<HashSet<Uuid>>,
}

impl StubSource {
    pub fn add_mission(&self, status: MissionStatus, delivery: Option<Coordinates>) -> Uuid {
        let id = Uuid::new_v4();
        self.missions.lock().unwrap().insert(
            id,
            Mission {
                id,
                status,
                pickup: None,
                delivery,
                public_tracking_link: None,
            },
        );
        id
    }

    pub fn add_history(&self, mission_id: Uuid, lat: f64, lon: f64, recorded_at: DateTime<Utc>) {
        self.history
            .lock()
            .unwrap()
            .entry(mission_id)
            .or_default()
            .push(HistoryPosition {
                id: Uuid::new_v4(),
                mission_id,
                latitude: lat,
                longitude: lon,
                speed: Some(0.0),
                heading: None,
                accuracy: Some(5.0),
                recorded_at,
            });
    }

    pub fn fail(&self, mission_id: Uuid) {
        self.failing.lock().unwrap().insert(mission_id);
    }

    fn check(&self, mission_id: Uuid) -> Result<(), TrackingSourceError> {
        if self.failing.lock().unwrap().contains(&mission_id) {
            return Err(TrackingSourceError::Storage("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackingSource for StubSource {
    async fn load_mission(&self, mission_id: Uuid) -> Result<Option<Mission>, TrackingSourceError> {
        self.check(mission_id)?;
        Ok(self.missions.lock().unwrap().get(&mission_id).cloned())
    }

    async fn load_history(
        &self,
        mission_id: Uuid,
    ) -> Result<Vec<HistoryPosition>, TrackingSourceError> {
        self.check(mission_id)?;
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(&mission_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_live(&self, mission_id: Uuid) -> Result<Option<LivePosition>, TrackingSourceError> {
        self.check(mission_id)?;
        Ok(self.live.lock().unwrap().get(&mission_id).cloned())
    }
}

#[async_trait]
impl MissionLinkStore for StubSource {
    async fn set_public_tracking_link_if_absent(
        &self,
        mission_id: Uuid,
        url: &str,
    ) -> Result<String, ShareLinkError> {
        let mut missions = self.missions.lock().unwrap();
        let mission = missions
            .get_mut(&mission_id)
            .ok_or(ShareLinkError::MissionNotFound)?;
        Ok(mission
            .public_tracking_link
            .get_or_insert_with(|| url.to_string())
            .clone())
    }
}

/// Token store shared by issuance and resolution.
#[derive(Default)]
pub struct StubLinks {
    pub links: Mutex<HashMap<String, PublicTrackingLink>>,
    counter: Mutex<u64>,
}

impl StubLinks {
    pub fn insert(&self, link: PublicTrackingLink) {
        self.links.lock().unwrap().insert(link.token.clone(), link);
    }
}

pub fn link_for(mission_id: Uuid, token: &str) -> PublicTrackingLink {
    let now = Utc::now();
    PublicTrackingLink {
        id: Uuid::new_v4(),
        token: token.to_string(),
        mission_id,
        is_active: true,
        expires_at: now + chrono::Duration::days(30),
        access_count: 0,
        max_accesses: 1000,
        created_at: now,
    }
}

#[async_trait]
impl ShareTokenIssuer for StubLinks {
    async fn issue_token(&self, mission_id: Uuid) -> Result<String, ShareLinkError> {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let token = format!("token-{}", *counter);
        self.insert(link_for(mission_id, &token));
        Ok(token)
    }

    async fn revoke_token(&self, token: &str) -> Result<(), ShareLinkError> {
        if let Some(link) = self.links.lock().unwrap().get_mut(token) {
            link.is_active = false;
        }
        Ok(())
    }
}

#[async_trait]
impl PublicLinkResolver for StubLinks {
    async fn resolve(&self, token: &str) -> Result<PublicTrackingLink, LinkResolveError> {
        let mut links = self.links.lock().unwrap();
        let link = links.get_mut(token).ok_or(LinkAccessError::NotFound)?;
        link.check_access(Utc::now())?;
        link.access_count += 1;
        Ok(link.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub source: Arc<StubSource>,
    pub links: Arc<StubLinks>,
    pub hub: Arc<LiveUpdateHub>,
    pub registry: Arc<TrackingRegistry>,
}

/// Test configuration on top of the built-in defaults.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut all = vec![
        ("database.url", "postgres://mt:mt@127.0.0.1:1/mission_tracking_test"),
        ("server.public_base_url", PUBLIC_ORIGIN),
        ("tracking.initial_load_wait_ms", "2000"),
    ];
    all.extend_from_slice(overrides);
    Config::load_for_test(&all).expect("Failed to load test config")
}

pub fn test_app(overrides: &[(&str, &str)]) -> TestApp {
    let config = test_config(overrides);
    let source = Arc::new(StubSource::default());
    let links = Arc::new(StubLinks::default());
    let hub = Arc::new(LiveUpdateHub::new());

    // Never connects; health checks against it fail fast.
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy(&config.database.url)
        .expect("Failed to create lazy pool");

    let deps = SessionDeps {
        source: source.clone(),
        channel: hub.clone(),
        estimator: EtaEstimator::new(
            Arc::new(DisabledRoutingClient),
            config.tracking.eta_settings(),
        ),
        config: config.tracking.session_config(),
    };
    let registry = Arc::new(TrackingRegistry::new(
        deps,
        Duration::from_millis(config.tracking.initial_load_wait_ms),
    )
    .with_idle_timeout(config.tracking.idle_session_timeout()));
    let rate_limiter = mission_tracking_api::middleware::RateLimiterState::new(
        config.security.public_rate_limit_per_minute,
    )
    .map(Arc::new);

    let state = AppState {
        pool,
        share_links: ShareLinkIssuer::new(links.clone(), source.clone(), PUBLIC_ORIGIN),
        links: links.clone(),
        missions: source.clone(),
        registry: registry.clone(),
        routing: None,
        rate_limiter,
        config: Arc::new(config),
    };

    TestApp {
        router: create_app(state),
        source,
        links,
        hub,
        registry,
    }
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
