//! One tracking session per observed mission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use domain::models::TrackingView;
use domain::services::{SessionDeps, SessionHandle, TrackingSession};
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::middleware::metrics::record_active_sessions;

struct Tracked {
    handle: SessionHandle,
    /// Milliseconds since the registry's epoch.
    last_observed_ms: AtomicU64,
}

impl Tracked {
    fn touch(&self, now_ms: u64) {
        self.last_observed_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    fn idle_for(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_observed_ms.load(Ordering::Relaxed)))
    }
}

/// Registry of running tracking sessions keyed by mission id.
pub struct TrackingRegistry {
    sessions: RwLock<HashMap<Uuid, Tracked>>,
    deps: SessionDeps,
    initial_load_wait: Duration,
    idle_timeout: Option<Duration>,
    epoch: Instant,
}

impl TrackingRegistry {
    pub fn new(deps: SessionDeps, initial_load_wait: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            deps,
            initial_load_wait,
            idle_timeout: None,
            epoch: Instant::now(),
        }
    }

    /// Stops sessions that nobody observed for `idle_timeout` on the next [`refresh_all`](Self::refresh_all).
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Returns the running session for the mission, starting one if needed.
    ///
    /// A stopped session is replaced, so a mission that was unknown or ended
    /// is looked up again on the next observation.
    pub async fn session(&self, mission_id: Uuid) -> SessionHandle {
        let now_ms = self.now_ms();
        if let Some(tracked) = self.sessions.read().await.get(&mission_id) {
            if !tracked.handle.is_stopped() {
                tracked.touch(now_ms);
                return tracked.handle.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(tracked) = sessions.get(&mission_id) {
            if !tracked.handle.is_stopped() {
                tracked.touch(now_ms);
                return tracked.handle.clone();
            }
        }

        tracing::info!(mission_id = %mission_id, "Starting tracking session");
        let handle = TrackingSession::spawn(mission_id, self.deps.clone());
        sessions.insert(
            mission_id,
            Tracked {
                handle: handle.clone(),
                last_observed_ms: AtomicU64::new(now_ms),
            },
        );
        record_active_sessions(sessions.len());
        handle
    }

    /// Joins or starts observation and returns the view once the first load settles.
    pub async fn observe(&self, mission_id: Uuid) -> TrackingView {
        self.session(mission_id)
            .await
            .wait_until_loaded(self.initial_load_wait)
            .await
    }

    /// Asks the mission's session to re-sync. Starts one if none is running.
    pub async fn refresh(&self, mission_id: Uuid) -> TrackingView {
        let now_ms = self.now_ms();
        let existing = self.sessions.read().await.get(&mission_id).map(|tracked| {
            tracked.touch(now_ms);
            tracked.handle.clone()
        });
        match existing {
            Some(handle) if handle.refresh().await => handle.view(),
            _ => self.observe(mission_id).await,
        }
    }

    /// Stops observing the mission. Returns false if no session was registered.
    pub async fn stop(&self, mission_id: Uuid) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().await;
            let removed = sessions.remove(&mission_id);
            record_active_sessions(sessions.len());
            removed
        };

        match removed {
            Some(tracked) => {
                tracked.handle.stop().await;
                tracing::info!(mission_id = %mission_id, "Tracking session stopped");
                true
            }
            None => false,
        }
    }

    /// Evicts stopped sessions, stops idle ones and sends a re-sync to the rest.
    /// Returns the number of sessions refreshed.
    pub async fn refresh_all(&self) -> usize {
        let now_ms = self.now_ms();
        let (live, idle) = {
            let mut sessions = self.sessions.write().await;
            let mut idle = Vec::new();
            sessions.retain(|mission_id, tracked| {
                if tracked.handle.is_stopped() {
                    tracing::debug!(mission_id = %mission_id, "Evicting stopped tracking session");
                    return false;
                }
                match self.idle_timeout {
                    Some(limit) if tracked.idle_for(now_ms) > limit => {
                        idle.push(tracked.handle.clone());
                        false
                    }
                    _ => true,
                }
            });
            record_active_sessions(sessions.len());
            let live: Vec<SessionHandle> = sessions.values().map(|t| t.handle.clone()).collect();
            (live, idle)
        };

        for handle in idle {
            tracing::info!(mission_id = %handle.mission_id(), "Stopping idle tracking session");
            handle.stop().await;
        }

        let mut refreshed = 0;
        for handle in live {
            if handle.refresh().await {
                refreshed += 1;
            }
        }
        refreshed
    }

    /// Stops every session.
    pub async fn shutdown(&self) {
        let sessions: Vec<SessionHandle> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, tracked)| tracked.handle)
            .collect();
        for handle in &sessions {
            handle.stop().await;
        }
        record_active_sessions(0);
        tracing::info!(count = sessions.len(), "All tracking sessions stopped");
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use domain::models::{
        Availability, HistoryPosition, LivePosition, Mission, MissionStatus, SessionStatus,
    };
    use domain::services::{
        DisabledRoutingClient, EtaEstimator, EtaSettings, LiveUpdateHub, SessionConfig,
        TrackingSource, TrackingSourceError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingSource {
        missions: HashMap<Uuid, MissionStatus>,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl TrackingSource for CountingSource {
        async fn load_mission(&self, mission_id: Uuid) -> Result<Option<Mission>, TrackingSourceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.missions.get(&mission_id).map(|status| Mission {
                id: mission_id,
                status: *status,
                pickup: None,
                delivery: None,
                public_tracking_link: None,
            }))
        }

        async fn load_history(&self, _mission_id: Uuid) -> Result<Vec<HistoryPosition>, TrackingSourceError> {
            Ok(vec![HistoryPosition {
                id: Uuid::new_v4(),
                mission_id: Uuid::nil(),
                latitude: 48.85,
                longitude: 2.35,
                speed: Some(0.0),
                heading: None,
                accuracy: Some(5.0),
                recorded_at: Utc::now(),
            }])
        }

        async fn load_live(&self, _mission_id: Uuid) -> Result<Option<LivePosition>, TrackingSourceError> {
            Ok(None)
        }
    }

    fn registry(source: Arc<CountingSource>) -> TrackingRegistry {
        registry_with_idle_timeout(source, None)
    }

    fn registry_with_idle_timeout(
        source: Arc<CountingSource>,
        idle_timeout: Option<Duration>,
    ) -> TrackingRegistry {
        let deps = SessionDeps {
            source,
            channel: Arc::new(LiveUpdateHub::new()),
            estimator: EtaEstimator::new(Arc::new(DisabledRoutingClient), EtaSettings::default()),
            config: SessionConfig::default(),
        };
        TrackingRegistry::new(deps, Duration::from_secs(2)).with_idle_timeout(idle_timeout)
    }

    #[tokio::test]
    async fn test_observe_shares_one_session() {
        let mission_id = Uuid::new_v4();
        let mut source = CountingSource::default();
        source.missions.insert(mission_id, MissionStatus::InProgress);
        let source = Arc::new(source);
        let registry = registry(source.clone());

        let first = registry.observe(mission_id).await;
        let second = registry.observe(mission_id).await;

        assert_eq!(first.status, SessionStatus::Active);
        assert_eq!(second.availability, Availability::Ready);
        assert_eq!(registry.len().await, 1);
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_mission_is_looked_up_again() {
        let source = Arc::new(CountingSource::default());
        let registry = registry(source.clone());
        let mission_id = Uuid::new_v4();

        let view = registry.observe(mission_id).await;
        assert_eq!(view.availability, Availability::MissionNotFound);

        // Wait for the session task to exit.
        let handle = registry.session(mission_id).await;
        let view = handle.wait_until_loaded(Duration::from_secs(2)).await;
        assert_eq!(view.availability, Availability::MissionNotFound);
        assert!(source.loads.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mission_id = Uuid::new_v4();
        let mut source = CountingSource::default();
        source.missions.insert(mission_id, MissionStatus::Pending);
        let registry = registry(Arc::new(source));

        registry.observe(mission_id).await;
        assert!(registry.stop(mission_id).await);
        assert!(!registry.stop(mission_id).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_all_evicts_stopped_sessions() {
        let active = Uuid::new_v4();
        let ended = Uuid::new_v4();
        let mut source = CountingSource::default();
        source.missions.insert(active, MissionStatus::InProgress);
        source.missions.insert(ended, MissionStatus::Completed);
        let registry = registry(Arc::new(source));

        registry.observe(active).await;
        let ended_view = registry.observe(ended).await;
        assert_eq!(
            ended_view.availability,
            Availability::MissionEnded {
                status: MissionStatus::Completed
            }
        );

        // The ended session's task exits on its own.
        let handle = registry.session(active).await;
        let mut tries = 0;
        while registry.refresh_all().await != 1 || registry.len().await != 1 {
            tries += 1;
            assert!(tries < 100, "stopped session was not evicted");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!handle.is_stopped());
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let mission_id = Uuid::new_v4();
        let mut source = CountingSource::default();
        source.missions.insert(mission_id, MissionStatus::InProgress);
        let registry = registry(Arc::new(source));

        let handle = registry.session(mission_id).await;
        registry.shutdown().await;
        assert!(registry.is_empty().await);

        let mut tries = 0;
        while !handle.is_stopped() {
            tries += 1;
            assert!(tries < 100, "session did not stop");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_all_stops_idle_sessions() {
        let watched = Uuid::new_v4();
        let abandoned = Uuid::new_v4();
        let mut source = CountingSource::default();
        source.missions.insert(watched, MissionStatus::InProgress);
        source.missions.insert(abandoned, MissionStatus::InProgress);
        let registry =
            registry_with_idle_timeout(Arc::new(source), Some(Duration::from_secs(60)));

        registry.observe(watched).await;
        let abandoned_handle = registry.session(abandoned).await;
        abandoned_handle.wait_until_loaded(Duration::from_secs(2)).await;

        tokio::time::advance(Duration::from_secs(45)).await;
        registry.observe(watched).await;
        assert_eq!(registry.refresh_all().await, 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(registry.refresh_all().await, 1);
        assert_eq!(registry.len().await, 1);

        let mut tries = 0;
        while !abandoned_handle.is_stopped() {
            tries += 1;
            assert!(tries < 100, "idle session did not stop");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Observing again starts a fresh session.
        let view = registry.observe(abandoned).await;
        assert_eq!(view.status, SessionStatus::Active);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_idle_timeout_sessions_stay() {
        let mission_id = Uuid::new_v4();
        let mut source = CountingSource::default();
        source.missions.insert(mission_id, MissionStatus::InProgress);
        let registry = registry(Arc::new(source));

        registry.observe(mission_id).await;
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(registry.refresh_all().await, 1);
        assert_eq!(registry.len().await, 1);
    }
}
