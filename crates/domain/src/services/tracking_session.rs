//! Per-mission tracking session.
//!
//! [`SessionState`] is the synchronous state machine (`Idle → Loading →
//! Active → Stopped`); it takes the current time as an argument and never
//! performs I/O. [`TrackingSession`] wraps it in a task that processes
//! commands, live pushes and ETA results one at a time and publishes a
//! [`TrackingView`] after every transition.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Availability, Coordinates, EtaSource, HistoryPosition, LivePosition, Mission, PositionSample,
    SessionStatus, Thresholds, TrackingSnapshot, TrackingView,
};
use crate::services::eta::{EtaEstimate, EtaEstimator};
use crate::services::live_update::{LiveUpdateChannel, LiveUpdateHandler, SubscriptionHandle};
use crate::services::trajectory;

const EVENT_BUFFER: usize = 256;
const COMMAND_BUFFER: usize = 16;

// ============================================================================
// Collaborators
// ============================================================================

/// Errors from the position and mission stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingSourceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Read access to missions and their positions.
#[async_trait]
pub trait TrackingSource: Send + Sync {
    async fn load_mission(&self, mission_id: Uuid) -> Result<Option<Mission>, TrackingSourceError>;

    /// Ascending by `recorded_at`.
    async fn load_history(&self, mission_id: Uuid)
        -> Result<Vec<HistoryPosition>, TrackingSourceError>;

    async fn load_live(&self, mission_id: Uuid) -> Result<Option<LivePosition>, TrackingSourceError>;
}

/// Session tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub thresholds: Thresholds,
    /// Pushes reporting a larger uncertainty radius are dropped.
    pub max_accuracy_meters: f64,
    /// Pushes reporting a higher speed are dropped.
    pub max_speed_kmh: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            max_accuracy_meters: 50.0,
            max_speed_kmh: 200.0,
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Why a live push was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushRejection {
    NotActive,
    WrongMission,
    Invalid,
    Inactive,
    LowAccuracy,
    ImplausibleSpeed,
    FutureTimestamp,
}

impl PushRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushRejection::NotActive => "not_active",
            PushRejection::WrongMission => "wrong_mission",
            PushRejection::Invalid => "invalid",
            PushRejection::Inactive => "inactive",
            PushRejection::LowAccuracy => "low_accuracy",
            PushRejection::ImplausibleSpeed => "implausible_speed",
            PushRejection::FutureTimestamp => "future_timestamp",
        }
    }
}

/// An ETA computation the session wants performed.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaRequest {
    pub seq: u64,
    pub current: PositionSample,
    pub destination: Coordinates,
    pub prior_distance_km: Option<f64>,
}

/// Result of a full pull from the stores.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedData {
    pub mission: Option<Mission>,
    pub history: Vec<HistoryPosition>,
    pub live: Option<LivePosition>,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    mission_id: Uuid,
    config: SessionConfig,
    status: SessionStatus,
    availability: Availability,
    mission: Option<Mission>,
    trajectory: Vec<PositionSample>,
    eta: EtaEstimate,
    eta_seq_issued: u64,
    eta_seq_applied: u64,
}

impl SessionState {
    pub fn new(mission_id: Uuid, config: SessionConfig) -> Self {
        Self {
            mission_id,
            config,
            status: SessionStatus::Idle,
            availability: Availability::Ready,
            mission: None,
            trajectory: Vec::new(),
            eta: EtaEstimate::unavailable(),
            eta_seq_issued: 0,
            eta_seq_applied: 0,
        }
    }

    pub fn mission_id(&self) -> Uuid {
        self.mission_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn trajectory(&self) -> &[PositionSample] {
        &self.trajectory
    }

    pub fn current_position(&self) -> Option<&PositionSample> {
        self.trajectory.last()
    }

    pub fn eta(&self) -> &EtaEstimate {
        &self.eta
    }

    pub fn is_stopped(&self) -> bool {
        self.status == SessionStatus::Stopped
    }

    /// `Idle → Loading`. Reloads of an active session keep their status.
    pub fn begin_loading(&mut self) {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Loading;
        }
    }

    /// Applies a full pull. Returns false when the session stopped as a result.
    pub fn complete_load(&mut self, data: LoadedData) -> bool {
        if self.is_stopped() {
            return false;
        }

        let mission = match data.mission {
            Some(mission) => mission,
            None => {
                self.availability = Availability::MissionNotFound;
                self.stop();
                return false;
            }
        };

        if mission.status.is_terminal() {
            self.availability = Availability::MissionEnded {
                status: mission.status,
            };
            self.mission = Some(mission);
            self.stop();
            return false;
        }

        let history = data
            .history
            .into_iter()
            .map(HistoryPosition::into_sample)
            .collect();
        let live = data
            .live
            .filter(|live| live.is_active)
            .map(LivePosition::into_sample);

        self.trajectory = trajectory::merge(history, live);
        self.mission = Some(mission);
        self.status = SessionStatus::Active;
        self.availability = Availability::Ready;
        true
    }

    /// Records a failed pull. A session that never loaded goes back to `Idle`;
    /// an active one keeps serving its stale snapshot.
    pub fn fail_load(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        match self.status {
            SessionStatus::Idle | SessionStatus::Loading => {
                self.status = SessionStatus::Idle;
                self.availability = Availability::Unavailable { reason };
            }
            SessionStatus::Active => {
                self.availability = Availability::Degraded { reason };
            }
            SessionStatus::Stopped => {}
        }
    }

    /// Applies a live push received at `now` after quality checks.
    pub fn apply_push(
        &mut self,
        position: LivePosition,
        now: DateTime<Utc>,
    ) -> Result<(), PushRejection> {
        if self.status != SessionStatus::Active {
            return Err(PushRejection::NotActive);
        }
        if position.mission_id != self.mission_id {
            return Err(PushRejection::WrongMission);
        }
        if position.validate().is_err() {
            return Err(PushRejection::Invalid);
        }
        if !position.is_active {
            return Err(PushRejection::Inactive);
        }
        if position
            .accuracy
            .is_some_and(|accuracy| accuracy > self.config.max_accuracy_meters)
        {
            return Err(PushRejection::LowAccuracy);
        }
        if position
            .speed
            .map(shared::geo::mps_to_kmh)
            .is_some_and(|kmh| kmh > self.config.max_speed_kmh)
        {
            return Err(PushRejection::ImplausibleSpeed);
        }
        if shared::validation::validate_recorded_at(&position.last_update, now).is_err() {
            return Err(PushRejection::FutureTimestamp);
        }

        trajectory::apply_live_update(&mut self.trajectory, position.into_sample());
        Ok(())
    }

    /// Issues a new ETA request, or clears the ETA when it cannot be computed.
    pub fn next_eta_request(&mut self) -> Option<EtaRequest> {
        if self.status != SessionStatus::Active {
            return None;
        }

        let destination = self.mission.as_ref().and_then(Mission::destination);
        let (current, destination) = match (self.current_position(), destination) {
            (Some(current), Some(destination)) => (current.clone(), destination),
            _ => {
                self.eta = EtaEstimate::unavailable();
                return None;
            }
        };

        self.eta_seq_issued += 1;
        let prior_distance_km =
            (self.eta.source != EtaSource::Unavailable).then_some(self.eta.distance_km);

        Some(EtaRequest {
            seq: self.eta_seq_issued,
            current,
            destination,
            prior_distance_km,
        })
    }

    /// Applies an ETA result unless a newer one was already applied.
    pub fn accept_eta(&mut self, seq: u64, estimate: EtaEstimate) -> bool {
        if self.status != SessionStatus::Active || seq <= self.eta_seq_applied {
            return false;
        }
        self.eta_seq_applied = seq;
        self.eta = estimate;
        true
    }

    /// `* → Stopped`. Terminal.
    pub fn stop(&mut self) {
        self.status = SessionStatus::Stopped;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<TrackingSnapshot> {
        if self.status != SessionStatus::Active {
            return None;
        }

        let current = self.current_position().cloned();
        let thresholds = &self.config.thresholds;
        let (is_online, is_moving) = current
            .as_ref()
            .map(|c| (thresholds.is_online(c, now), thresholds.is_moving(c)))
            .unwrap_or((false, false));

        Some(TrackingSnapshot {
            mission_id: self.mission_id,
            current_position: current,
            trajectory: self.trajectory.clone(),
            is_online,
            is_moving,
            distance_remaining_km: self.eta.distance_km,
            eta_minutes: self.eta.eta_minutes,
            eta_source: self.eta.source,
            stats: trajectory::compute_stats(&self.trajectory),
            generated_at: now,
        })
    }

    pub fn view(&self, now: DateTime<Utc>) -> TrackingView {
        TrackingView {
            mission_id: self.mission_id,
            status: self.status,
            availability: self.availability.clone(),
            snapshot: self.snapshot(now),
        }
    }
}

// ============================================================================
// Session task
// ============================================================================

/// Commands accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Full pull reload, then ETA recompute.
    Refresh,
    /// Recompute time-derived flags and ETA without touching the stores.
    Tick,
    Stop,
}

#[derive(Debug)]
enum SessionEvent {
    Push(LivePosition),
    EtaComputed { seq: u64, estimate: EtaEstimate },
}

enum Step {
    Command(Option<SessionCommand>),
    Event(SessionEvent),
}

/// Everything a session needs from the outside.
#[derive(Clone)]
pub struct SessionDeps {
    pub source: Arc<dyn TrackingSource>,
    pub channel: Arc<dyn LiveUpdateChannel>,
    pub estimator: EtaEstimator,
    pub config: SessionConfig,
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    mission_id: Uuid,
    thresholds: Thresholds,
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<TrackingView>,
}

impl SessionHandle {
    pub fn mission_id(&self) -> Uuid {
        self.mission_id
    }

    /// Latest published view, with the online flag evaluated now.
    pub fn view(&self) -> TrackingView {
        self.view.borrow().clone().at(&self.thresholds, Utc::now())
    }

    pub fn watch(&self) -> watch::Receiver<TrackingView> {
        self.view.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed() || self.view.borrow().status == SessionStatus::Stopped
    }

    /// Returns false if the session has already exited.
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn refresh(&self) -> bool {
        self.send(SessionCommand::Refresh).await
    }

    pub async fn tick(&self) -> bool {
        self.send(SessionCommand::Tick).await
    }

    pub async fn stop(&self) {
        let _ = self.send(SessionCommand::Stop).await;
    }

    /// Waits until the session has left `Loading` or the timeout elapses, then returns the view.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> TrackingView {
        let mut rx = self.view.clone();
        let _ = tokio::time::timeout(timeout, async {
            while rx.borrow_and_update().status == SessionStatus::Loading {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await;
        self.view()
    }
}

pub struct TrackingSession {
    state: SessionState,
    deps: SessionDeps,
    view_tx: watch::Sender<TrackingView>,
    commands: mpsc::Receiver<SessionCommand>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    subscription: Option<SubscriptionHandle>,
}

impl TrackingSession {
    /// Starts a session task for the mission and returns its handle.
    pub fn spawn(mission_id: Uuid, deps: SessionDeps) -> SessionHandle {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (view_tx, view_rx) = watch::channel(TrackingView::loading(mission_id));
        let thresholds = deps.config.thresholds;

        let session = TrackingSession {
            state: SessionState::new(mission_id, deps.config),
            deps,
            view_tx,
            commands,
            events_tx,
            events_rx,
            subscription: None,
        };
        tokio::spawn(session.run());

        SessionHandle {
            mission_id,
            thresholds,
            commands: commands_tx,
            view: view_rx,
        }
    }

    async fn run(mut self) {
        let mission_id = self.state.mission_id();
        tracing::info!(mission_id = %mission_id, "Tracking session started");

        self.reload().await;

        while !self.state.is_stopped() {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                Some(event) = self.events_rx.recv() => Step::Event(event),
            };

            match step {
                Step::Command(Some(SessionCommand::Refresh)) => self.reload().await,
                Step::Command(Some(SessionCommand::Tick)) => {
                    self.request_eta();
                    self.publish();
                }
                Step::Command(Some(SessionCommand::Stop)) | Step::Command(None) => {
                    self.state.stop();
                }
                Step::Event(SessionEvent::Push(position)) => self.on_push(position),
                Step::Event(SessionEvent::EtaComputed { seq, estimate }) => {
                    if self.state.accept_eta(seq, estimate) {
                        self.publish();
                    } else {
                        tracing::debug!(mission_id = %mission_id, seq, "Discarding superseded ETA result");
                    }
                }
            }
        }

        if let Some(handle) = self.subscription.take() {
            self.deps.channel.unsubscribe(&handle).await;
        }
        self.publish();
        tracing::info!(
            mission_id = %mission_id,
            availability = ?self.state.availability(),
            "Tracking session stopped"
        );
    }

    /// Full pull of mission, history and live slot.
    async fn reload(&mut self) {
        let mission_id = self.state.mission_id();
        self.state.begin_loading();
        self.publish();

        match self.fetch(mission_id).await {
            Ok(data) => {
                if self.state.complete_load(data) {
                    self.ensure_subscribed().await;
                    self.request_eta();
                }
            }
            Err(e) => {
                tracing::warn!(mission_id = %mission_id, error = %e, "Tracking data load failed");
                self.state.fail_load(e.to_string());
            }
        }
        self.publish();
    }

    async fn fetch(&self, mission_id: Uuid) -> Result<LoadedData, TrackingSourceError> {
        let source = &self.deps.source;
        let mission = source.load_mission(mission_id).await?;
        if mission.is_none() {
            return Ok(LoadedData {
                mission,
                history: Vec::new(),
                live: None,
            });
        }
        let (history, live) = tokio::try_join!(
            source.load_history(mission_id),
            source.load_live(mission_id)
        )?;
        Ok(LoadedData {
            mission,
            history,
            live,
        })
    }

    /// Subscribes to pushes if not already subscribed. Failure leaves the session pull-only.
    async fn ensure_subscribed(&mut self) {
        if self.subscription.is_some() {
            return;
        }

        let mission_id = self.state.mission_id();
        let events = self.events_tx.clone();
        let handler: LiveUpdateHandler = Arc::new(move |position| {
            if events.try_send(SessionEvent::Push(position)).is_err() {
                tracing::warn!(mission_id = %mission_id, "Live update dropped, session busy");
                counter!("tracking_live_updates_total", "outcome" => "dropped").increment(1);
            }
        });

        match self.deps.channel.subscribe(mission_id, handler).await {
            Ok(handle) => self.subscription = Some(handle),
            Err(e) => {
                tracing::warn!(mission_id = %mission_id, error = %e, "Live update subscription failed, relying on re-sync");
            }
        }
    }

    fn on_push(&mut self, position: LivePosition) {
        let mission_id = self.state.mission_id();
        match self.state.apply_push(position, Utc::now()) {
            Ok(()) => {
                counter!("tracking_live_updates_total", "outcome" => "accepted").increment(1);
                self.request_eta();
                self.publish();
            }
            Err(reason) => {
                tracing::debug!(mission_id = %mission_id, reason = reason.as_str(), "Live update rejected");
                counter!("tracking_live_updates_total", "outcome" => reason.as_str()).increment(1);
            }
        }
    }

    fn request_eta(&mut self) {
        let Some(request) = self.state.next_eta_request() else {
            return;
        };

        let estimator = self.deps.estimator.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let estimate = estimator
                .estimate(
                    Some(&request.current),
                    Some(request.destination),
                    request.prior_distance_km,
                )
                .await;
            // The session may have exited in the meantime.
            let _ = events
                .send(SessionEvent::EtaComputed {
                    seq: request.seq,
                    estimate,
                })
                .await;
        });
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view(Utc::now()));
    }
}
