//! Tracking snapshot and session view models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mission::MissionStatus;
use super::position::PositionSample;

/// Where the current ETA figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EtaSource {
    /// Driving route from the external routing service.
    Routing,
    /// Great-circle fallback.
    Haversine,
    /// Not computable yet (no position or no destination).
    #[default]
    Unavailable,
}

/// Aggregates over the merged trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryStats {
    pub total_distance_km: f64,
    pub duration_minutes: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub points_count: usize,
}

/// Derived view of one mission's tracking state. Recomputed, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub mission_id: Uuid,
    pub current_position: Option<PositionSample>,
    pub trajectory: Vec<PositionSample>,
    pub is_online: bool,
    pub is_moving: bool,
    /// 0 when not yet computed.
    pub distance_remaining_km: f64,
    /// 0 when not yet computed; a computed ETA is never 0.
    pub eta_minutes: i64,
    pub eta_source: EtaSource,
    pub stats: TrajectoryStats,
    pub generated_at: DateTime<Utc>,
}

/// Lifecycle state of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Loading,
    Active,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Active => "active",
            SessionStatus::Stopped => "stopped",
        }
    }
}

/// Consumer-facing condition of the tracking data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Availability {
    /// Fresh data.
    Ready,
    /// A later re-sync failed; the snapshot is stale but still served.
    Degraded { reason: String },
    /// The initial load failed; there is nothing to show.
    Unavailable { reason: String },
    MissionNotFound,
    MissionEnded { status: MissionStatus },
}

impl Availability {
    pub fn is_serving(&self) -> bool {
        matches!(self, Availability::Ready | Availability::Degraded { .. })
    }
}

/// What a session publishes to observers after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub mission_id: Uuid,
    pub status: SessionStatus,
    pub availability: Availability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<TrackingSnapshot>,
}

impl TrackingView {
    pub fn loading(mission_id: Uuid) -> Self {
        Self {
            mission_id,
            status: SessionStatus::Loading,
            availability: Availability::Ready,
            snapshot: None,
        }
    }

    /// Re-derives the time-dependent fields of a published view at `now`.
    pub fn at(mut self, thresholds: &Thresholds, now: DateTime<Utc>) -> Self {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.is_online = snapshot
                .current_position
                .as_ref()
                .is_some_and(|current| thresholds.is_online(current, now));
            snapshot.generated_at = now;
        }
        self
    }
}

/// Online/movement classification thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub online_threshold: Duration,
    pub moving_threshold_kmh: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            online_threshold: Duration::seconds(120),
            moving_threshold_kmh: 3.0,
        }
    }
}

impl Thresholds {
    /// `now - recorded_at < online_threshold`.
    pub fn is_online(&self, sample: &PositionSample, now: DateTime<Utc>) -> bool {
        now - sample.recorded_at < self.online_threshold
    }

    /// Unknown speed counts as not moving.
    pub fn is_moving(&self, sample: &PositionSample) -> bool {
        sample
            .speed_kmh()
            .map(|kmh| kmh > self.moving_threshold_kmh)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::position::SampleOrigin;

    fn sample_at(recorded_at: DateTime<Utc>, speed: Option<f64>) -> PositionSample {
        PositionSample {
            id: Uuid::new_v4(),
            latitude: 48.85,
            longitude: 2.35,
            speed,
            heading: None,
            accuracy: None,
            recorded_at,
            origin: SampleOrigin::Live,
        }
    }

    #[test]
    fn test_online_threshold_boundary() {
        let thresholds = Thresholds::default();
        let now = Utc::now();

        let just_inside = sample_at(now - Duration::seconds(119), None);
        let just_outside = sample_at(now - Duration::seconds(121), None);
        let exactly = sample_at(now - Duration::seconds(120), None);

        assert!(thresholds.is_online(&just_inside, now));
        assert!(!thresholds.is_online(&just_outside, now));
        assert!(!thresholds.is_online(&exactly, now));
    }

    #[test]
    fn test_online_with_custom_threshold() {
        let thresholds = Thresholds {
            online_threshold: Duration::seconds(30),
            moving_threshold_kmh: 3.0,
        };
        let now = Utc::now();
        assert!(thresholds.is_online(&sample_at(now - Duration::seconds(29), None), now));
        assert!(!thresholds.is_online(&sample_at(now - Duration::seconds(31), None), now));
    }

    #[test]
    fn test_is_moving() {
        let thresholds = Thresholds::default();
        let now = Utc::now();

        // 1 m/s = 3.6 km/h
        assert!(thresholds.is_moving(&sample_at(now, Some(1.0))));
        // 0.8 m/s = 2.88 km/h
        assert!(!thresholds.is_moving(&sample_at(now, Some(0.8))));
        assert!(!thresholds.is_moving(&sample_at(now, Some(0.0))));
        assert!(!thresholds.is_moving(&sample_at(now, None)));
    }

    #[test]
    fn test_availability_serialization() {
        let json = serde_json::to_value(Availability::Degraded {
            reason: "timeout".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "degraded");
        assert_eq!(json["reason"], "timeout");

        let ended = serde_json::to_value(Availability::MissionEnded {
            status: MissionStatus::Completed,
        })
        .unwrap();
        assert_eq!(ended["state"], "mission_ended");
        assert_eq!(ended["status"], "completed");
    }

    #[test]
    fn test_availability_is_serving() {
        assert!(Availability::Ready.is_serving());
        assert!(Availability::Degraded {
            reason: "x".into()
        }
        .is_serving());
        assert!(!Availability::MissionNotFound.is_serving());
        assert!(!Availability::Unavailable {
            reason: "x".into()
        }
        .is_serving());
    }

    #[test]
    fn test_loading_view_has_no_snapshot() {
        let view = TrackingView::loading(Uuid::nil());
        assert_eq!(view.status, SessionStatus::Loading);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("snapshot"));
        assert!(json.contains("\"status\":\"loading\""));
    }

    #[test]
    fn test_view_online_flag_follows_read_time() {
        let thresholds = Thresholds::default();
        let published_at = Utc::now();
        let current = sample_at(published_at - Duration::seconds(119), None);
        let view = TrackingView {
            mission_id: Uuid::nil(),
            status: SessionStatus::Active,
            availability: Availability::Ready,
            snapshot: Some(TrackingSnapshot {
                mission_id: Uuid::nil(),
                current_position: Some(current.clone()),
                trajectory: vec![current],
                is_online: true,
                is_moving: false,
                distance_remaining_km: 0.0,
                eta_minutes: 0,
                eta_source: EtaSource::Unavailable,
                stats: TrajectoryStats::default(),
                generated_at: published_at,
            }),
        };

        let still = view.clone().at(&thresholds, published_at);
        assert!(still.snapshot.as_ref().unwrap().is_online);

        let later = published_at + Duration::seconds(3);
        let stale = view.at(&thresholds, later);
        let snapshot = stale.snapshot.unwrap();
        assert!(!snapshot.is_online);
        assert_eq!(snapshot.generated_at, later);
    }

    #[test]
    fn test_view_without_snapshot_is_unchanged_at_read_time() {
        let view = TrackingView::loading(Uuid::nil());
        assert_eq!(view.clone().at(&Thresholds::default(), Utc::now()), view);
    }
}
