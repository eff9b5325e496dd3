//! Position entities for the history and live tables.

use chrono::{DateTime, Utc};
use domain::models::{HistoryPosition, LivePosition};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the mission_tracking_history table.
#[derive(Debug, Clone, FromRow)]
pub struct TrackingHistoryEntity {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub bearing: Option<f64>,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl From<TrackingHistoryEntity> for HistoryPosition {
    fn from(entity: TrackingHistoryEntity) -> Self {
        Self {
            id: entity.id,
            mission_id: entity.mission_id,
            latitude: entity.latitude,
            longitude: entity.longitude,
            speed: entity.speed,
            heading: entity.bearing,
            accuracy: entity.accuracy,
            recorded_at: entity.recorded_at,
        }
    }
}

/// Database row mapping for the mission_tracking_live table.
#[derive(Debug, Clone, FromRow)]
pub struct TrackingLiveEntity {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub bearing: Option<f64>,
    pub accuracy: Option<f64>,
    pub last_update: DateTime<Utc>,
    pub is_active: bool,
}

impl From<TrackingLiveEntity> for LivePosition {
    fn from(entity: TrackingLiveEntity) -> Self {
        Self {
            id: entity.id,
            mission_id: entity.mission_id,
            latitude: entity.latitude,
            longitude: entity.longitude,
            speed: entity.speed,
            heading: entity.bearing,
            accuracy: entity.accuracy,
            last_update: entity.last_update,
            is_active: entity.is_active,
        }
    }
}
