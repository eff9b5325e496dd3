//! Position sample domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point, in kilometers.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        shared::geo::haversine_km(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Where a sample entered the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleOrigin {
    #[default]
    History,
    Live,
}

/// One GPS fix in a mission trajectory.
///
/// `speed` is in m/s, `heading` in degrees, `accuracy` in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip)]
    pub origin: SampleOrigin,
}

impl PositionSample {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Speed in km/h, if reported.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed.map(shared::geo::mps_to_kmh)
    }

    pub fn is_live(&self) -> bool {
        self.origin == SampleOrigin::Live
    }
}

/// A row of the append-only history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPosition {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryPosition {
    pub fn into_sample(self) -> PositionSample {
        PositionSample {
            id: self.id,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            accuracy: self.accuracy,
            recorded_at: self.recorded_at,
            origin: SampleOrigin::History,
        }
    }
}

/// The single "latest position" slot of a mission.
///
/// Arrives either from a direct read or as a push notification payload,
/// which is why field names follow the storage columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LivePosition {
    pub id: Uuid,
    pub mission_id: Uuid,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    #[validate(custom(function = "shared::validation::validate_speed"))]
    pub speed: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_heading"))]
    pub heading: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_accuracy"))]
    pub accuracy: Option<f64>,

    pub last_update: DateTime<Utc>,
    pub is_active: bool,
}

impl LivePosition {
    pub fn into_sample(self) -> PositionSample {
        PositionSample {
            id: self.id,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            accuracy: self.accuracy,
            recorded_at: self.last_update,
            origin: SampleOrigin::Live,
        }
    }
}
